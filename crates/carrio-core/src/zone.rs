//! Rating zones
//!
//! A zone is the geographic bucket a price list is keyed on. Raw
//! destinations (country, province, postal code) are classified here;
//! the canonical ordering is what quote matrices are rendered in.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const ZONE_MAINLAND: &str = "IT-ITALIA";
pub const ZONE_CALABRIA: &str = "IT-CALABRIA";
pub const ZONE_SICILY: &str = "IT-SICILIA";
pub const ZONE_SARDINIA: &str = "IT-SARDEGNA";
pub const ZONE_VENICE: &str = "IT-VENEZIA";
pub const ZONE_LIVIGNO: &str = "IT-LIVIGNO";
pub const ZONE_MINOR_ISLANDS: &str = "IT-ISOLE-MINORI";

/// Mainland first, then islands and remote areas
pub const CANONICAL_ZONE_ORDER: [&str; 7] = [
    ZONE_MAINLAND,
    ZONE_CALABRIA,
    ZONE_SICILY,
    ZONE_SARDINIA,
    ZONE_VENICE,
    ZONE_LIVIGNO,
    ZONE_MINOR_ISLANDS,
];

const CALABRIA_PROVINCES: [&str; 5] = ["CS", "CZ", "KR", "RC", "VV"];
const SICILY_PROVINCES: [&str; 9] = ["AG", "CL", "CT", "EN", "ME", "PA", "RG", "SR", "TP"];
const SARDINIA_PROVINCES: [&str; 5] = ["CA", "NU", "OR", "SS", "SU"];

const LIVIGNO_POSTAL_CODE: &str = "23041";

/// Postal codes served as minor islands
///
/// Capri, Anacapri, Ischia, Procida, Elba, Giglio, Capraia, Ponza,
/// Ventotene, Lampedusa, Linosa, Pantelleria, Eolie, Egadi, Ustica,
/// La Maddalena, Tremiti.
const MINOR_ISLAND_POSTAL_CODES: &[&str] = &[
    "80071", "80073", "80074", "80075", "80076", "80077", "80079", "57030", "57031", "57032",
    "57033", "57034", "57036", "57037", "57038", "57039", "58012", "04027", "04020", "92010",
    "92031", "91017", "98050", "98055", "91023", "90010", "07024", "71040",
];

/// Destination as received from the surrounding layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// ISO 3166-1 alpha-2 country code
    pub country: String,
    /// Province code (sigla), e.g. "PA"
    pub province: Option<String>,
    /// Postal code (CAP)
    pub postal_code: Option<String>,
}

impl Destination {
    pub fn italy(province: &str, postal_code: &str) -> Self {
        Self {
            country: "IT".to_string(),
            province: Some(province.to_string()),
            postal_code: Some(postal_code.to_string()),
        }
    }

    /// Rating zone for this destination
    pub fn zone(&self) -> String {
        classify_zone(
            &self.country,
            self.province.as_deref(),
            self.postal_code.as_deref(),
        )
    }
}

fn is_venice_lagoon(postal_code: &str) -> bool {
    // historic centre, Lido, Murano and Burano
    postal_code
        .parse::<u32>()
        .map(|cap| (30121..=30142).contains(&cap))
        .unwrap_or(false)
}

/// Classify a destination into a rating zone code
pub fn classify_zone(country: &str, province: Option<&str>, postal_code: Option<&str>) -> String {
    let country = country.trim().to_uppercase();
    if country != "IT" {
        return format!("EU-{}", country);
    }

    let postal_code = postal_code.map(str::trim).unwrap_or_default();
    if postal_code == LIVIGNO_POSTAL_CODE {
        return ZONE_LIVIGNO.to_string();
    }
    if MINOR_ISLAND_POSTAL_CODES.contains(&postal_code) {
        return ZONE_MINOR_ISLANDS.to_string();
    }
    if is_venice_lagoon(postal_code) {
        return ZONE_VENICE.to_string();
    }

    let province = province.map(|p| p.trim().to_uppercase()).unwrap_or_default();
    if CALABRIA_PROVINCES.contains(&province.as_str()) {
        ZONE_CALABRIA.to_string()
    } else if SICILY_PROVINCES.contains(&province.as_str()) {
        ZONE_SICILY.to_string()
    } else if SARDINIA_PROVINCES.contains(&province.as_str()) {
        ZONE_SARDINIA.to_string()
    } else {
        ZONE_MAINLAND.to_string()
    }
}

/// Position of a zone in the canonical order, `None` for unlisted zones
pub fn canonical_rank(zone: &str) -> Option<usize> {
    CANONICAL_ZONE_ORDER.iter().position(|z| *z == zone)
}

/// Compare zones: canonical ones by rank, then the rest alphabetically
pub fn compare_zones(a: &str, b: &str) -> Ordering {
    match (canonical_rank(a), canonical_rank(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
