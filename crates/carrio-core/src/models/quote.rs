//! Rate quote and quote matrix models
//!
//! A `RateQuote` is produced fresh per rating call. A `QuoteMatrix` is a
//! snapshot of a whole price list under a margin, persisted for commercial
//! offers; it records every input it was built from.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::vat::VatMode;

/// Priced result of resolving one tier for one shipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub price_list_id: Uuid,
    pub entry_id: Uuid,
    pub zone_code: String,
    pub service_type: String,
    pub weight: Decimal,

    /// Tier base price (plus any extra steps beyond the last tier)
    pub base_price: Decimal,

    /// Fuel surcharge amount
    pub fuel_surcharge: Decimal,

    /// Island/remote-area surcharge amount
    pub island_surcharge: Decimal,

    /// `fuel_surcharge + island_surcharge`
    pub surcharges: Decimal,

    /// `base_price + surcharges`, before VAT handling
    pub subtotal: Decimal,

    /// Normalized VAT mode used
    pub vat_mode: VatMode,

    /// VAT rate used, percent
    pub vat_rate: Decimal,

    /// VAT added (excluded) or embedded (included)
    pub vat_amount: Decimal,

    /// Customer-facing total
    pub final_price: Decimal,

    /// Number of extra steps beyond the last tier, 0 for in-range weights
    pub extra_steps: u32,

    pub delivery_days: Option<i32>,
}

/// How parcels reach the carrier in a commercial offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Carrier picks up at the sender
    #[default]
    CarrierPickup,
    /// Sender drops off at a point
    SenderDropoff,
    /// Either, chosen per shipment
    Both,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMode::CarrierPickup => write!(f, "carrier_pickup"),
            DeliveryMode::SenderDropoff => write!(f, "sender_dropoff"),
            DeliveryMode::Both => write!(f, "both"),
        }
    }
}

/// Auxiliary options for matrix building
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixOptions {
    pub delivery_mode: DeliveryMode,
    /// Flat pickup fee shown next to the matrix
    pub pickup_fee: Option<Decimal>,
    /// Flat processing fee shown next to the matrix
    pub processing_fee: Option<Decimal>,
}

/// One weight tier row of the matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRow {
    /// Upper weight bound of the tier
    pub weight_to: Decimal,
    /// One price per matrix zone, in `QuoteMatrix::zones` order; `None` when the list has no tier
    pub prices: Vec<Option<Decimal>>,
}

/// Zone x weight-tier pricing snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteMatrix {
    pub price_list_id: Uuid,
    pub courier_code: Option<String>,
    pub service_type: String,
    /// Zones in canonical order
    pub zones: Vec<String>,
    /// Weight tiers in ascending order
    pub rows: Vec<MatrixRow>,

    // Generation inputs
    pub margin_percent: Decimal,
    pub vat_mode: VatMode,
    pub vat_rate: Decimal,
    pub delivery_mode: DeliveryMode,
    pub pickup_fee: Option<Decimal>,
    pub processing_fee: Option<Decimal>,
    pub generated_at: DateTime<Utc>,
}

impl QuoteMatrix {
    /// Price for a (weight tier, zone) cell
    pub fn price(&self, weight_to: Decimal, zone: &str) -> Option<Decimal> {
        let column = self.zones.iter().position(|z| z == zone)?;
        self.rows
            .iter()
            .find(|row| row.weight_to == weight_to)
            .and_then(|row| row.prices.get(column).copied().flatten())
    }

    /// Number of priced cells
    pub fn priced_cells(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.prices.iter().filter(|p| p.is_some()).count())
            .sum()
    }
}
