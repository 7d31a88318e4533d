//! Price list and tier models
//!
//! A price list is a versioned rate sheet made of weight/zone tiers.
//! Tiers for one (zone, service type) partition the weight axis into
//! half-open ranges `[weight_from, weight_to)`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::money::percent_of;
use crate::vat::{normalize_vat_mode, VatMode, DEFAULT_VAT_RATE};

/// Ownership scope of a price list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PriceListType {
    /// Platform-wide list
    Global,
    /// List negotiated with a courier (platform cost basis)
    Supplier,
    /// List created for or by a single customer/reseller
    #[default]
    Custom,
}

impl fmt::Display for PriceListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceListType::Global => write!(f, "global"),
            PriceListType::Supplier => write!(f, "supplier"),
            PriceListType::Custom => write!(f, "custom"),
        }
    }
}

impl PriceListType {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "global" => Some(PriceListType::Global),
            "supplier" => Some(PriceListType::Supplier),
            "custom" => Some(PriceListType::Custom),
            _ => None,
        }
    }
}

/// Lifecycle status of a price list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PriceListStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

impl fmt::Display for PriceListStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceListStatus::Draft => write!(f, "draft"),
            PriceListStatus::Active => write!(f, "active"),
            PriceListStatus::Archived => write!(f, "archived"),
        }
    }
}

impl PriceListStatus {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(PriceListStatus::Draft),
            "active" => Some(PriceListStatus::Active),
            "archived" => Some(PriceListStatus::Archived),
            _ => None,
        }
    }

    /// Allowed lifecycle moves; archived lists never come back
    pub fn can_transition_to(&self, next: PriceListStatus) -> bool {
        matches!(
            (self, next),
            (PriceListStatus::Draft, PriceListStatus::Active)
                | (PriceListStatus::Draft, PriceListStatus::Archived)
                | (PriceListStatus::Active, PriceListStatus::Archived)
        )
    }
}

/// Price list entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceList {
    /// Unique identifier
    pub id: Uuid,

    /// Display name; for supplier lists usually contains the courier code
    pub name: String,

    /// Ownership scope
    pub list_type: PriceListType,

    /// Lifecycle status
    pub status: PriceListStatus,

    /// Courier this list rates for
    pub courier_code: Option<String>,

    /// Master list this list was derived from
    pub master_list_id: Option<Uuid>,

    /// Stored VAT mode; `None` for legacy lists. Read through [`PriceList::vat_mode`].
    pub vat_mode: Option<VatMode>,

    /// VAT rate in percent
    pub vat_rate: Decimal,

    /// Margin applied when the list is used for commercial quotes
    pub default_margin_percent: Option<Decimal>,

    /// User who created the list
    pub created_by: Option<Uuid>,

    /// Free-form metadata (carrier linkage, sync bookkeeping, extra-step rule)
    pub metadata: Value,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl PriceList {
    /// Canonical VAT mode
    #[inline]
    pub fn vat_mode(&self) -> VatMode {
        normalize_vat_mode(self.vat_mode)
    }

    pub fn is_active(&self) -> bool {
        self.status == PriceListStatus::Active
    }

    /// Whether this list represents the platform's own contract
    pub fn is_platform_owned(&self) -> bool {
        matches!(self.list_type, PriceListType::Global | PriceListType::Supplier)
    }

    /// Case-insensitive courier match on the courier code or the list name
    pub fn serves_courier(&self, courier_code: &str) -> bool {
        let needle = courier_code.to_lowercase();
        if needle.is_empty() {
            return false;
        }
        self.courier_code
            .as_deref()
            .map(|c| c.to_lowercase() == needle)
            .unwrap_or(false)
            || self.name.to_lowercase().contains(&needle)
    }

    /// Decimal metadata value; accepts JSON numbers and numeric strings
    pub fn metadata_decimal(&self, key: &str) -> Option<Decimal> {
        match self.metadata.get(key)? {
            Value::String(s) => s.trim().parse().ok(),
            Value::Number(n) => n.to_string().parse().ok(),
            _ => None,
        }
    }
}

impl Default for PriceList {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            list_type: PriceListType::Custom,
            status: PriceListStatus::Draft,
            courier_code: None,
            master_list_id: None,
            vat_mode: None,
            vat_rate: DEFAULT_VAT_RATE,
            default_margin_percent: None,
            created_by: None,
            metadata: Value::Object(Default::default()),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One weight/zone tier of a price list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceListEntry {
    /// Unique identifier
    pub id: Uuid,

    /// Owning price list
    pub price_list_id: Uuid,

    /// Inclusive lower weight bound (kg)
    pub weight_from: Decimal,

    /// Exclusive upper weight bound (kg)
    pub weight_to: Decimal,

    /// Rating zone code
    pub zone_code: String,

    /// Service type (e.g. "standard", "express")
    pub service_type: String,

    /// Base price for this tier
    pub base_price: Decimal,

    /// Fuel surcharge in percent of the base price
    pub fuel_surcharge_percent: Option<Decimal>,

    /// Flat island/remote-area surcharge
    pub island_surcharge: Option<Decimal>,

    /// Estimated delivery days
    pub delivery_days: Option<i32>,
}

impl PriceListEntry {
    /// Whether `weight` falls in `[weight_from, weight_to)`
    #[inline]
    pub fn contains_weight(&self, weight: Decimal) -> bool {
        weight >= self.weight_from && weight < self.weight_to
    }

    /// Fuel surcharge amount for a given base, unrounded
    pub fn fuel_surcharge_on(&self, base: Decimal) -> Decimal {
        self.fuel_surcharge_percent
            .map(|pct| percent_of(base, pct))
            .unwrap_or(Decimal::ZERO)
    }

    /// Flat island surcharge, zero when unset
    pub fn island_surcharge(&self) -> Decimal {
        self.island_surcharge.unwrap_or(Decimal::ZERO)
    }

    /// `base + island + base * fuel%`
    pub fn price_with_surcharges(&self) -> Decimal {
        self.base_price + self.island_surcharge() + self.fuel_surcharge_on(self.base_price)
    }
}

impl Default for PriceListEntry {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            price_list_id: Uuid::nil(),
            weight_from: Decimal::ZERO,
            weight_to: Decimal::ZERO,
            zone_code: String::new(),
            service_type: "standard".to_string(),
            base_price: Decimal::ZERO,
            fuel_surcharge_percent: None,
            island_surcharge: None,
            delivery_days: None,
        }
    }
}

/// Assignment of a price list to a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceListAssignment {
    pub user_id: Uuid,
    pub price_list_id: Uuid,
    /// Operator who made the assignment
    pub assigned_by: Option<Uuid>,
    /// Made by a platform-level operator rather than the user themselves
    pub assigned_by_platform: bool,
    pub assigned_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl PriceListAssignment {
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_weight_range_is_half_open() {
        let entry = PriceListEntry {
            weight_from: dec!(0),
            weight_to: dec!(5),
            ..Default::default()
        };

        assert!(entry.contains_weight(dec!(0)));
        assert!(entry.contains_weight(dec!(4.999)));
        assert!(!entry.contains_weight(dec!(5)));
    }

    #[test]
    fn test_price_with_surcharges() {
        let entry = PriceListEntry {
            base_price: dec!(10.00),
            fuel_surcharge_percent: Some(dec!(12.5)),
            island_surcharge: Some(dec!(3.00)),
            ..Default::default()
        };

        // 10 + 3 + 1.25
        assert_eq!(entry.price_with_surcharges(), dec!(14.25));
    }

    #[test]
    fn test_legacy_vat_mode_reads_as_excluded() {
        let list = PriceList::default();
        assert_eq!(list.vat_mode(), VatMode::Excluded);
    }

    #[test]
    fn test_status_transitions() {
        assert!(PriceListStatus::Draft.can_transition_to(PriceListStatus::Active));
        assert!(PriceListStatus::Active.can_transition_to(PriceListStatus::Archived));
        assert!(!PriceListStatus::Archived.can_transition_to(PriceListStatus::Active));
        assert!(!PriceListStatus::Active.can_transition_to(PriceListStatus::Draft));
    }

    #[test]
    fn test_serves_courier() {
        let list = PriceList {
            name: "BRT Master 2025".to_string(),
            ..Default::default()
        };
        assert!(list.serves_courier("brt"));
        assert!(!list.serves_courier("gls"));
        assert!(!list.serves_courier(""));

        let list = PriceList {
            name: "Listino base".to_string(),
            courier_code: Some("GLS".to_string()),
            ..Default::default()
        };
        assert!(list.serves_courier("gls"));
    }

    #[test]
    fn test_metadata_decimal() {
        let list = PriceList {
            metadata: json!({ "extra_step_per_100kg": "4.50", "n": 3, "bad": true }),
            ..Default::default()
        };
        assert_eq!(list.metadata_decimal("extra_step_per_100kg"), Some(dec!(4.50)));
        assert_eq!(list.metadata_decimal("n"), Some(dec!(3)));
        assert_eq!(list.metadata_decimal("bad"), None);
        assert_eq!(list.metadata_decimal("missing"), None);
    }
}
