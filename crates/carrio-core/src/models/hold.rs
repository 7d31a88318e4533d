//! Shipment hold (giacenza) models
//!
//! A hold is a shipment stuck in a delivery exception. The customer picks
//! one billable action; the hold moves `open -> action_confirmed` exactly
//! once, together with the wallet row that paid for it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::money::{percent_of, round2};

/// Hold status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HoldStatus {
    /// Waiting for the customer to choose an action
    #[default]
    Open,
    /// Action chosen and paid; terminal for billing
    ActionConfirmed,
    /// Carrier completed the action
    Completed,
    /// Parcel returned to sender
    Returned,
    /// Parcel destroyed
    Disposed,
    /// Storage period elapsed without an action
    Expired,
}

impl fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldStatus::Open => write!(f, "open"),
            HoldStatus::ActionConfirmed => write!(f, "action_confirmed"),
            HoldStatus::Completed => write!(f, "completed"),
            HoldStatus::Returned => write!(f, "returned"),
            HoldStatus::Disposed => write!(f, "disposed"),
            HoldStatus::Expired => write!(f, "expired"),
        }
    }
}

impl HoldStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(HoldStatus::Open),
            "action_confirmed" => Some(HoldStatus::ActionConfirmed),
            "completed" => Some(HoldStatus::Completed),
            "returned" => Some(HoldStatus::Returned),
            "disposed" => Some(HoldStatus::Disposed),
            "expired" => Some(HoldStatus::Expired),
            _ => None,
        }
    }

    /// Only open holds accept an action
    pub fn is_modifiable(&self) -> bool {
        matches!(self, HoldStatus::Open)
    }
}

/// Resolution action for a hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldActionType {
    /// Retry delivery to the same recipient
    Redelivery,
    /// Deliver to a new recipient/address
    RedeliveryNewAddress,
    /// Return to the sender
    ReturnToSender,
    /// Destroy the parcel
    Disposal,
    /// Recipient collects at the carrier depot
    DepotPickup,
}

impl fmt::Display for HoldActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldActionType::Redelivery => write!(f, "redelivery"),
            HoldActionType::RedeliveryNewAddress => write!(f, "redelivery_new_address"),
            HoldActionType::ReturnToSender => write!(f, "return_to_sender"),
            HoldActionType::Disposal => write!(f, "disposal"),
            HoldActionType::DepotPickup => write!(f, "depot_pickup"),
        }
    }
}

impl HoldActionType {
    /// Parse from string, accepting the Italian operational names
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "redelivery" | "riconsegna" => Some(HoldActionType::Redelivery),
            "redelivery_new_address" | "riconsegna_nuovo_destinatario" => {
                Some(HoldActionType::RedeliveryNewAddress)
            }
            "return_to_sender" | "reso_mittente" => Some(HoldActionType::ReturnToSender),
            "disposal" | "distruzione" => Some(HoldActionType::Disposal),
            "depot_pickup" | "ritiro_in_sede" => Some(HoldActionType::DepotPickup),
            _ => None,
        }
    }

    pub fn requires_new_address(&self) -> bool {
        matches!(self, HoldActionType::RedeliveryNewAddress)
    }
}

/// Delivery address supplied with a redirect action
///
/// Italian addresses need a 5-digit CAP and a 2-letter province code;
/// other countries only need a postal code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_italian_format"))]
pub struct Address {
    #[validate(length(min = 1, message = "recipient name is required"))]
    pub name: String,

    #[validate(length(min = 1, message = "street is required"))]
    pub street: String,

    #[validate(length(min = 1, message = "city is required"))]
    pub city: String,

    #[validate(length(min = 1, max = 12, message = "postal code is required"))]
    pub postal_code: String,

    #[validate(length(max = 50))]
    #[serde(default)]
    pub province: String,

    #[serde(default = "default_country")]
    pub country: String,

    pub phone: Option<String>,
}

fn default_country() -> String {
    "IT".to_string()
}

fn validate_italian_format(address: &Address) -> Result<(), ValidationError> {
    if !address.country.trim().eq_ignore_ascii_case("IT") {
        return Ok(());
    }

    let cap = address.postal_code.trim();
    if cap.len() != 5 || !cap.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new("postal_code")
            .with_message("postal code must have 5 digits".into()));
    }

    let province = address.province.trim();
    if province.len() != 2 || !province.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::new("province")
            .with_message("province must be a 2-letter code".into()));
    }

    Ok(())
}

/// Hold entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentHold {
    pub id: Uuid,
    pub user_id: Uuid,
    pub shipment_id: Uuid,
    pub courier_code: String,

    /// What the customer paid for the shipment; base for percent fees
    pub shipment_cost: Decimal,

    /// Carrier-reported reason (absent recipient, refused, ...)
    pub reason: Option<String>,

    pub status: HoldStatus,
    pub action_type: Option<HoldActionType>,
    pub action_cost: Option<Decimal>,
    pub new_address: Option<Address>,

    /// Ledger row that paid the action
    pub wallet_transaction_id: Option<Uuid>,

    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShipmentHold {
    /// Idempotency key for charging `action` on this version of the hold
    pub fn action_idempotency_key(&self, action: HoldActionType) -> String {
        format!(
            "giacenza:{}:{}:{}",
            self.id,
            action,
            self.updated_at.timestamp_millis()
        )
    }
}

/// Outcome of a settled hold action
#[derive(Debug, Clone, Serialize)]
pub struct HoldActionResult {
    pub hold: ShipmentHold,
    /// Ledger row that paid the action; `None` for free actions
    pub wallet_transaction_id: Option<Uuid>,
}

impl Default for ShipmentHold {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            shipment_id: Uuid::new_v4(),
            courier_code: String::new(),
            shipment_cost: Decimal::ZERO,
            reason: None,
            status: HoldStatus::Open,
            action_type: None,
            action_cost: None,
            new_address: None,
            wallet_transaction_id: None,
            opened_at: now,
            updated_at: now,
        }
    }
}

/// Fee schedule of one action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ActionFee {
    pub fixed_fee: Decimal,
    /// Percent of the shipment cost
    pub percent_of_shipment: Decimal,
}

/// Storage-surcharge configuration of a courier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSurchargeConfig {
    pub courier_code: String,
    /// Flat dossier fee (diritto fisso) added to every action
    pub dossier_fee: Decimal,
    pub actions: HashMap<HoldActionType, ActionFee>,
}

impl StorageSurchargeConfig {
    /// Cost of `action` for a shipment that cost `shipment_cost`;
    /// `None` when the courier does not offer the action
    pub fn action_cost(&self, action: HoldActionType, shipment_cost: Decimal) -> Option<Decimal> {
        let fee = self.actions.get(&action)?;
        Some(round2(
            fee.fixed_fee + percent_of(shipment_cost, fee.percent_of_shipment) + self.dossier_fee,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config() -> StorageSurchargeConfig {
        let mut actions = HashMap::new();
        actions.insert(
            HoldActionType::Redelivery,
            ActionFee {
                fixed_fee: dec!(4.00),
                percent_of_shipment: dec!(10),
            },
        );
        actions.insert(HoldActionType::Disposal, ActionFee::default());
        StorageSurchargeConfig {
            courier_code: "BRT".to_string(),
            dossier_fee: dec!(1.50),
            actions,
        }
    }

    #[test]
    fn test_action_cost() {
        let cfg = config();
        // 4.00 + 10% of 8.55 + 1.50 = 6.355 -> 6.36
        assert_eq!(
            cfg.action_cost(HoldActionType::Redelivery, dec!(8.55)),
            Some(dec!(6.36))
        );
        assert_eq!(
            cfg.action_cost(HoldActionType::Disposal, dec!(8.55)),
            Some(dec!(1.50))
        );
        assert_eq!(cfg.action_cost(HoldActionType::ReturnToSender, dec!(8.55)), None);
    }

    #[test]
    fn test_only_open_is_modifiable() {
        assert!(HoldStatus::Open.is_modifiable());
        assert!(!HoldStatus::ActionConfirmed.is_modifiable());
        assert!(!HoldStatus::Completed.is_modifiable());
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!(
            HoldActionType::from_str("riconsegna_nuovo_destinatario"),
            Some(HoldActionType::RedeliveryNewAddress)
        );
        assert_eq!(
            HoldActionType::from_str("return_to_sender"),
            Some(HoldActionType::ReturnToSender)
        );
        assert!(HoldActionType::RedeliveryNewAddress.requires_new_address());
        assert!(!HoldActionType::Redelivery.requires_new_address());
    }

    #[test]
    fn test_idempotency_key_tracks_hold_version() {
        let hold = ShipmentHold::default();
        let key = hold.action_idempotency_key(HoldActionType::Redelivery);
        assert!(key.starts_with(&format!("giacenza:{}:redelivery:", hold.id)));

        let touched = ShipmentHold {
            updated_at: hold.updated_at + chrono::Duration::seconds(1),
            ..hold.clone()
        };
        assert_ne!(key, touched.action_idempotency_key(HoldActionType::Redelivery));
    }

    #[test]
    fn test_address_validation() {
        let address = Address {
            name: "Mario Rossi".to_string(),
            street: "Via Roma 1".to_string(),
            city: "Milano".to_string(),
            postal_code: "20121".to_string(),
            province: "MI".to_string(),
            country: "IT".to_string(),
            phone: None,
        };
        assert!(address.validate().is_ok());

        let missing_street = Address {
            street: String::new(),
            ..address.clone()
        };
        assert!(missing_street.validate().is_err());

        let bad_cap = Address {
            postal_code: "2012".to_string(),
            ..address.clone()
        };
        assert!(bad_cap.validate().is_err());

        let bad_province = Address {
            province: "Milano".to_string(),
            ..address
        };
        assert!(bad_province.validate().is_err());
    }

    #[test]
    fn test_foreign_address_skips_italian_rules() {
        let address = Address {
            name: "Anna Weber".to_string(),
            street: "Hauptstrasse 5".to_string(),
            city: "Wien".to_string(),
            postal_code: "1010".to_string(),
            province: String::new(),
            country: "AT".to_string(),
            phone: None,
        };
        assert!(address.validate().is_ok());

        let italian = Address {
            country: "IT".to_string(),
            ..address
        };
        assert!(italian.validate().is_err());
    }
}
