//! Rate and matrix DTOs

use super::common::DestinationDto;
use carrio_core::models::{DeliveryMode, MatrixOptions};
use carrio_core::vat::VatMode;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Rate quote request
///
/// Either `price_list_id` or `user_id` selects the list; with only a user
/// the user's most recent active assignment is used.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuoteRequest {
    /// Parcel weight in kg (must be positive, validated by the resolver)
    pub weight: Decimal,

    #[validate(nested)]
    pub destination: DestinationDto,

    #[validate(length(min = 1, max = 50))]
    pub service_type: Option<String>,

    pub price_list_id: Option<Uuid>,

    pub user_id: Option<Uuid>,
}

/// Matrix build request
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_matrix_rates"))]
pub struct MatrixRequest {
    /// Margin in percent, e.g. 33 for +33%
    pub margin_percent: Decimal,

    /// `included` or `excluded`; defaults to the list's mode
    pub vat_mode: Option<VatMode>,

    /// VAT rate in percent; defaults to the list's rate
    pub vat_rate: Option<Decimal>,

    #[serde(default)]
    pub delivery_mode: DeliveryMode,

    pub pickup_fee: Option<Decimal>,

    pub processing_fee: Option<Decimal>,
}

fn validate_matrix_rates(req: &MatrixRequest) -> Result<(), ValidationError> {
    if req.margin_percent <= -Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("margin_percent")
            .with_message("margin must be above -100%".into()));
    }
    if let Some(rate) = req.vat_rate {
        if rate < Decimal::ZERO || rate >= Decimal::ONE_HUNDRED {
            return Err(ValidationError::new("vat_rate")
                .with_message("VAT rate must be at least 0% and below 100%".into()));
        }
    }
    Ok(())
}

impl MatrixRequest {
    /// Auxiliary options recorded with the matrix
    pub fn options(&self) -> MatrixOptions {
        MatrixOptions {
            delivery_mode: self.delivery_mode,
            pickup_fee: self.pickup_fee,
            processing_fee: self.processing_fee,
        }
    }
}
