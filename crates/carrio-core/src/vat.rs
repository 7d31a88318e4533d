//! VAT mode normalization
//!
//! Price lists written before VAT semantics were explicit have no mode, or
//! a free-form string. Every consumer reads the mode through
//! [`normalize_vat_mode`] so legacy and explicit `excluded` lists price
//! identically.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;
use crate::AppResult;
use crate::money::{percent_of, round2};

/// Italian standard rate, used for lists stored without one
pub const DEFAULT_VAT_RATE: Decimal = Decimal::from_parts(22, 0, 0, false, 0);

/// Canonical VAT mode of a price list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VatMode {
    /// Stored prices already contain VAT
    Included,
    /// VAT is added on top of stored prices
    #[default]
    Excluded,
}

impl fmt::Display for VatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VatMode::Included => write!(f, "included"),
            VatMode::Excluded => write!(f, "excluded"),
        }
    }
}

impl VatMode {
    /// Parse a stored value; anything unrecognised yields `None`
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "included" | "inclusa" | "incl" => Some(VatMode::Included),
            "excluded" | "esclusa" | "excl" => Some(VatMode::Excluded),
            _ => None,
        }
    }
}

/// Map a stored (possibly missing or legacy) VAT mode to a canonical one
#[inline]
pub fn normalize_vat_mode(stored: Option<VatMode>) -> VatMode {
    stored.unwrap_or(VatMode::Excluded)
}

/// Normalize a raw column value as found in storage
pub fn normalize_stored_vat_mode(raw: Option<&str>) -> VatMode {
    normalize_vat_mode(raw.and_then(VatMode::from_str))
}

/// Reject rates outside `[0, 100)`
pub fn validate_vat_rate(rate: Decimal) -> AppResult<()> {
    if rate < Decimal::ZERO || rate >= Decimal::ONE_HUNDRED {
        return Err(AppError::InvalidInput(format!(
            "VAT rate must be at least 0% and below 100%, got {}%",
            rate
        )));
    }
    Ok(())
}

fn vat_factor(rate: Decimal) -> AppResult<Decimal> {
    validate_vat_rate(rate)?;
    Ok(Decimal::ONE + rate / Decimal::ONE_HUNDRED)
}

/// VAT breakdown of a net amount under a given mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatBreakdown {
    /// VAT contained in (included) or added to (excluded) the amount
    pub vat_amount: Decimal,
    /// Customer-facing total
    pub total: Decimal,
}

/// Apply a VAT mode to an amount
///
/// `excluded` adds `rate%` on top; `included` keeps the amount as the total
/// and reports the VAT embedded in it.
pub fn apply_vat(amount: Decimal, mode: VatMode, rate: Decimal) -> AppResult<VatBreakdown> {
    let factor = vat_factor(rate)?;
    let breakdown = match mode {
        VatMode::Excluded => {
            let vat_amount = round2(percent_of(amount, rate));
            VatBreakdown {
                vat_amount,
                total: amount + vat_amount,
            }
        }
        VatMode::Included => VatBreakdown {
            vat_amount: round2(amount - amount / factor),
            total: amount,
        },
    };
    Ok(breakdown)
}

/// Convert an amount stored under `from` into the equivalent under `to`
///
/// No rounding is applied; callers round once at the end of their pipeline.
pub fn convert_vat_basis(
    amount: Decimal,
    from: VatMode,
    to: VatMode,
    rate: Decimal,
) -> AppResult<Decimal> {
    let factor = vat_factor(rate)?;
    let converted = match (from, to) {
        (VatMode::Included, VatMode::Excluded) => amount / factor,
        (VatMode::Excluded, VatMode::Included) => amount * factor,
        _ => amount,
    };
    Ok(converted)
}
