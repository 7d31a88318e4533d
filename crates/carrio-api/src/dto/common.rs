//! Common DTOs used across the API

use carrio_core::zone::Destination;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a success response with data
    pub fn success(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    /// Create a success response with data and message
    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Shipment destination
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DestinationDto {
    /// ISO 3166-1 alpha-2 country code
    #[serde(default = "default_country")]
    #[validate(length(equal = 2, message = "country must be a 2-letter ISO code"))]
    pub country: String,

    /// Province code, e.g. "PA"
    #[validate(length(min = 2, max = 2, message = "province must be a 2-letter code"))]
    pub province: Option<String>,

    /// Postal code (CAP)
    #[validate(length(min = 4, max = 10))]
    pub postal_code: Option<String>,
}

fn default_country() -> String {
    "IT".to_string()
}

impl From<&DestinationDto> for Destination {
    fn from(dto: &DestinationDto) -> Self {
        Destination {
            country: dto.country.trim().to_uppercase(),
            province: dto.province.as_ref().map(|p| p.trim().to_uppercase()),
            postal_code: dto.postal_code.as_ref().map(|c| c.trim().to_string()),
        }
    }
}
