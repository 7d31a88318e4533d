//! Price list lifecycle DTOs

use serde::Deserialize;
use validator::Validate;

/// Status transition request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StatusRequest {
    /// Target status: draft, active or archived
    #[validate(length(min = 1, message = "status is required"))]
    pub status: String,
}
