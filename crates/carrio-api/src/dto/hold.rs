//! Hold action DTOs

use carrio_core::models::Address;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Hold action request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct HoldActionRequest {
    /// Owner of the hold
    pub user_id: Uuid,

    /// Action name; English or Italian operational names are accepted
    #[validate(length(min = 1, message = "action is required"))]
    pub action: String,

    /// Required for `redelivery_new_address`
    #[validate(nested)]
    pub new_address: Option<Address>,
}
