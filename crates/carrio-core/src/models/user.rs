//! User profile model
//!
//! Only the attributes the engine needs for contract attribution.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Commercial account type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserAccountType {
    /// Regular customer on platform contracts
    #[default]
    User,
    /// Reseller with its own customers and price lists
    Reseller,
    /// Bring-your-own-contract customer
    Byoc,
}

impl fmt::Display for UserAccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserAccountType::User => write!(f, "user"),
            UserAccountType::Reseller => write!(f, "reseller"),
            UserAccountType::Byoc => write!(f, "byoc"),
        }
    }
}

impl UserAccountType {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(UserAccountType::User),
            "reseller" => Some(UserAccountType::Reseller),
            "byoc" => Some(UserAccountType::Byoc),
            _ => None,
        }
    }
}

/// User as seen by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub account_type: UserAccountType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_parsing() {
        assert_eq!(UserAccountType::from_str("BYOC"), Some(UserAccountType::Byoc));
        assert_eq!(UserAccountType::from_str("reseller"), Some(UserAccountType::Reseller));
        assert_eq!(UserAccountType::from_str("admin"), None);
    }
}
