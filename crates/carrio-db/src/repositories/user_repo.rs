//! User profile repository implementation
//!
//! Read-only access to the account type used for contract attribution.

use carrio_core::{
    models::{UserAccountType, UserProfile},
    traits::UserProfileRepository,
    AppResult,
};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::error::map_db_error;

/// PostgreSQL implementation of UserProfileRepository
pub struct PgUserProfileRepository {
    pool: PgPool,
}

impl PgUserProfileRepository {
    /// Create a new user profile repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Parse account type, falling back to a regular user
    fn parse_account_type(s: &str) -> UserAccountType {
        UserAccountType::from_str(s).unwrap_or_else(|| {
            warn!("Unknown account type '{}', treating as user", s);
            UserAccountType::User
        })
    }
}

#[async_trait]
impl UserProfileRepository for PgUserProfileRepository {
    #[instrument(skip(self))]
    async fn find_profile(&self, user_id: Uuid) -> AppResult<Option<UserProfile>> {
        debug!("Finding profile of user {}", user_id);

        let result = sqlx::query(
            r#"
            SELECT id, account_type
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .map(|row: sqlx::postgres::PgRow| UserProfile {
            id: row.get("id"),
            account_type: Self::parse_account_type(row.get("account_type")),
        })
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding profile {}: {}", user_id, e);
            map_db_error("Failed to find user profile", e)
        })?;

        Ok(result)
    }
}
