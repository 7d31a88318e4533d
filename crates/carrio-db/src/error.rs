//! sqlx error classification
//!
//! Maps PostgreSQL failures onto `AppError`, separating the transient
//! conflicts the wallet ledger retries from everything else.

use carrio_core::AppError;

/// serialization_failure
pub const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";
/// deadlock_detected
pub const SQLSTATE_DEADLOCK_DETECTED: &str = "40P01";
/// lock_not_available
pub const SQLSTATE_LOCK_NOT_AVAILABLE: &str = "55P03";
/// unique_violation
pub const SQLSTATE_UNIQUE_VIOLATION: &str = "23505";

/// Whether a SQLSTATE denotes a conflict worth retrying the whole transaction for
pub fn is_transient_sqlstate(code: &str) -> bool {
    matches!(
        code,
        SQLSTATE_SERIALIZATION_FAILURE | SQLSTATE_DEADLOCK_DETECTED | SQLSTATE_LOCK_NOT_AVAILABLE
    )
}

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// Map a sqlx error to `AppError`, with `context` describing the failed step
pub fn map_db_error(context: &str, err: sqlx::Error) -> AppError {
    match sqlstate(&err) {
        Some(code) if is_transient_sqlstate(&code) => {
            AppError::TransientConflict(format!("{}: {} ({})", context, err, code))
        }
        _ => AppError::Database(format!("{}: {}", context, err)),
    }
}

/// Like [`map_db_error`] but also treats unique violations as transient.
///
/// Used on the ledger insert: a concurrent writer that committed the same
/// idempotency key first makes the retry land on the replay path.
pub fn map_ledger_error(context: &str, err: sqlx::Error) -> AppError {
    match sqlstate(&err) {
        Some(code) if code == SQLSTATE_UNIQUE_VIOLATION => {
            AppError::TransientConflict(format!("{}: duplicate idempotency key", context))
        }
        _ => map_db_error(context, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_sqlstates() {
        assert!(is_transient_sqlstate("40001"));
        assert!(is_transient_sqlstate("40P01"));
        assert!(is_transient_sqlstate("55P03"));
        assert!(!is_transient_sqlstate("23505"));
        assert!(!is_transient_sqlstate("42P01"));
    }

    #[test]
    fn test_non_database_errors_are_not_transient() {
        let err = map_db_error("loading wallet", sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::Database(_)));
        assert!(!err.is_retryable());
    }
}
