//! Store errors, normalised into a small closed set of kinds.
//!
//! Diesel and r2d2 report failures in many shapes. Everything above the
//! storage layer only ever sees a [`BackendError`], so the HTTP layer can map
//! each kind to exactly one status code.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid data: {0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("temporarily unavailable: {0}")]
    Transient(String),

    #[error("unexpected store error: {0}")]
    Unknown(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

impl From<DieselError> for BackendError {
    fn from(error: DieselError) -> Self {
        match error {
            DieselError::NotFound => BackendError::NotFound,
            DieselError::DatabaseError(kind, info) => {
                let message = info.message().to_string();
                match kind {
                    DatabaseErrorKind::UniqueViolation
                    | DatabaseErrorKind::ForeignKeyViolation => {
                        BackendError::Conflict(message)
                    }
                    DatabaseErrorKind::NotNullViolation
                    | DatabaseErrorKind::CheckViolation => {
                        BackendError::Validation(message)
                    }
                    DatabaseErrorKind::ClosedConnection
                    | DatabaseErrorKind::SerializationFailure
                    | DatabaseErrorKind::ReadOnlyTransaction => {
                        BackendError::Transient(message)
                    }
                    // sqlite reports lock contention as an unknown error
                    _ if message.contains("locked")
                        || message.contains("busy") =>
                    {
                        BackendError::Transient(message)
                    }
                    _ => BackendError::Unknown(message),
                }
            }
            DieselError::DeserializationError(e)
            | DieselError::SerializationError(e) => {
                BackendError::Unknown(e.to_string())
            }
            other => BackendError::Unknown(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for BackendError {
    fn from(error: diesel::r2d2::PoolError) -> Self {
        BackendError::Transient(error.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(error: serde_json::Error) -> Self {
        BackendError::Unknown(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    use super::BackendError;

    #[test]
    fn not_found_maps_to_not_found() {
        assert!(matches!(
            BackendError::from(DieselError::NotFound),
            BackendError::NotFound
        ));
    }

    #[test]
    fn unique_violation_is_a_conflict() {
        let err = DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("UNIQUE constraint failed: members.email".to_string()),
        );
        let mapped = BackendError::from(err);
        assert!(
            matches!(&mapped, BackendError::Conflict(msg) if msg.contains("members.email"))
        );
    }

    #[test]
    fn check_violation_is_a_validation_error() {
        let err = DieselError::DatabaseError(
            DatabaseErrorKind::CheckViolation,
            Box::new("CHECK constraint failed: role".to_string()),
        );
        assert!(matches!(
            BackendError::from(err),
            BackendError::Validation(_)
        ));
    }

    #[test]
    fn locked_database_is_transient() {
        let err = DieselError::DatabaseError(
            DatabaseErrorKind::Unknown,
            Box::new("database is locked".to_string()),
        );
        assert!(matches!(
            BackendError::from(err),
            BackendError::Transient(_)
        ));
    }
}
