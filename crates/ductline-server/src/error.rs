//! Error taxonomy shared by the waitlist and checkout workflows.

use thiserror::Error;

use crate::payments::PaymentError;
use crate::storage::DatabaseError;

/// Outcome of a failed workflow call.
///
/// `Validation` messages are written for end users and may be shown
/// verbatim. The other variants carry detail for logs only.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("Email already registered at position {position}")]
    DuplicateEntry { position: i64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream failure: {0}")]
    Upstream(String),
}

impl From<DatabaseError> for ServiceError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound(what) => Self::NotFound(what),
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl From<PaymentError> for ServiceError {
    fn from(e: PaymentError) -> Self {
        Self::Upstream(e.to_string())
    }
}

impl ServiceError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_not_found_stays_not_found() {
        let err: ServiceError = DatabaseError::NotFound("Waitlist entry e1".into()).into();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn other_database_errors_are_upstream() {
        let err: ServiceError = DatabaseError::Query("disk I/O error".into()).into();
        assert!(matches!(err, ServiceError::Upstream(_)));
    }

    #[test]
    fn validation_message_is_verbatim() {
        let err = ServiceError::validation("Please enter a valid email address");
        assert_eq!(err.to_string(), "Please enter a valid email address");
    }
}
