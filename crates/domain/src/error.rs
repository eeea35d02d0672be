//! Domain error taxonomy.

use thiserror::Error;

use crate::models::emergency_request::RequestStatus;

/// Errors raised by the core services.
///
/// Everything except [`DomainError::Infrastructure`] describes a request that
/// cannot succeed as issued; retrying it is pointless.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Monthly request limit exceeded ({used}/{limit})")]
    QuotaExceeded { used: i32, limit: i32 },

    #[error("{0}")]
    SubscriptionInactive(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Whether the failure is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::Infrastructure(_))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        DomainError::NotFound(what.into())
    }
}

impl From<validator::ValidationError> for DomainError {
    fn from(err: validator::ValidationError) -> Self {
        DomainError::Validation(shared::validation::message_of(&err))
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        messages.sort();

        if messages.is_empty() {
            DomainError::Validation("Invalid input".to_string())
        } else {
            DomainError::Validation(messages.join(", "))
        }
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DomainError::NotFound("Resource not found".into()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23505") => DomainError::Conflict("Resource already exists".into()),
                Some("23503") => DomainError::NotFound("Referenced resource not found".into()),
                Some("23514") => DomainError::Validation(format!("Constraint violated: {}", db_err)),
                _ => DomainError::Infrastructure(format!("Database error: {}", db_err)),
            },
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DomainError::Infrastructure(format!("Corrupt row: {}", err))
            }
            _ => DomainError::Infrastructure(format!("Database error: {}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Contact {
        #[validate(length(min = 1, message = "Name is required"))]
        name: String,
    }

    #[test]
    fn test_only_infrastructure_is_retryable() {
        assert!(DomainError::Infrastructure("timeout".into()).is_retryable());
        assert!(!DomainError::Validation("bad".into()).is_retryable());
        assert!(!DomainError::Authorization("nope".into()).is_retryable());
        assert!(!DomainError::QuotaExceeded { used: 2, limit: 2 }.is_retryable());
        assert!(!DomainError::NotFound("x".into()).is_retryable());
    }

    #[test]
    fn test_display_messages_are_specific() {
        let err = DomainError::InvalidTransition {
            from: RequestStatus::Pending,
            to: RequestStatus::InProgress,
        };
        assert_eq!(
            err.to_string(),
            "Invalid status transition from pending to in_progress"
        );

        let err = DomainError::QuotaExceeded { used: 2, limit: 2 };
        assert_eq!(err.to_string(), "Monthly request limit exceeded (2/2)");
    }

    #[test]
    fn test_from_validation_errors() {
        let contact = Contact {
            name: String::new(),
        };
        let err: DomainError = contact.validate().unwrap_err().into();
        assert_eq!(err, DomainError::Validation("Name is required".into()));
    }

    #[test]
    fn test_from_sqlx_row_not_found() {
        let err: DomainError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn test_from_sqlx_pool_timeout_is_retryable() {
        let err: DomainError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_retryable());
    }
}
