/// Error type shared by the policy layer, the services and the repositories
///
/// Every failure a caller can observe is one of these variants. The HTTP layer
/// maps them onto status codes; nothing in this crate knows about HTTP.
///
/// # Example
///
/// ```
/// use teamboard_shared::error::{ServiceError, ServiceResult};
///
/// fn check(is_admin: bool) -> ServiceResult<()> {
///     if !is_admin {
///         return Err(ServiceError::Forbidden("Admin role required".into()));
///     }
///     Ok(())
/// }
///
/// assert!(matches!(check(false), Err(ServiceError::Forbidden(_))));
/// ```

/// Result alias used across the crate
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failures surfaced by services and repositories
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The actor lacks the role or membership the operation requires
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The input is well-formed but semantically disallowed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The referenced resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credentials were missing or wrong
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Infrastructure failure (database, hashing)
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ServiceError {
    /// Shorthand for a `Forbidden` error
    pub fn forbidden(msg: impl Into<String>) -> Self {
        ServiceError::Forbidden(msg.into())
    }

    /// Shorthand for a `Validation` error
    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }

    /// Shorthand for a `NotFound` error
    pub fn not_found(msg: impl Into<String>) -> Self {
        ServiceError::NotFound(msg.into())
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ServiceError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.constraint() {
                Some(constraint) if constraint.contains("email") => {
                    ServiceError::Validation("The email has already been taken".to_string())
                }
                Some("projects_dates_check") => ServiceError::Validation(
                    "The end date must be a date after or equal to the start date".to_string(),
                ),
                Some(constraint) if db_err.is_foreign_key_violation() => {
                    ServiceError::Validation(format!("Referenced record does not exist ({})", constraint))
                }
                _ => ServiceError::Storage(format!("Database error: {}", db_err)),
            },
            _ => ServiceError::Storage(format!("Database error: {}", err)),
        }
    }
}

impl From<crate::auth::password::PasswordError> for ServiceError {
    fn from(err: crate::auth::password::PasswordError) -> Self {
        ServiceError::Storage(format!("Password operation failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ServiceError::forbidden("Admin role required");
        assert_eq!(err.to_string(), "Forbidden: Admin role required");

        let err = ServiceError::validation("You cannot deactivate yourself");
        assert_eq!(err.to_string(), "Validation failed: You cannot deactivate yourself");
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: ServiceError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn test_pool_errors_are_storage() {
        let err: ServiceError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, ServiceError::Storage(_)));
    }
}
