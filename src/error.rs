//! Error types for the Exam Data Manager.
//!
//! This module provides strongly-typed errors using the `thiserror` crate.
//! Component errors (storage, fee estimation, job tracking) convert into
//! [`ServiceError`], which the API layer translates into HTTP responses.

use thiserror::Error;

/// The main error type for the Exam Data Manager.
///
/// Every service-level operation returns this error type, so the HTTP layer
/// has exactly one place where errors become status codes.
///
/// # Example
///
/// ```
/// use exam_data_manager::error::ServiceError;
///
/// let error = ServiceError::NotFound {
///     resource: "employee",
///     id: "42".to_string(),
/// };
/// assert_eq!(error.to_string(), "employee not found: 42");
/// ```
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A request or spreadsheet row failed validation.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// The field or input that failed validation.
        field: String,
        /// A description of the problem.
        message: String,
    },

    /// The requested resource does not exist.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// The kind of resource (e.g. "employee", "job").
        resource: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// The operation conflicts with existing state.
    #[error("Conflict: {message}")]
    Conflict {
        /// A description of the conflict.
        message: String,
    },

    /// A backing service (document store, fee estimator) is unreachable.
    #[error("{service} unavailable: {message}")]
    ServiceUnavailable {
        /// The name of the unreachable service.
        service: &'static str,
        /// The underlying failure.
        message: String,
    },

    /// An unexpected internal failure.
    #[error("Internal error: {message}")]
    Internal {
        /// A description of the failure.
        message: String,
    },

    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParse {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// A configuration value was present but invalid.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidConfig {
        /// The configuration key.
        key: String,
        /// Why the value was rejected.
        message: String,
    },
}

impl ServiceError {
    /// Creates a validation error for the given field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// A type alias for Results that return ServiceError.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_displays_field_and_message() {
        let error = ServiceError::validation("name", "must not be empty");
        assert_eq!(
            error.to_string(),
            "Validation failed for 'name': must not be empty"
        );
    }

    #[test]
    fn test_not_found_displays_resource_and_id() {
        let error = ServiceError::NotFound {
            resource: "job",
            id: "abc".to_string(),
        };
        assert_eq!(error.to_string(), "job not found: abc");
    }

    #[test]
    fn test_service_unavailable_displays_service() {
        let error = ServiceError::ServiceUnavailable {
            service: "document store",
            message: "connection refused".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "document store unavailable: connection refused"
        );
    }

    #[test]
    fn test_config_parse_error_displays_path_and_message() {
        let error = ServiceError::ConfigParse {
            path: "/config/service.yaml".to_string(),
            message: "invalid YAML syntax".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to parse configuration file '/config/service.yaml': invalid YAML syntax"
        );
    }

    #[test]
    fn test_errors_implement_std_error() {
        fn assert_error<T: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<ServiceError>();
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn returns_conflict() -> ServiceResult<()> {
            Err(ServiceError::Conflict {
                message: "duplicate".to_string(),
            })
        }

        fn propagates_error() -> ServiceResult<()> {
            returns_conflict()?;
            Ok(())
        }

        assert!(matches!(
            propagates_error(),
            Err(ServiceError::Conflict { .. })
        ));
    }
}
