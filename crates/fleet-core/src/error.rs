//! # Error Types
//!
//! Domain-specific error types for fleet-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  fleet-core errors (this file)                                         │
//! │  ├── CoreError        - Wire parsing and domain errors                 │
//! │  └── ValidationError  - Payload / selector validation failures         │
//! │                                                                         │
//! │  fleet-sync errors (separate crate)                                    │
//! │  ├── RepositoryError  - Collaborator failures                          │
//! │  └── SyncError        - What the request handler sees                  │
//! │                                                                         │
//! │  Flow: ValidationError → SyncError → HTTP layer                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Selector matching, selector combination and snapshot diffing are total
//! functions and have no error path. Errors here only come from parsing
//! wire values and from explicit validation.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A collection name that is not one of the tracked entity kinds.
    ///
    /// ## When This Occurs
    /// - Operator passes `--collection Widgets` to the replay tool
    /// - A fixture file keys records by a misspelled collection
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// A deployment state other than DEPLOY / UNDEPLOY.
    #[error("Unknown entity state: {0}")]
    UnknownEntityState(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised by the optional checks in [`crate::validation`]. The delta
/// computer itself never fails; callers opt in to strictness.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Invalid format (e.g., blank category value).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., the same entity ID twice in one snapshot).
    #[error("{field} '{value}' is duplicated")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::UnknownCollection("Widgets".to_string());
        assert_eq!(err.to_string(), "Unknown collection: Widgets");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "edgeSelectors".to_string(),
        };
        assert_eq!(err.to_string(), "edgeSelectors is required");

        let err = ValidationError::Duplicate {
            field: "Applications.id".to_string(),
            value: "app-1".to_string(),
        };
        assert_eq!(err.to_string(), "Applications.id 'app-1' is duplicated");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "edgeIds".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
