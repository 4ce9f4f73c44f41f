//! # Sync Error Types
//!
//! Error types for inventory delta requests.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Scope       │  │     Collection          │ │
//! │  │                 │  │  (hard fail)    │  │  (isolated per kind)    │ │
//! │  │  InvalidConfig  │  │  UnknownEdge    │  │  Repository             │ │
//! │  │  ConfigLoad...  │  │  Scope          │  │  CollectionTimeout      │ │
//! │  │  ConfigSave...  │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │     Input       │  │    Internal     │                              │
//! │  │  Validation     │  │  Internal       │                              │
//! │  │                 │  │  Serialization  │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use fleet_core::{EntityKind, ValidationError};
use thiserror::Error;

use crate::repository::RepositoryError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Error type covering every way an inventory delta request can fail.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid delta configuration.
    #[error("Invalid delta configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Scope Errors
    // =========================================================================
    /// The requesting edge does not exist in the tenant.
    #[error("Unknown edge {edge_id} in tenant {tenant_id}")]
    UnknownEdge { tenant_id: String, edge_id: String },

    /// Resolving what the edge may see failed.
    #[error("Failed to resolve edge scope: {0}")]
    Scope(RepositoryError),

    // =========================================================================
    // Collection Errors
    // =========================================================================
    /// A collaborator failed while reading one collection.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// One collection took longer than the configured budget.
    #[error("Collection {kind} timed out after {timeout_ms} ms")]
    CollectionTimeout { kind: EntityKind, timeout_ms: u64 },

    // =========================================================================
    // Input Errors
    // =========================================================================
    /// The edge payload was rejected.
    #[error("Invalid payload: {0}")]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Failed to (de)serialize a fixture or response.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Internal orchestrator error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if the edge should simply try again later.
    ///
    /// ## Retryable Errors
    /// - Collaborator unavailable (store down, pool exhausted)
    /// - Collection timeouts
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Unknown edge
    /// - Rejected payloads
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Repository(err) | SyncError::Scope(err) => err.is_retryable(),
            SyncError::CollectionTimeout { .. } => true,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// Returns true if the request itself was at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SyncError::UnknownEdge { .. } | SyncError::Validation(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Repository(RepositoryError::Unavailable("pool".into())).is_retryable());
        assert!(SyncError::CollectionTimeout {
            kind: EntityKind::DataSources,
            timeout_ms: 50
        }
        .is_retryable());

        assert!(!SyncError::Repository(RepositoryError::Query("syntax".into())).is_retryable());
        assert!(!SyncError::InvalidConfig("bad".into()).is_retryable());
        assert!(!SyncError::UnknownEdge {
            tenant_id: "t".into(),
            edge_id: "e".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::CollectionTimeout {
            kind: EntityKind::MlModels,
            timeout_ms: 250,
        };
        assert_eq!(err.to_string(), "Collection MLModels timed out after 250 ms");

        let err = SyncError::UnknownEdge {
            tenant_id: "tenant-1".into(),
            edge_id: "edge-9".into(),
        };
        assert!(err.to_string().contains("edge-9"));
    }

    #[test]
    fn test_error_categories() {
        assert!(SyncError::ConfigLoadFailed("x".into()).is_config_error());
        assert!(SyncError::Validation(ValidationError::Required {
            field: "id".into()
        })
        .is_client_error());
        assert!(!SyncError::Internal("x".into()).is_client_error());
        assert!(!SyncError::Repository(RepositoryError::Query("x".into())).is_client_error());
    }

    #[test]
    fn test_validation_error_converts() {
        let err: SyncError = ValidationError::Duplicate {
            field: "Projects.id".into(),
            value: "p1".into(),
        }
        .into();
        assert!(matches!(err, SyncError::Validation(_)));
        assert_eq!(err.to_string(), "Invalid payload: Projects.id 'p1' is duplicated");
    }
}
