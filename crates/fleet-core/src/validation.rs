//! # Validation Module
//!
//! Optional strictness checks for inventory input.
//!
//! ## Where Validation Runs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Deserialization (serde)                                      │
//! │  ├── RFC3339 timestamps, known collection keys                         │
//! │  └── null / missing lists normalized to empty                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Duplicate IDs in one snapshot (opt-in reject policy)              │
//! │  └── Targeting config of projects / applications / bindings            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Delta computation                                            │
//! │  └── Total: never fails, last occurrence of an ID wins                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use fleet_core::validation::validate_edge_selection;
//! use fleet_core::{CategoryInfo, EdgeSelectorType};
//!
//! let selectors = vec![CategoryInfo::new("Region", "SFO")];
//! assert!(validate_edge_selection(EdgeSelectorType::Category, &[], &selectors).is_ok());
//! assert!(validate_edge_selection(EdgeSelectorType::Category, &[], &[]).is_err());
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::inventory::EdgeInventoryDeltaPayload;
use crate::types::{CategoryInfo, EdgeSelectorType, EntityKind, EntityVersionMetadata};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Snapshot Validators
// =============================================================================

/// Rejects a snapshot that lists the same entity ID more than once.
///
/// The error names the first repeated ID in list order.
pub fn validate_unique_ids(
    kind: EntityKind,
    snapshot: &[EntityVersionMetadata],
) -> ValidationResult<()> {
    let mut seen = HashSet::with_capacity(snapshot.len());
    for evm in snapshot {
        if evm.id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: format!("{kind}.id"),
            });
        }
        if !seen.insert(evm.id.as_str()) {
            return Err(ValidationError::Duplicate {
                field: format!("{kind}.id"),
                value: evm.id.clone(),
            });
        }
    }
    Ok(())
}

/// Runs [`validate_unique_ids`] over every collection of an edge payload.
pub fn validate_payload_unique_ids(payload: &EdgeInventoryDeltaPayload) -> ValidationResult<()> {
    EntityKind::ALL
        .iter()
        .try_for_each(|kind| validate_unique_ids(*kind, payload.snapshot(*kind)))
}

// =============================================================================
// Targeting Validators
// =============================================================================

/// Validates one category assignment.
pub fn validate_category_info(info: &CategoryInfo) -> ValidationResult<()> {
    if info.id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "categoryInfo.id".to_string(),
        });
    }
    if info.value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "categoryInfo.value".to_string(),
        });
    }
    Ok(())
}

/// Validates how an owning entity targets edges.
///
/// ## Rules
/// - `Category` needs at least one selector, every selector well formed
/// - `Explicit` needs at least one edge ID and no blank IDs
///
/// A category-targeted entity without selectors would silently match no
/// edge at all, since an empty selector set never matches.
pub fn validate_edge_selection(
    selector_type: EdgeSelectorType,
    edge_ids: &[String],
    selectors: &[CategoryInfo],
) -> ValidationResult<()> {
    match selector_type {
        EdgeSelectorType::Category => {
            if selectors.is_empty() {
                return Err(ValidationError::Required {
                    field: "edgeSelectors".to_string(),
                });
            }
            selectors.iter().try_for_each(validate_category_info)
        }
        EdgeSelectorType::Explicit => {
            if edge_ids.is_empty() {
                return Err(ValidationError::Required {
                    field: "edgeIds".to_string(),
                });
            }
            if edge_ids.iter().any(|id| id.trim().is_empty()) {
                return Err(ValidationError::InvalidFormat {
                    field: "edgeIds".to_string(),
                    reason: "must not contain blank IDs".to_string(),
                });
            }
            Ok(())
        }
    }
}

/// Parses a collection name given by an operator.
pub fn validate_collection_name(name: &str) -> ValidationResult<EntityKind> {
    name.parse().map_err(|_| ValidationError::NotAllowed {
        field: "collection".to_string(),
        allowed: EntityKind::ALL
            .iter()
            .map(|kind| kind.wire_name().to_string())
            .collect(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn evm(id: &str) -> EntityVersionMetadata {
        EntityVersionMetadata::new(id, Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_unique_ids() {
        assert!(validate_unique_ids(EntityKind::Projects, &[]).is_ok());
        assert!(validate_unique_ids(EntityKind::Projects, &[evm("a"), evm("b")]).is_ok());

        let err = validate_unique_ids(EntityKind::Projects, &[evm("a"), evm("b"), evm("a")])
            .unwrap_err();
        assert_eq!(err.to_string(), "Projects.id 'a' is duplicated");

        let err = validate_unique_ids(EntityKind::MlModels, &[evm(" ")]).unwrap_err();
        assert_eq!(err.to_string(), "MLModels.id is required");
    }

    #[test]
    fn test_payload_unique_ids() {
        let payload = EdgeInventoryDeltaPayload::default()
            .with(EntityKind::Projects, vec![evm("p1")])
            .with(EntityKind::SvcBindings, vec![evm("b1"), evm("b1")]);
        let err = validate_payload_unique_ids(&payload).unwrap_err();
        assert!(matches!(err, ValidationError::Duplicate { ref value, .. } if value == "b1"));

        // the same ID in two collections is fine
        let payload = EdgeInventoryDeltaPayload::default()
            .with(EntityKind::Projects, vec![evm("x")])
            .with(EntityKind::Applications, vec![evm("x")]);
        assert!(validate_payload_unique_ids(&payload).is_ok());
    }

    #[test]
    fn test_edge_selection() {
        let selectors = vec![CategoryInfo::new("Region", "SFO")];
        let ids = vec!["edge-1".to_string()];

        assert!(validate_edge_selection(EdgeSelectorType::Category, &[], &selectors).is_ok());
        assert!(validate_edge_selection(EdgeSelectorType::Explicit, &ids, &[]).is_ok());

        let err = validate_edge_selection(EdgeSelectorType::Category, &ids, &[]).unwrap_err();
        assert_eq!(err.to_string(), "edgeSelectors is required");

        let err = validate_edge_selection(EdgeSelectorType::Explicit, &[], &selectors).unwrap_err();
        assert_eq!(err.to_string(), "edgeIds is required");

        let blank = vec![CategoryInfo::new("Region", "")];
        assert!(validate_edge_selection(EdgeSelectorType::Category, &[], &blank).is_err());

        let blank_id = vec![" ".to_string()];
        assert!(validate_edge_selection(EdgeSelectorType::Explicit, &blank_id, &[]).is_err());
    }

    #[test]
    fn test_collection_name() {
        assert_eq!(
            validate_collection_name("SvcBindings").unwrap(),
            EntityKind::SvcBindings
        );
        let err = validate_collection_name("Widgets").unwrap_err();
        assert!(matches!(err, ValidationError::NotAllowed { ref allowed, .. } if allowed.len() == 16));
    }
}
