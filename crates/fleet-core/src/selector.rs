//! # Category Selectors
//!
//! Boolean targeting rules over category labels.
//!
//! ## Semantics
//! ```text
//! selectors: [Region=SFO, Region=LAX, Tier=Gold]
//!
//!        Region ∈ {SFO, LAX}   AND   Tier ∈ {Gold}
//!        └──── OR within ────┘       └─ OR within ┘
//!                    └──── AND across IDs ────┘
//! ```
//!
//! An empty selector set never matches, and neither does an empty label set.
//! Entities that should reach every edge use explicit targeting instead.
//!
//! ## Combination
//! [`category_and`] narrows a nested scope (an application) by its parent
//! scope (the project). The overlay wins per category ID: a base entry whose
//! category is also constrained by the overlay survives only if the overlay
//! allows that exact value.

use std::collections::{HashMap, HashSet};

use crate::types::{
    CategoryInfo, EntityCategoryInfoMetadata, EntityCategorySelectorInfo, EntityVersionMetadata,
};

// =============================================================================
// Matching
// =============================================================================

/// Returns true if `labels` satisfy every category constrained by `selectors`.
///
/// ## Example
/// ```rust
/// use fleet_core::selector::category_match;
/// use fleet_core::CategoryInfo;
///
/// let labels = vec![CategoryInfo::new("Region", "SFO"), CategoryInfo::new("Tier", "Gold")];
/// let selectors = vec![CategoryInfo::new("Region", "LAX"), CategoryInfo::new("Tier", "Gold")];
/// assert!(!category_match(&labels, &selectors));
/// assert!(!category_match(&[], &selectors));
/// ```
pub fn category_match(labels: &[CategoryInfo], selectors: &[CategoryInfo]) -> bool {
    if labels.is_empty() || selectors.is_empty() {
        return false;
    }

    let mut all: HashSet<&str> = HashSet::new();
    let mut satisfied: HashSet<&str> = HashSet::new();

    for selector in selectors {
        all.insert(selector.id.as_str());
        if satisfied.contains(selector.id.as_str()) {
            continue;
        }
        if labels
            .iter()
            .any(|label| label.id == selector.id && label.value == selector.value)
        {
            satisfied.insert(selector.id.as_str());
        }
    }

    satisfied.len() == all.len()
}

// =============================================================================
// Combination
// =============================================================================

/// Merges `overlay` into `base`.
///
/// Kept `base` entries come first in their original order, followed by the
/// `overlay` entries whose category `base` does not mention.
pub fn category_and(base: &[CategoryInfo], overlay: &[CategoryInfo]) -> Vec<CategoryInfo> {
    if base.is_empty() {
        return overlay.to_vec();
    }

    let overlay_ids: HashSet<&str> = overlay.iter().map(|c| c.id.as_str()).collect();
    let base_ids: HashSet<&str> = base.iter().map(|c| c.id.as_str()).collect();

    let kept = base
        .iter()
        .filter(|cat| !overlay_ids.contains(cat.id.as_str()) || overlay.contains(cat));
    let appended = overlay
        .iter()
        .filter(|cat| !base_ids.contains(cat.id.as_str()));

    kept.chain(appended).cloned().collect()
}

// =============================================================================
// Entity Filtering
// =============================================================================

/// Filters category-targeted entities down to those matching `labels`.
///
/// Entities without any selector are kept only when `include_empty` is set.
/// The result preserves input order.
pub fn matching_entities(
    entities: &[EntityCategoryInfoMetadata],
    labels: &[CategoryInfo],
    include_empty: bool,
) -> Vec<EntityVersionMetadata> {
    entities
        .iter()
        .filter(|entity| {
            if entity.category_info.is_empty() {
                include_empty
            } else {
                category_match(labels, &entity.category_info)
            }
        })
        .map(EntityCategoryInfoMetadata::version)
        .collect()
}

/// Folds flat selector rows into one selector set per entity.
///
/// Entities appear in first-seen order; each entity's selectors keep row
/// order. The version of the first row of an entity is used.
pub fn group_selector_rows(rows: &[EntityCategorySelectorInfo]) -> Vec<EntityCategoryInfoMetadata> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(rows.len());
    let mut grouped: Vec<EntityCategoryInfoMetadata> = Vec::new();

    for row in rows {
        let slot = *index.entry(row.id.as_str()).or_insert_with(|| {
            grouped.push(EntityCategoryInfoMetadata {
                id: row.id.clone(),
                updated_at: row.updated_at,
                category_info: Vec::new(),
            });
            grouped.len() - 1
        });
        grouped[slot]
            .category_info
            .push(CategoryInfo::new(row.category_id.clone(), row.value.clone()));
    }

    grouped
}

// =============================================================================
// Unit Tests
// =============================================================================
