//! # Snapshot Delta
//!
//! Computes what changed between two snapshots of one collection.
//!
//! ## Flow
//! ```text
//!   from (edge)                      to (cloud, authoritative)
//!   ┌──────────────┐                 ┌──────────────┐
//!   │ a  @ t1      │                 │ a  @ t1      │   unchanged → nowhere
//!   │ b  @ t1      │ ──── diff ────► │ b  @ t2      │   Updated  (b @ t2)
//!   │ c  @ t1      │                 │ d  @ t1      │   Created  (d)
//!   └──────────────┘                 └──────────────┘   Deleted  (c)
//! ```
//!
//! Timestamps are compared as instants. Two values with different offsets
//! that denote the same instant are equal, which `DateTime<Utc>` guarantees.
//!
//! ## Duplicate IDs
//! A list carrying the same ID twice is resolved by its last occurrence, and
//! each ID is classified at most once. Callers that would rather reject such
//! input run [`crate::validation::validate_unique_ids`] first.

use std::collections::HashMap;

use crate::types::{EntityVersionMetadata, EntityVersionMetadataChangeInfo};

/// Maps each ID to the position of its last occurrence.
fn last_positions(list: &[EntityVersionMetadata]) -> HashMap<&str, usize> {
    let mut positions = HashMap::with_capacity(list.len());
    for (i, evm) in list.iter().enumerate() {
        positions.insert(evm.id.as_str(), i);
    }
    positions
}

/// Computes the delta that turns `from` into `to`.
///
/// `Updated` carries the `to` entry so the receiver learns the new
/// timestamp. The three result lists are disjoint by ID and follow the
/// order of the input they were drawn from.
///
/// ## Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use fleet_core::delta::diff;
/// use fleet_core::EntityVersionMetadata;
///
/// let t1 = Utc.with_ymd_and_hms(2018, 1, 1, 1, 1, 1).unwrap();
/// let t2 = Utc.with_ymd_and_hms(2018, 1, 2, 1, 1, 1).unwrap();
///
/// let edge = vec![EntityVersionMetadata::new("a", t1), EntityVersionMetadata::new("b", t1)];
/// let cloud = vec![EntityVersionMetadata::new("b", t2), EntityVersionMetadata::new("c", t1)];
///
/// let change = diff(&edge, &cloud);
/// assert_eq!(change.deleted.ids(), vec!["a"]);
/// assert_eq!(change.created.ids(), vec!["c"]);
/// assert_eq!(change.updated[0].updated_at, t2);
/// ```
pub fn diff(
    from: &[EntityVersionMetadata],
    to: &[EntityVersionMetadata],
) -> EntityVersionMetadataChangeInfo {
    let from_pos = last_positions(from);
    let to_pos = last_positions(to);

    // Empty in the common case, so no pre-sizing.
    let mut change = EntityVersionMetadataChangeInfo::default();

    for (i, f) in from.iter().enumerate() {
        if from_pos.get(f.id.as_str()) != Some(&i) {
            continue;
        }
        match to_pos.get(f.id.as_str()) {
            None => change.deleted.push(f.clone()),
            Some(&j) if to[j].updated_at != f.updated_at => change.updated.push(to[j].clone()),
            Some(_) => {}
        }
    }

    for (j, t) in to.iter().enumerate() {
        if to_pos.get(t.id.as_str()) != Some(&j) {
            continue;
        }
        if !from_pos.contains_key(t.id.as_str()) {
            change.created.push(t.clone());
        }
    }

    change
}

/// Computes the delta for the single-batch software update collection.
///
/// ## Rules
/// ```text
/// current   edge reports      result
/// ───────   ──────────────    ─────────────────────────────────
/// none      anything          no change
/// X         nothing           Created [X]
/// X         Y (Y ≠ X)         Deleted [Y], Created [X]
/// X @ t2    X @ t1, t2 > t1   Updated [X]
/// X @ t     X @ t' , t ≤ t'   no change
/// ```
/// Only the first entry the edge reports is considered.
pub fn software_update_diff(
    edge: &[EntityVersionMetadata],
    current: Option<&EntityVersionMetadata>,
) -> EntityVersionMetadataChangeInfo {
    let mut change = EntityVersionMetadataChangeInfo::default();
    let Some(current) = current else {
        return change;
    };

    match edge.first() {
        None => change.created.push(current.clone()),
        Some(reported) if reported.id != current.id => {
            change.deleted.push(reported.clone());
            change.created.push(current.clone());
        }
        Some(reported) if current.updated_at > reported.updated_at => {
            change.updated.push(current.clone());
        }
        Some(_) => {}
    }

    change
}

// =============================================================================
// Unit Tests
// =============================================================================
