//! # fleet-core: Pure Reconciliation Logic for the Fleet Inventory Engine
//!
//! This crate decides which entities are in scope for an edge and computes
//! what an edge must delete, create and update to match the cloud. Everything
//! here is a pure function over snapshots; there is no I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Fleet Inventory Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  Edge (service domain)                          │   │
//! │  │        POST { Projects: [{id, updatedAt}], ... }               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP (outside this workspace)          │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 fleet-sync (orchestrator)                       │   │
//! │  │     scope edge ──► snapshot ──► diff ──► hydrate ──► respond   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ fleet-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ selector  │  │   delta   │  │ inventory │  │ validation│  │   │
//! │  │   │  match    │  │   diff    │  │  payload  │  │ unique ids│  │   │
//! │  │   │  and      │  │  sw-upd   │  │  response │  │ selectors │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (CategoryInfo, EntityVersionMetadata, EntityKind, ...)
//! - [`selector`] - Category selector matching and combination
//! - [`delta`] - Snapshot delta computation
//! - [`inventory`] - Per-collection request/response wire types
//! - [`validation`] - Optional strictness checks
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use fleet_core::selector::category_match;
//! use fleet_core::CategoryInfo;
//!
//! let labels = vec![CategoryInfo::new("Region", "SFO")];
//! let selectors = vec![
//!     CategoryInfo::new("Region", "SFO"),
//!     CategoryInfo::new("Region", "LAX"),
//! ];
//!
//! // OR within one category
//! assert!(category_match(&labels, &selectors));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod delta;
pub mod error;
pub mod inventory;
pub mod selector;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use delta::{diff, software_update_diff};
pub use error::{CoreError, CoreResult, ValidationError};
pub use inventory::{
    EdgeInventoryDeleted, EdgeInventoryDeltaPayload, EdgeInventoryDeltaResponse,
    EdgeInventoryDetails,
};
pub use selector::{category_and, category_match, group_selector_rows, matching_entities};
pub use types::*;
