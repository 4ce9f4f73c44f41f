//! # fleet-sync: Inventory Delta Orchestrator
//!
//! This crate answers an edge's periodic "what changed?" call. It resolves
//! the edge's scope through pluggable collaborators, reconciles every
//! collection with the pure functions in `fleet-core`, and assembles the
//! delta response.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Delta Orchestrator Architecture                    │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │              InventoryDeltaService (Orchestrator)                │  │
//! │  │                                                                  │  │
//! │  │  Stateless per request                                          │  │
//! │  │  Bounded concurrency across collections, timeout per collection │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  Scope         │  │ SelectorResolver│ │  InventoryRepository   │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Edge labels    │  │ Edge labels    │  │ Scoped {id, updatedAt} │    │
//! │  │ Projects       │  │ Projects/apps  │  │ snapshots              │    │
//! │  │ Log collectors │  │ with selectors │  │ Full entities by ID    │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    InMemoryInventory                            │   │
//! │  │                                                                 │   │
//! │  │ Implements both collaborator traits over a JSON fixture         │   │
//! │  │ Used by tests and the delta-replay tool                         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Orchestrator settings (concurrency, timeouts, gating)
//! - [`error`] - Sync error types
//! - [`repository`] - Collaborator traits
//! - [`scope`] - Edge scope resolution and application targeting
//! - [`service`] - The `InventoryDeltaService` orchestrator
//! - [`memory`] - In-memory collaborator implementation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fleet_sync::{DeltaConfig, EdgeContext, InMemoryInventory, InventoryDeltaService};
//!
//! let config = DeltaConfig::load_or_default(None);
//! let inventory = Arc::new(InMemoryInventory::load(path)?);
//! let service = InventoryDeltaService::from_config(inventory.clone(), inventory, &config);
//!
//! let outcome = service
//!     .get_edge_inventory_delta(&EdgeContext::new("tenant-1", "edge-1"), &payload)
//!     .await?;
//! println!("In sync: {}", outcome.response.is_empty());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod memory;
pub mod repository;
pub mod scope;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{DeltaConfig, DeltaSettings, DuplicateIdPolicy};
pub use error::{SyncError, SyncResult};
pub use memory::{ApplicationRecord, EdgeRecord, InMemoryInventory, InventoryRecord, ProjectRecord};
pub use repository::{
    CategoryApplication, InventoryRepository, RepositoryError, RepositoryResult, SelectorResolver,
};
pub use scope::{application_snapshot, resolve_scope, EdgeContext, EdgeScope};
pub use service::{CollectionFailure, InventoryDeltaOutcome, InventoryDeltaService};
