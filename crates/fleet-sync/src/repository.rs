//! Collaborator abstraction.
//!
//! Defines the traits through which the orchestrator reads targeting data
//! and entity snapshots, so the delta logic works with any store (SQL,
//! a cache, or the in-memory fixture in [`crate::memory`]).
//!
//! Snapshot queries return only `{id, updatedAt}` pairs. Full entities are
//! fetched afterwards for the few IDs that actually changed, which keeps the
//! periodic call from every edge cheap.

use async_trait::async_trait;
use fleet_core::{
    CategoryInfo, EntityCategoryInfoMetadata, EntityKind, EntityVersionMetadata, InventoryEntity,
};
use thiserror::Error;

use crate::scope::EdgeScope;

/// Result type alias for collaborator calls.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Failures reported by a collaborator.
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    /// The requested entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The backing store cannot be reached right now.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected or failed the query.
    #[error("Query failed: {0}")]
    Query(String),
}

impl RepositoryError {
    /// Returns true if the same call may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepositoryError::Unavailable(_))
    }
}

/// An application in a category-targeted project, with its own selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryApplication {
    /// The owning project.
    pub project_id: String,
    /// The application version and its selectors (possibly empty).
    pub metadata: EntityCategoryInfoMetadata,
}

/// Resolves which projects and applications target an edge.
#[async_trait]
pub trait SelectorResolver: Send + Sync {
    /// Labels of the edge, or `None` if the edge is unknown to the tenant.
    async fn edge_labels(
        &self,
        tenant_id: &str,
        edge_id: &str,
    ) -> RepositoryResult<Option<Vec<CategoryInfo>>>;

    /// Explicitly targeted projects that list the edge.
    async fn explicit_projects_for_edge(
        &self,
        tenant_id: &str,
        edge_id: &str,
    ) -> RepositoryResult<Vec<EntityVersionMetadata>>;

    /// Every category-targeted project of the tenant with its edge selectors.
    async fn category_projects(
        &self,
        tenant_id: &str,
    ) -> RepositoryResult<Vec<EntityCategoryInfoMetadata>>;

    /// Applications of the given explicit projects that list the edge.
    async fn explicit_applications_for_edge(
        &self,
        tenant_id: &str,
        edge_id: &str,
        project_ids: &[String],
    ) -> RepositoryResult<Vec<EntityVersionMetadata>>;

    /// Applications of the given category projects with their selectors.
    async fn category_applications(
        &self,
        tenant_id: &str,
        project_ids: &[String],
    ) -> RepositoryResult<Vec<CategoryApplication>>;
}

/// Reads entity snapshots and full entities, filtered to an edge's scope.
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// `{id, updatedAt}` of every entity of `kind` visible in `scope`.
    ///
    /// For [`EntityKind::SoftwareUpdates`] this is the active batch, if any.
    async fn scoped_snapshot(
        &self,
        kind: EntityKind,
        scope: &EdgeScope,
    ) -> RepositoryResult<Vec<EntityVersionMetadata>>;

    /// Full entities of `kind` for the given IDs.
    ///
    /// IDs that no longer exist are skipped; the result order is not
    /// significant.
    async fn fetch_by_ids(
        &self,
        kind: EntityKind,
        scope: &EdgeScope,
        ids: &[String],
    ) -> RepositoryResult<Vec<InventoryEntity>>;
}
