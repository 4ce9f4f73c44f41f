//! # Edge Scope
//!
//! Works out what one edge is allowed to see before any collection is
//! diffed.
//!
//! ## Resolution
//! ```text
//!  EdgeContext { tenant, edge }
//!        │
//!        ▼
//!  edge_labels ──────────────► None → UnknownEdge (request fails)
//!        │
//!        ├──► explicit projects listing the edge ─────────┐
//!        │                                                 ├──► projects
//!        └──► category projects ── category_match(labels) ─┘
//!                                                          │
//!                                                          ▼
//!                                          log collectors in those projects
//! ```
//!
//! Every call in here is a hard dependency of the whole request: without the
//! scope no collection can be filtered, so failures propagate instead of
//! being isolated per collection.

use std::collections::HashMap;

use fleet_core::selector::{category_and, category_match, matching_entities};
use fleet_core::{CategoryInfo, EntityKind, EntityVersionMetadata};
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::repository::{InventoryRepository, RepositoryResult, SelectorResolver};

/// Identity of the edge making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeContext {
    pub tenant_id: String,
    pub edge_id: String,
}

impl EdgeContext {
    pub fn new(tenant_id: impl Into<String>, edge_id: impl Into<String>) -> Self {
        EdgeContext {
            tenant_id: tenant_id.into(),
            edge_id: edge_id.into(),
        }
    }
}

/// Everything that decides entity visibility for one edge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeScope {
    pub tenant_id: String,
    pub edge_id: String,

    /// Category labels assigned to the edge.
    pub edge_labels: Vec<CategoryInfo>,

    /// Projects in scope: explicit ones first, then matching category ones.
    pub projects: Vec<EntityVersionMetadata>,

    pub explicit_project_ids: Vec<String>,
    pub category_project_ids: Vec<String>,

    /// Edge selectors of the category projects in scope, by project ID.
    pub project_selectors: HashMap<String, Vec<CategoryInfo>>,

    /// Log collectors visible to the edge. Cloud profiles referenced by them
    /// are in scope as well.
    pub log_collector_ids: Vec<String>,
}

impl EdgeScope {
    /// Creates a scope with labels only and no projects.
    pub fn new(
        tenant_id: impl Into<String>,
        edge_id: impl Into<String>,
        edge_labels: Vec<CategoryInfo>,
    ) -> Self {
        EdgeScope {
            tenant_id: tenant_id.into(),
            edge_id: edge_id.into(),
            edge_labels,
            ..Default::default()
        }
    }

    /// IDs of every project in scope.
    pub fn project_ids(&self) -> Vec<String> {
        self.projects.iter().map(|p| p.id.clone()).collect()
    }

    pub fn contains_project(&self, project_id: &str) -> bool {
        self.projects.iter().any(|p| p.id == project_id)
    }

    pub fn contains_log_collector(&self, log_collector_id: &str) -> bool {
        self.log_collector_ids.iter().any(|id| id == log_collector_id)
    }
}

/// Resolves the scope of the requesting edge.
///
/// ## Errors
/// - [`SyncError::UnknownEdge`] if the edge does not exist in the tenant
/// - [`SyncError::Scope`] if any collaborator call fails
pub async fn resolve_scope(
    resolver: &dyn SelectorResolver,
    repository: &dyn InventoryRepository,
    ctx: &EdgeContext,
) -> SyncResult<EdgeScope> {
    let edge_labels = resolver
        .edge_labels(&ctx.tenant_id, &ctx.edge_id)
        .await
        .map_err(SyncError::Scope)?
        .ok_or_else(|| SyncError::UnknownEdge {
            tenant_id: ctx.tenant_id.clone(),
            edge_id: ctx.edge_id.clone(),
        })?;

    let explicit = resolver
        .explicit_projects_for_edge(&ctx.tenant_id, &ctx.edge_id)
        .await
        .map_err(SyncError::Scope)?;
    let category_projects = resolver
        .category_projects(&ctx.tenant_id)
        .await
        .map_err(SyncError::Scope)?;

    // A category project without selectors targets no edge.
    let matched = matching_entities(&category_projects, &edge_labels, false);

    let project_selectors: HashMap<String, Vec<CategoryInfo>> = category_projects
        .into_iter()
        .filter(|p| matched.iter().any(|m| m.id == p.id))
        .map(|p| (p.id, p.category_info))
        .collect();

    let explicit_project_ids: Vec<String> = explicit.iter().map(|p| p.id.clone()).collect();
    let category_project_ids: Vec<String> = matched.iter().map(|p| p.id.clone()).collect();

    let mut scope = EdgeScope::new(ctx.tenant_id.clone(), ctx.edge_id.clone(), edge_labels);
    scope.projects = explicit.into_iter().chain(matched).collect();
    scope.explicit_project_ids = explicit_project_ids;
    scope.category_project_ids = category_project_ids;
    scope.project_selectors = project_selectors;

    scope.log_collector_ids = repository
        .scoped_snapshot(EntityKind::LogCollectors, &scope)
        .await
        .map_err(SyncError::Scope)?
        .into_iter()
        .map(|lc| lc.id)
        .collect();

    debug!(
        tenant_id = %scope.tenant_id,
        edge_id = %scope.edge_id,
        labels = scope.edge_labels.len(),
        explicit_projects = scope.explicit_project_ids.len(),
        category_projects = scope.category_project_ids.len(),
        log_collectors = scope.log_collector_ids.len(),
        "Resolved edge scope"
    );

    Ok(scope)
}

/// Server-side application snapshot for the edge.
///
/// Applications of explicit projects are in scope when they list the edge.
/// Applications of category projects are in scope when their own selectors,
/// narrowed by the project's selectors, match the edge labels. An
/// application without selectors therefore follows its project.
pub async fn application_snapshot(
    resolver: &dyn SelectorResolver,
    scope: &EdgeScope,
) -> RepositoryResult<Vec<EntityVersionMetadata>> {
    let mut applications = resolver
        .explicit_applications_for_edge(
            &scope.tenant_id,
            &scope.edge_id,
            &scope.explicit_project_ids,
        )
        .await?;

    let candidates = resolver
        .category_applications(&scope.tenant_id, &scope.category_project_ids)
        .await?;

    for app in candidates {
        let Some(project_selectors) = scope.project_selectors.get(&app.project_id) else {
            continue;
        };
        let combined = category_and(&app.metadata.category_info, project_selectors);
        if category_match(&scope.edge_labels, &combined) {
            applications.push(app.metadata.version());
        }
    }

    Ok(applications)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ApplicationRecord, EdgeRecord, InMemoryInventory, InventoryRecord, ProjectRecord};
    use chrono::{TimeZone, Utc};
    use fleet_core::InventoryEntity;

    fn ci(id: &str, value: &str) -> CategoryInfo {
        CategoryInfo::new(id, value)
    }

    fn fixture() -> InMemoryInventory {
        let t = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut inventory = InMemoryInventory::new("tenant-1");
        inventory.edges.push(EdgeRecord::new(
            "edge-sfo",
            vec![ci("Region", "SFO"), ci("Tier", "Gold")],
        ));
        inventory.edges.push(EdgeRecord::new("edge-bare", vec![]));

        inventory.projects.push(ProjectRecord::explicit("p-explicit", t, vec!["edge-sfo".into()]));
        inventory.projects.push(ProjectRecord::category(
            "p-west",
            t,
            vec![ci("Region", "SFO"), ci("Region", "LAX")],
        ));
        inventory.projects.push(ProjectRecord::category("p-east", t, vec![ci("Region", "NYC")]));
        inventory.projects.push(ProjectRecord::category("p-none", t, vec![]));

        inventory.applications.push(ApplicationRecord::new("app-explicit", t, "p-explicit").with_edges(vec!["edge-sfo".into()]));
        inventory.applications.push(ApplicationRecord::new("app-explicit-other", t, "p-explicit").with_edges(vec!["edge-lax".into()]));
        inventory.applications.push(ApplicationRecord::new("app-follow", t, "p-west"));
        inventory.applications.push(
            ApplicationRecord::new("app-gold", t, "p-west").with_selectors(vec![ci("Tier", "Gold")]),
        );
        inventory.applications.push(
            ApplicationRecord::new("app-lax", t, "p-west").with_selectors(vec![ci("Region", "LAX")]),
        );
        inventory.applications.push(ApplicationRecord::new("app-east", t, "p-east"));

        inventory.insert(
            EntityKind::LogCollectors,
            InventoryRecord::new(InventoryEntity::new("lc-west"), t).with_projects(vec!["p-west".into()]),
        );
        inventory.insert(
            EntityKind::LogCollectors,
            InventoryRecord::new(InventoryEntity::new("lc-east"), t).with_projects(vec!["p-east".into()]),
        );
        inventory.insert(
            EntityKind::LogCollectors,
            InventoryRecord::new(InventoryEntity::new("lc-tenant"), t),
        );
        inventory
    }

    #[tokio::test]
    async fn test_resolve_scope_projects() {
        let inventory = fixture();
        let scope = resolve_scope(&inventory, &inventory, &EdgeContext::new("tenant-1", "edge-sfo"))
            .await
            .unwrap();

        assert_eq!(scope.explicit_project_ids, vec!["p-explicit"]);
        assert_eq!(scope.category_project_ids, vec!["p-west"]);
        assert_eq!(scope.project_ids(), vec!["p-explicit", "p-west"]);
        assert!(scope.project_selectors.contains_key("p-west"));
        assert!(!scope.project_selectors.contains_key("p-none"));

        let mut collectors = scope.log_collector_ids.clone();
        collectors.sort();
        assert_eq!(collectors, vec!["lc-tenant", "lc-west"]);
    }

    #[tokio::test]
    async fn test_resolve_scope_unlabelled_edge() {
        let inventory = fixture();
        let scope = resolve_scope(&inventory, &inventory, &EdgeContext::new("tenant-1", "edge-bare"))
            .await
            .unwrap();

        assert!(scope.category_project_ids.is_empty());
        assert!(scope.explicit_project_ids.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_scope_unknown_edge() {
        let inventory = fixture();
        let err = resolve_scope(&inventory, &inventory, &EdgeContext::new("tenant-1", "edge-ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnknownEdge { ref edge_id, .. } if edge_id == "edge-ghost"));

        let err = resolve_scope(&inventory, &inventory, &EdgeContext::new("tenant-2", "edge-sfo"))
            .await
            .unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_application_snapshot_combines_selectors() {
        let inventory = fixture();
        let scope = resolve_scope(&inventory, &inventory, &EdgeContext::new("tenant-1", "edge-sfo"))
            .await
            .unwrap();

        let ids: Vec<String> = application_snapshot(&inventory, &scope)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();

        // app-lax asks for Region=LAX inside a project allowing SFO or LAX,
        // which the SFO edge does not satisfy.
        assert_eq!(ids, vec!["app-explicit", "app-follow", "app-gold"]);
    }

    #[test]
    fn test_scope_helpers() {
        let t = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut scope = EdgeScope::new("t", "e", vec![]);
        scope.projects.push(EntityVersionMetadata::new("p1", t));
        scope.log_collector_ids.push("lc1".into());

        assert!(scope.contains_project("p1"));
        assert!(!scope.contains_project("p2"));
        assert!(scope.contains_log_collector("lc1"));
    }
}
