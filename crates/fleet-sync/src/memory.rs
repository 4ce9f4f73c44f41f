//! # In-Memory Inventory
//!
//! A fixture-backed implementation of both collaborator traits.
//!
//! Used by the orchestrator tests and by the `delta-replay` tool, which
//! loads a JSON dump of one tenant and replays an edge request against it.
//!
//! ## Fixture Format
//! ```json
//! {
//!   "tenantId": "tenant-1",
//!   "edges": [{ "id": "edge-1", "labels": [{ "id": "Region", "value": "SFO" }] }],
//!   "projects": [{
//!     "id": "p1", "updatedAt": "2020-01-01T00:00:00Z",
//!     "edgeSelectorType": "Category",
//!     "edgeSelectors": [{ "id": "Region", "value": "SFO" }],
//!     "name": "west"
//!   }],
//!   "applications": [{ "id": "a1", "updatedAt": "...", "projectId": "p1" }],
//!   "records": {
//!     "DataPipelines": [{ "id": "dp1", "updatedAt": "...", "projectIds": ["p1"] }],
//!     "Categories":    [{ "id": "Region", "updatedAt": "..." }]
//!   }
//! }
//! ```
//!
//! ## Visibility of generic records
//! A record is visible to an edge when it is bound to the edge, to a project
//! in scope, or to a log collector in scope. Records with no binding at all
//! are tenant-wide, but only for kinds that allow it. Categories are always
//! tenant-wide.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use fleet_core::selector::group_selector_rows;
use fleet_core::validation::{validate_category_info, validate_edge_selection};
use fleet_core::{
    CategoryInfo, EdgeSelectorType, EntityCategoryInfoMetadata, EntityCategorySelectorInfo,
    EntityKind, EntityVersionMetadata, InventoryEntity,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{SyncError, SyncResult};
use crate::repository::{
    CategoryApplication, InventoryRepository, RepositoryResult, SelectorResolver,
};
use crate::scope::{application_snapshot, EdgeScope};

// =============================================================================
// Records
// =============================================================================

/// An edge and its category labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: String,
    #[serde(default)]
    pub labels: Vec<CategoryInfo>,
}

impl EdgeRecord {
    pub fn new(id: impl Into<String>, labels: Vec<CategoryInfo>) -> Self {
        EdgeRecord {
            id: id.into(),
            labels,
        }
    }
}

/// A project and how it targets edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub edge_selector_type: EdgeSelectorType,
    #[serde(default)]
    pub edge_ids: Vec<String>,
    #[serde(default)]
    pub edge_selectors: Vec<CategoryInfo>,
    #[serde(flatten)]
    pub entity: InventoryEntity,
}

impl ProjectRecord {
    /// A project listing its edges by ID.
    pub fn explicit(id: &str, updated_at: DateTime<Utc>, edge_ids: Vec<String>) -> Self {
        ProjectRecord {
            updated_at,
            edge_selector_type: EdgeSelectorType::Explicit,
            edge_ids,
            edge_selectors: Vec::new(),
            entity: InventoryEntity::new(id),
        }
    }

    /// A project selecting its edges by category.
    pub fn category(id: &str, updated_at: DateTime<Utc>, edge_selectors: Vec<CategoryInfo>) -> Self {
        ProjectRecord {
            updated_at,
            edge_selector_type: EdgeSelectorType::Category,
            edge_ids: Vec::new(),
            edge_selectors,
            entity: InventoryEntity::new(id),
        }
    }

    fn version(&self) -> EntityVersionMetadata {
        EntityVersionMetadata::new(self.entity.id.clone(), self.updated_at)
    }

    fn to_entity(&self) -> InventoryEntity {
        with_version(&self.entity, self.updated_at)
            .with_field("edgeSelectorType", Value::String(self.edge_selector_type.to_string()))
            .with_field("edgeIds", string_array(&self.edge_ids))
            .with_field("edgeSelectors", category_array(&self.edge_selectors))
    }
}

/// An application of a project.
///
/// In an explicit project `edge_ids` lists the edges it runs on. In a
/// category project `edge_selectors` narrows the project's selectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    pub updated_at: DateTime<Utc>,
    pub project_id: String,
    #[serde(default)]
    pub edge_ids: Vec<String>,
    #[serde(default)]
    pub edge_selectors: Vec<CategoryInfo>,
    #[serde(flatten)]
    pub entity: InventoryEntity,
}

impl ApplicationRecord {
    pub fn new(id: &str, updated_at: DateTime<Utc>, project_id: &str) -> Self {
        ApplicationRecord {
            updated_at,
            project_id: project_id.to_string(),
            edge_ids: Vec::new(),
            edge_selectors: Vec::new(),
            entity: InventoryEntity::new(id),
        }
    }

    pub fn with_edges(mut self, edge_ids: Vec<String>) -> Self {
        self.edge_ids = edge_ids;
        self
    }

    pub fn with_selectors(mut self, edge_selectors: Vec<CategoryInfo>) -> Self {
        self.edge_selectors = edge_selectors;
        self
    }

    pub fn with_entity(mut self, entity: InventoryEntity) -> Self {
        self.entity = entity;
        self
    }

    fn version(&self) -> EntityVersionMetadata {
        EntityVersionMetadata::new(self.entity.id.clone(), self.updated_at)
    }

    fn to_entity(&self) -> InventoryEntity {
        with_version(&self.entity, self.updated_at)
            .with_field("projectId", Value::String(self.project_id.clone()))
            .with_field("edgeIds", string_array(&self.edge_ids))
            .with_field("edgeSelectors", category_array(&self.edge_selectors))
    }
}

/// Any other entity, with the bindings that decide its visibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edge_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub project_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log_collector_ids: Vec<String>,
    #[serde(flatten)]
    pub entity: InventoryEntity,
}

impl InventoryRecord {
    /// A tenant-wide record.
    pub fn new(entity: InventoryEntity, updated_at: DateTime<Utc>) -> Self {
        InventoryRecord {
            updated_at,
            edge_ids: Vec::new(),
            project_ids: Vec::new(),
            log_collector_ids: Vec::new(),
            entity,
        }
    }

    pub fn with_edges(mut self, edge_ids: Vec<String>) -> Self {
        self.edge_ids = edge_ids;
        self
    }

    pub fn with_projects(mut self, project_ids: Vec<String>) -> Self {
        self.project_ids = project_ids;
        self
    }

    pub fn with_log_collectors(mut self, log_collector_ids: Vec<String>) -> Self {
        self.log_collector_ids = log_collector_ids;
        self
    }

    fn version(&self) -> EntityVersionMetadata {
        EntityVersionMetadata::new(self.entity.id.clone(), self.updated_at)
    }

    fn is_unbound(&self) -> bool {
        self.edge_ids.is_empty() && self.project_ids.is_empty() && self.log_collector_ids.is_empty()
    }

    fn is_visible(&self, kind: EntityKind, scope: &EdgeScope) -> bool {
        if kind == EntityKind::Categories {
            return true;
        }
        if self.is_unbound() {
            return allows_tenant_wide(kind);
        }
        self.edge_ids.iter().any(|id| *id == scope.edge_id)
            || self.project_ids.iter().any(|id| scope.contains_project(id))
            || self
                .log_collector_ids
                .iter()
                .any(|id| scope.contains_log_collector(id))
    }
}

/// Kinds whose entities may exist outside any project.
fn allows_tenant_wide(kind: EntityKind) -> bool {
    matches!(
        kind,
        EntityKind::Functions
            | EntityKind::ProjectServices
            | EntityKind::RuntimeEnvironments
            | EntityKind::LogCollectors
            | EntityKind::SvcBindings
            | EntityKind::SoftwareUpdates
    )
}

fn with_version(entity: &InventoryEntity, updated_at: DateTime<Utc>) -> InventoryEntity {
    entity.clone().with_field(
        "updatedAt",
        Value::String(updated_at.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
    )
}

fn string_array(values: &[String]) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}

fn category_array(values: &[CategoryInfo]) -> Value {
    Value::Array(
        values
            .iter()
            .map(|c| {
                let mut obj = serde_json::Map::new();
                obj.insert("id".to_string(), Value::String(c.id.clone()));
                obj.insert("value".to_string(), Value::String(c.value.clone()));
                Value::Object(obj)
            })
            .collect(),
    )
}

// =============================================================================
// In-Memory Inventory
// =============================================================================

/// One tenant's inventory held in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InMemoryInventory {
    pub tenant_id: String,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
    #[serde(default)]
    pub projects: Vec<ProjectRecord>,
    #[serde(default)]
    pub applications: Vec<ApplicationRecord>,
    /// Every other collection, keyed by wire name.
    #[serde(default)]
    pub records: BTreeMap<EntityKind, Vec<InventoryRecord>>,
}

impl InMemoryInventory {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        InMemoryInventory {
            tenant_id: tenant_id.into(),
            ..Default::default()
        }
    }

    /// Parses a fixture from JSON.
    ///
    /// The fixture is validated before it is returned.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let inventory: Self = serde_json::from_str(json)?;
        inventory.validate()?;
        Ok(inventory)
    }

    /// Checks the targeting data of the fixture.
    ///
    /// Edge labels and application selectors must be well formed; every
    /// project must target edges the way its selector type says.
    pub fn validate(&self) -> SyncResult<()> {
        for edge in &self.edges {
            edge.labels.iter().try_for_each(validate_category_info)?;
        }
        for project in &self.projects {
            if let Err(e) = validate_edge_selection(
                project.edge_selector_type,
                &project.edge_ids,
                &project.edge_selectors,
            ) {
                warn!(project_id = %project.entity.id, error = %e, "Invalid project targeting");
                return Err(e.into());
            }
        }
        for application in &self.applications {
            application
                .edge_selectors
                .iter()
                .try_for_each(validate_category_info)?;
        }
        Ok(())
    }

    /// Loads a fixture file.
    pub fn load(path: &Path) -> SyncResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Internal(format!("Failed to read inventory {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    /// Adds a record to a generic collection.
    pub fn insert(&mut self, kind: EntityKind, record: InventoryRecord) {
        self.records.entry(kind).or_default().push(record);
    }

    fn is_tenant(&self, tenant_id: &str) -> bool {
        self.tenant_id == tenant_id
    }

    fn visible_records<'a>(
        &'a self,
        kind: EntityKind,
        scope: &'a EdgeScope,
    ) -> impl Iterator<Item = &'a InventoryRecord> + 'a {
        self.records
            .get(&kind)
            .into_iter()
            .flatten()
            .filter(move |record| record.is_visible(kind, scope))
    }
}

#[async_trait]
impl SelectorResolver for InMemoryInventory {
    async fn edge_labels(
        &self,
        tenant_id: &str,
        edge_id: &str,
    ) -> RepositoryResult<Option<Vec<CategoryInfo>>> {
        if !self.is_tenant(tenant_id) {
            return Ok(None);
        }
        Ok(self
            .edges
            .iter()
            .find(|edge| edge.id == edge_id)
            .map(|edge| edge.labels.clone()))
    }

    async fn explicit_projects_for_edge(
        &self,
        tenant_id: &str,
        edge_id: &str,
    ) -> RepositoryResult<Vec<EntityVersionMetadata>> {
        if !self.is_tenant(tenant_id) {
            return Ok(Vec::new());
        }
        Ok(self
            .projects
            .iter()
            .filter(|p| p.edge_selector_type == EdgeSelectorType::Explicit)
            .filter(|p| p.edge_ids.iter().any(|id| id == edge_id))
            .map(ProjectRecord::version)
            .collect())
    }

    async fn category_projects(
        &self,
        tenant_id: &str,
    ) -> RepositoryResult<Vec<EntityCategoryInfoMetadata>> {
        if !self.is_tenant(tenant_id) {
            return Ok(Vec::new());
        }
        // Same shape a row-oriented store returns: one row per selector.
        let rows: Vec<EntityCategorySelectorInfo> = self
            .projects
            .iter()
            .filter(|p| p.edge_selector_type == EdgeSelectorType::Category)
            .flat_map(|p| {
                p.edge_selectors.iter().map(move |sel| EntityCategorySelectorInfo {
                    id: p.entity.id.clone(),
                    updated_at: p.updated_at,
                    category_id: sel.id.clone(),
                    value: sel.value.clone(),
                })
            })
            .collect();
        Ok(group_selector_rows(&rows))
    }

    async fn explicit_applications_for_edge(
        &self,
        tenant_id: &str,
        edge_id: &str,
        project_ids: &[String],
    ) -> RepositoryResult<Vec<EntityVersionMetadata>> {
        if !self.is_tenant(tenant_id) {
            return Ok(Vec::new());
        }
        Ok(self
            .applications
            .iter()
            .filter(|a| project_ids.contains(&a.project_id))
            .filter(|a| a.edge_ids.iter().any(|id| id == edge_id))
            .map(ApplicationRecord::version)
            .collect())
    }

    async fn category_applications(
        &self,
        tenant_id: &str,
        project_ids: &[String],
    ) -> RepositoryResult<Vec<CategoryApplication>> {
        if !self.is_tenant(tenant_id) {
            return Ok(Vec::new());
        }
        Ok(self
            .applications
            .iter()
            .filter(|a| project_ids.contains(&a.project_id))
            .map(|a| CategoryApplication {
                project_id: a.project_id.clone(),
                metadata: EntityCategoryInfoMetadata::new(a.version(), a.edge_selectors.clone()),
            })
            .collect())
    }
}

#[async_trait]
impl InventoryRepository for InMemoryInventory {
    async fn scoped_snapshot(
        &self,
        kind: EntityKind,
        scope: &EdgeScope,
    ) -> RepositoryResult<Vec<EntityVersionMetadata>> {
        if !self.is_tenant(&scope.tenant_id) {
            return Ok(Vec::new());
        }
        match kind {
            EntityKind::Projects => Ok(scope.projects.clone()),
            EntityKind::Applications => application_snapshot(self, scope).await,
            EntityKind::SoftwareUpdates => Ok(self
                .visible_records(kind, scope)
                .max_by_key(|record| record.updated_at)
                .map(InventoryRecord::version)
                .into_iter()
                .collect()),
            _ => Ok(self
                .visible_records(kind, scope)
                .map(InventoryRecord::version)
                .collect()),
        }
    }

    async fn fetch_by_ids(
        &self,
        kind: EntityKind,
        scope: &EdgeScope,
        ids: &[String],
    ) -> RepositoryResult<Vec<InventoryEntity>> {
        if !self.is_tenant(&scope.tenant_id) || ids.is_empty() {
            return Ok(Vec::new());
        }
        let wanted = |id: &String| ids.contains(id);
        let entities: Vec<InventoryEntity> = match kind {
            EntityKind::Projects => self
                .projects
                .iter()
                .filter(|p| wanted(&p.entity.id))
                .map(ProjectRecord::to_entity)
                .collect(),
            EntityKind::Applications => self
                .applications
                .iter()
                .filter(|a| wanted(&a.entity.id))
                .map(ApplicationRecord::to_entity)
                .collect(),
            _ => self
                .records
                .get(&kind)
                .into_iter()
                .flatten()
                .filter(|r| wanted(&r.entity.id))
                .map(|r| with_version(&r.entity, r.updated_at))
                .collect(),
        };
        Ok(entities)
    }
}
