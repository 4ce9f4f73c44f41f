//! # Domain Types
//!
//! Core value types shared by the selector engine, the delta computer and the
//! inventory wire format.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────────┐   ┌─────────────────┐  │
//! │  │  CategoryInfo   │   │ EntityVersionMetadata│   │  EntityKind     │  │
//! │  │  ─────────────  │   │  ──────────────────  │   │  ─────────────  │  │
//! │  │  id  (category) │   │  id                  │   │  Projects       │  │
//! │  │  value          │   │  updated_at (UTC)    │   │  Applications   │  │
//! │  └─────────────────┘   └──────────────────────┘   │  ... (16 total) │  │
//! │                                                    └─────────────────┘  │
//! │  ┌──────────────────────────┐   ┌──────────────────────────────────┐   │
//! │  │ EntityCategoryInfoMetadata│   │ InventoryEntity                  │   │
//! │  │  version + selector set   │   │  id + state + opaque REST fields │   │
//! │  └──────────────────────────┘   └──────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why `updated_at` and not a version counter?
//! Version counters travel through JSON as floats and can be truncated on the
//! way to the edge. Timestamps keep at least millisecond resolution end to
//! end, so they are the comparison key for every delta.

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::error::CoreError;

// =============================================================================
// Category Info
// =============================================================================

/// One concrete assignment of a category to a value.
///
/// Used both as a label on an entity (an edge is in Region=SFO) and inside
/// selector sets (a project targets Region=SFO or Region=LAX).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryInfo {
    /// The category ID, e.g. the ID of the "Region" category.
    pub id: String,

    /// The chosen value, e.g. "SFO".
    pub value: String,
}

impl CategoryInfo {
    /// Creates a category assignment.
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        CategoryInfo {
            id: id.into(),
            value: value.into(),
        }
    }
}

// =============================================================================
// Edge Selector Type
// =============================================================================

/// How an owning entity (project, application, binding) targets edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum EdgeSelectorType {
    /// Edges are listed by ID.
    #[default]
    Explicit,
    /// Edges are selected by matching their labels against category selectors.
    Category,
}

impl fmt::Display for EdgeSelectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeSelectorType::Explicit => write!(f, "Explicit"),
            EdgeSelectorType::Category => write!(f, "Category"),
        }
    }
}

// =============================================================================
// Entity State
// =============================================================================

/// Deployment state of applications and data pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityState {
    Deploy,
    Undeploy,
}

impl FromStr for EntityState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEPLOY" => Ok(EntityState::Deploy),
            "UNDEPLOY" => Ok(EntityState::Undeploy),
            other => Err(CoreError::UnknownEntityState(other.to_string())),
        }
    }
}

// =============================================================================
// Entity Kind
// =============================================================================

/// The entity collections tracked by the inventory delta exchange.
///
/// Variant names are the wire names used as keys in the edge payload and in
/// every section of the response.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub enum EntityKind {
    Projects,
    Applications,
    ProjectServices,
    DataPipelines,
    Functions,
    RuntimeEnvironments,
    #[serde(rename = "MLModels")]
    MlModels,
    CloudProfiles,
    ContainerRegistries,
    Categories,
    DataSources,
    LogCollectors,
    SoftwareUpdates,
    SvcInstances,
    SvcBindings,
    DataDriverInstances,
}

impl EntityKind {
    /// Every tracked collection, in wire order.
    pub const ALL: [EntityKind; 16] = [
        EntityKind::Projects,
        EntityKind::Applications,
        EntityKind::ProjectServices,
        EntityKind::DataPipelines,
        EntityKind::Functions,
        EntityKind::RuntimeEnvironments,
        EntityKind::MlModels,
        EntityKind::CloudProfiles,
        EntityKind::ContainerRegistries,
        EntityKind::Categories,
        EntityKind::DataSources,
        EntityKind::LogCollectors,
        EntityKind::SoftwareUpdates,
        EntityKind::SvcInstances,
        EntityKind::SvcBindings,
        EntityKind::DataDriverInstances,
    ];

    /// The JSON key for this collection.
    pub const fn wire_name(&self) -> &'static str {
        match self {
            EntityKind::Projects => "Projects",
            EntityKind::Applications => "Applications",
            EntityKind::ProjectServices => "ProjectServices",
            EntityKind::DataPipelines => "DataPipelines",
            EntityKind::Functions => "Functions",
            EntityKind::RuntimeEnvironments => "RuntimeEnvironments",
            EntityKind::MlModels => "MLModels",
            EntityKind::CloudProfiles => "CloudProfiles",
            EntityKind::ContainerRegistries => "ContainerRegistries",
            EntityKind::Categories => "Categories",
            EntityKind::DataSources => "DataSources",
            EntityKind::LogCollectors => "LogCollectors",
            EntityKind::SoftwareUpdates => "SoftwareUpdates",
            EntityKind::SvcInstances => "SvcInstances",
            EntityKind::SvcBindings => "SvcBindings",
            EntityKind::DataDriverInstances => "DataDriverInstances",
        }
    }

    /// Returns true for collections whose entities carry a deployment state.
    pub const fn is_deployable(&self) -> bool {
        matches!(self, EntityKind::Applications | EntityKind::DataPipelines)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for EntityKind {
    type Err = CoreError;

    /// Parses a wire name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        EntityKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.wire_name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CoreError::UnknownCollection(wanted.to_string()))
    }
}

// =============================================================================
// Entity Version Metadata
// =============================================================================

/// Fingerprint of one entity instance as seen by one side of the sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EntityVersionMetadata {
    /// Entity ID.
    pub id: String,

    /// Last modification instant. Offsets are normalized to UTC on input.
    #[serde(rename = "updatedAt")]
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl EntityVersionMetadata {
    pub fn new(id: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        EntityVersionMetadata {
            id: id.into(),
            updated_at,
        }
    }
}

/// Ordered list of [`EntityVersionMetadata`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EntityVersionMetadataList(pub Vec<EntityVersionMetadata>);

impl EntityVersionMetadataList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the IDs in list order.
    pub fn ids(&self) -> Vec<String> {
        self.0.iter().map(|evm| evm.id.clone()).collect()
    }

    pub fn push(&mut self, evm: EntityVersionMetadata) {
        self.0.push(evm);
    }

    pub fn into_inner(self) -> Vec<EntityVersionMetadata> {
        self.0
    }
}

impl Deref for EntityVersionMetadataList {
    type Target = [EntityVersionMetadata];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<EntityVersionMetadata>> for EntityVersionMetadataList {
    fn from(list: Vec<EntityVersionMetadata>) -> Self {
        EntityVersionMetadataList(list)
    }
}

impl FromIterator<EntityVersionMetadata> for EntityVersionMetadataList {
    fn from_iter<I: IntoIterator<Item = EntityVersionMetadata>>(iter: I) -> Self {
        EntityVersionMetadataList(iter.into_iter().collect())
    }
}

impl IntoIterator for EntityVersionMetadataList {
    type Item = EntityVersionMetadata;
    type IntoIter = std::vec::IntoIter<EntityVersionMetadata>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// The delta between two snapshots of one collection.
///
/// The three lists are disjoint by ID. Entities present on both sides with
/// the same `updated_at` appear in none of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "PascalCase")]
pub struct EntityVersionMetadataChangeInfo {
    pub deleted: EntityVersionMetadataList,
    pub created: EntityVersionMetadataList,
    pub updated: EntityVersionMetadataList,
}

impl EntityVersionMetadataChangeInfo {
    /// Returns true if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.created.is_empty() && self.updated.is_empty()
    }
}

// =============================================================================
// Selector Rows
// =============================================================================

/// One selector assignment of one entity, as a flat row.
///
/// Row-oriented stores return one of these per (entity, category value)
/// pair; [`crate::selector::group_selector_rows`] folds them per entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCategorySelectorInfo {
    pub id: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "categoryId")]
    pub category_id: String,
    pub value: String,
}

/// An entity version together with its complete selector set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCategoryInfoMetadata {
    pub id: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(
        rename = "categoryInfoList",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub category_info: Vec<CategoryInfo>,
}

impl EntityCategoryInfoMetadata {
    pub fn new(version: EntityVersionMetadata, category_info: Vec<CategoryInfo>) -> Self {
        EntityCategoryInfoMetadata {
            id: version.id,
            updated_at: version.updated_at,
            category_info,
        }
    }

    /// The version fingerprint without the selectors.
    pub fn version(&self) -> EntityVersionMetadata {
        EntityVersionMetadata::new(self.id.clone(), self.updated_at)
    }
}

// =============================================================================
// Inventory Entity
// =============================================================================

/// Full payload of one hydrated entity.
///
/// Only the fields the engine acts on are typed; everything else of the
/// entity's REST representation is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryEntity {
    pub id: String,

    /// Deployment state, only meaningful for applications and data pipelines.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "blank_state_as_none"
    )]
    pub state: Option<EntityState>,

    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl InventoryEntity {
    pub fn new(id: impl Into<String>) -> Self {
        InventoryEntity {
            id: id.into(),
            state: None,
            fields: serde_json::Map::new(),
        }
    }

    pub fn with_state(mut self, state: EntityState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Returns true if the entity is marked for removal from edges.
    pub fn is_undeployed(&self) -> bool {
        self.state == Some(EntityState::Undeploy)
    }
}

// =============================================================================
// Serde Helpers
// =============================================================================

/// Treats a JSON `null` list like a missing one.
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// An empty state string means "not set", which is the deployed default.
fn blank_state_as_none<'de, D>(deserializer: D) -> Result<Option<EntityState>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
