//! # Inventory Wire Types
//!
//! The request an edge posts and the response it receives.
//!
//! ## Shape
//! ```text
//! Request (EdgeInventoryDeltaPayload)
//! {
//!   "Projects":     [{ "id": "p1", "updatedAt": "2018-01-01T01:01:01Z" }],
//!   "Applications": [ ... ],
//!   ... one key per EntityKind, missing or null = empty
//! }
//!
//! Response (EdgeInventoryDeltaResponse)
//! {
//!   "Deleted": { "Projects": ["p0"], ... },           ← IDs only
//!   "Created": { "Projects": [{ full entity }], ... },
//!   "Updated": { "Projects": [{ full entity }], ... }
//! }
//! ```
//!
//! Every struct here has one field per [`EntityKind`] plus `get`/`get_mut`
//! accessors keyed by kind, so the orchestrator handles every collection
//! with the same code.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{EntityKind, EntityVersionMetadata, InventoryEntity};

/// Declares a struct holding one list per tracked collection.
macro_rules! per_collection {
    ($(#[$meta:meta])* $name:ident<$item:ty>) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            #[serde(rename = "Projects")]
            #[serde(default, deserialize_with = "crate::types::null_as_empty")]
            pub projects: Vec<$item>,
            #[serde(rename = "Applications")]
            #[serde(default, deserialize_with = "crate::types::null_as_empty")]
            pub applications: Vec<$item>,
            #[serde(rename = "ProjectServices")]
            #[serde(default, deserialize_with = "crate::types::null_as_empty")]
            pub project_services: Vec<$item>,
            #[serde(rename = "DataPipelines")]
            #[serde(default, deserialize_with = "crate::types::null_as_empty")]
            pub data_pipelines: Vec<$item>,
            #[serde(rename = "Functions")]
            #[serde(default, deserialize_with = "crate::types::null_as_empty")]
            pub functions: Vec<$item>,
            #[serde(rename = "RuntimeEnvironments")]
            #[serde(default, deserialize_with = "crate::types::null_as_empty")]
            pub runtime_environments: Vec<$item>,
            #[serde(rename = "MLModels")]
            #[serde(default, deserialize_with = "crate::types::null_as_empty")]
            pub ml_models: Vec<$item>,
            #[serde(rename = "CloudProfiles")]
            #[serde(default, deserialize_with = "crate::types::null_as_empty")]
            pub cloud_profiles: Vec<$item>,
            #[serde(rename = "ContainerRegistries")]
            #[serde(default, deserialize_with = "crate::types::null_as_empty")]
            pub container_registries: Vec<$item>,
            #[serde(rename = "Categories")]
            #[serde(default, deserialize_with = "crate::types::null_as_empty")]
            pub categories: Vec<$item>,
            #[serde(rename = "DataSources")]
            #[serde(default, deserialize_with = "crate::types::null_as_empty")]
            pub data_sources: Vec<$item>,
            #[serde(rename = "LogCollectors")]
            #[serde(default, deserialize_with = "crate::types::null_as_empty")]
            pub log_collectors: Vec<$item>,
            #[serde(rename = "SoftwareUpdates")]
            #[serde(default, deserialize_with = "crate::types::null_as_empty")]
            pub software_updates: Vec<$item>,
            #[serde(rename = "SvcInstances")]
            #[serde(default, deserialize_with = "crate::types::null_as_empty")]
            pub svc_instances: Vec<$item>,
            #[serde(rename = "SvcBindings")]
            #[serde(default, deserialize_with = "crate::types::null_as_empty")]
            pub svc_bindings: Vec<$item>,
            #[serde(rename = "DataDriverInstances")]
            #[serde(default, deserialize_with = "crate::types::null_as_empty")]
            pub data_driver_instances: Vec<$item>,
        }

        impl $name {
            /// The list for one collection.
            pub fn get(&self, kind: EntityKind) -> &Vec<$item> {
                match kind {
                    EntityKind::Projects => &self.projects,
                    EntityKind::Applications => &self.applications,
                    EntityKind::ProjectServices => &self.project_services,
                    EntityKind::DataPipelines => &self.data_pipelines,
                    EntityKind::Functions => &self.functions,
                    EntityKind::RuntimeEnvironments => &self.runtime_environments,
                    EntityKind::MlModels => &self.ml_models,
                    EntityKind::CloudProfiles => &self.cloud_profiles,
                    EntityKind::ContainerRegistries => &self.container_registries,
                    EntityKind::Categories => &self.categories,
                    EntityKind::DataSources => &self.data_sources,
                    EntityKind::LogCollectors => &self.log_collectors,
                    EntityKind::SoftwareUpdates => &self.software_updates,
                    EntityKind::SvcInstances => &self.svc_instances,
                    EntityKind::SvcBindings => &self.svc_bindings,
                    EntityKind::DataDriverInstances => &self.data_driver_instances,
                }
            }

            /// Mutable access to the list for one collection.
            pub fn get_mut(&mut self, kind: EntityKind) -> &mut Vec<$item> {
                match kind {
                    EntityKind::Projects => &mut self.projects,
                    EntityKind::Applications => &mut self.applications,
                    EntityKind::ProjectServices => &mut self.project_services,
                    EntityKind::DataPipelines => &mut self.data_pipelines,
                    EntityKind::Functions => &mut self.functions,
                    EntityKind::RuntimeEnvironments => &mut self.runtime_environments,
                    EntityKind::MlModels => &mut self.ml_models,
                    EntityKind::CloudProfiles => &mut self.cloud_profiles,
                    EntityKind::ContainerRegistries => &mut self.container_registries,
                    EntityKind::Categories => &mut self.categories,
                    EntityKind::DataSources => &mut self.data_sources,
                    EntityKind::LogCollectors => &mut self.log_collectors,
                    EntityKind::SoftwareUpdates => &mut self.software_updates,
                    EntityKind::SvcInstances => &mut self.svc_instances,
                    EntityKind::SvcBindings => &mut self.svc_bindings,
                    EntityKind::DataDriverInstances => &mut self.data_driver_instances,
                }
            }

            /// Replaces the list for one collection, builder style.
            pub fn with(mut self, kind: EntityKind, items: Vec<$item>) -> Self {
                *self.get_mut(kind) = items;
                self
            }

            /// Returns true if every collection is empty.
            pub fn is_empty(&self) -> bool {
                EntityKind::ALL.iter().all(|kind| self.get(*kind).is_empty())
            }
        }
    };
}

// =============================================================================
// Request
// =============================================================================

per_collection! {
    /// Snapshot of what the edge currently holds, per collection.
    #[derive(TS)]
    #[ts(export)]
    EdgeInventoryDeltaPayload<EntityVersionMetadata>
}

impl EdgeInventoryDeltaPayload {
    /// The edge's snapshot for one collection.
    pub fn snapshot(&self, kind: EntityKind) -> &[EntityVersionMetadata] {
        self.get(kind)
    }
}

// =============================================================================
// Response
// =============================================================================

per_collection! {
    /// IDs the edge must delete, per collection.
    #[derive(TS)]
    #[ts(export)]
    EdgeInventoryDeleted<String>
}

impl EdgeInventoryDeleted {
    pub fn ids(&self, kind: EntityKind) -> &[String] {
        self.get(kind)
    }
}

per_collection! {
    /// Full entities the edge must create or update, per collection.
    EdgeInventoryDetails<InventoryEntity>
}

impl EdgeInventoryDetails {
    pub fn entities(&self, kind: EntityKind) -> &[InventoryEntity] {
        self.get(kind)
    }

    /// IDs of the entities held for one collection, in order.
    pub fn entity_ids(&self, kind: EntityKind) -> Vec<String> {
        self.get(kind).iter().map(|e| e.id.clone()).collect()
    }
}

/// What the edge must change to match the cloud.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EdgeInventoryDeltaResponse {
    #[serde(default)]
    pub deleted: EdgeInventoryDeleted,
    #[serde(default)]
    pub created: EdgeInventoryDetails,
    #[serde(default)]
    pub updated: EdgeInventoryDetails,
}

impl EdgeInventoryDeltaResponse {
    /// Returns true if the edge is already in sync.
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.created.is_empty() && self.updated.is_empty()
    }

    /// Stores the result of one collection.
    pub fn set_collection(
        &mut self,
        kind: EntityKind,
        deleted: Vec<String>,
        created: Vec<InventoryEntity>,
        updated: Vec<InventoryEntity>,
    ) {
        *self.deleted.get_mut(kind) = deleted;
        *self.created.get_mut(kind) = created;
        *self.updated.get_mut(kind) = updated;
    }

    /// Applies UNDEPLOY handling to applications and data pipelines.
    ///
    /// An undeployed entity the edge does not have yet is not sent at all.
    /// An undeployed entity the edge already runs is turned into a delete.
    pub fn drop_undeployed(&mut self) {
        for kind in EntityKind::ALL.into_iter().filter(EntityKind::is_deployable) {
            self.created.get_mut(kind).retain(|e| !e.is_undeployed());

            let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(self.updated.get_mut(kind))
                .into_iter()
                .partition(InventoryEntity::is_undeployed);
            *self.updated.get_mut(kind) = kept;
            self.deleted
                .get_mut(kind)
                .extend(removed.into_iter().map(|e| e.id));
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityState;

    #[test]
    fn test_typescript_bindings_use_wire_keys() {
        let payload = EdgeInventoryDeltaPayload::decl();
        assert!(payload.contains("Projects"), "{payload}");
        assert!(payload.contains("MLModels"), "{payload}");
        assert!(payload.contains("DataDriverInstances"), "{payload}");
        assert!(!payload.contains("ml_models"), "{payload}");
        assert!(!payload.contains("data_driver_instances"), "{payload}");

        let deleted = EdgeInventoryDeleted::decl();
        assert!(deleted.contains("SvcBindings"), "{deleted}");
        assert!(!deleted.contains("svc_bindings"), "{deleted}");
    }

    #[test]
    fn test_payload_missing_and_null_keys_are_empty() {
        let raw = r#"{
            "Projects": [{"id":"p1","updatedAt":"2018-01-01T01:01:01Z"}],
            "Applications": null
        }"#;
        let payload: EdgeInventoryDeltaPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.snapshot(EntityKind::Projects).len(), 1);
        assert!(payload.snapshot(EntityKind::Applications).is_empty());
        assert!(payload.snapshot(EntityKind::MlModels).is_empty());
        assert!(!payload.is_empty());
    }

    #[test]
    fn test_payload_ml_models_wire_name() {
        let raw = r#"{"MLModels":[{"id":"m1","updatedAt":"2018-01-01T01:01:01Z"}]}"#;
        let payload: EdgeInventoryDeltaPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.ml_models[0].id, "m1");

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("MLModels").is_some());
        assert!(json.get("MlModels").is_none());
    }

    #[test]
    fn test_accessors_cover_every_kind() {
        let mut deleted = EdgeInventoryDeleted::default();
        for kind in EntityKind::ALL {
            deleted.get_mut(kind).push(kind.wire_name().to_string());
        }
        let json = serde_json::to_value(&deleted).unwrap();
        for kind in EntityKind::ALL {
            assert_eq!(json[kind.wire_name()][0], kind.wire_name());
            assert_eq!(deleted.ids(kind), &[kind.wire_name().to_string()]);
        }
    }

    #[test]
    fn test_response_wire_shape() {
        let mut response = EdgeInventoryDeltaResponse::default();
        response.set_collection(
            EntityKind::Projects,
            vec!["p0".to_string()],
            vec![InventoryEntity::new("p1")],
            vec![],
        );

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["Deleted"]["Projects"][0], "p0");
        assert_eq!(json["Created"]["Projects"][0]["id"], "p1");
        assert!(json["Updated"]["Projects"].as_array().unwrap().is_empty());
        assert!(!response.is_empty());
    }

    #[test]
    fn test_drop_undeployed() {
        let mut response = EdgeInventoryDeltaResponse::default();
        response.set_collection(
            EntityKind::Applications,
            vec!["app-gone".to_string()],
            vec![
                InventoryEntity::new("app-new"),
                InventoryEntity::new("app-new-off").with_state(EntityState::Undeploy),
            ],
            vec![
                InventoryEntity::new("app-upd").with_state(EntityState::Deploy),
                InventoryEntity::new("app-upd-off").with_state(EntityState::Undeploy),
            ],
        );
        response.set_collection(
            EntityKind::Functions,
            vec![],
            vec![InventoryEntity::new("fn-1").with_state(EntityState::Undeploy)],
            vec![],
        );

        response.drop_undeployed();

        assert_eq!(response.created.entity_ids(EntityKind::Applications), vec!["app-new"]);
        assert_eq!(response.updated.entity_ids(EntityKind::Applications), vec!["app-upd"]);
        assert_eq!(
            response.deleted.ids(EntityKind::Applications),
            &["app-gone".to_string(), "app-upd-off".to_string()]
        );
        // state is only acted on for deployable kinds
        assert_eq!(response.created.entity_ids(EntityKind::Functions), vec!["fn-1"]);
    }
}
