//! # Inventory Delta Service
//!
//! Answers one edge's inventory sync request.
//!
//! ## Request Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     get_edge_inventory_delta                            │
//! │                                                                         │
//! │  1. VALIDATE   duplicate IDs (only with the reject policy)             │
//! │        │                                                                │
//! │  2. SCOPE      labels, projects, log collectors      ── hard failure   │
//! │        │                                                                │
//! │  3. COLLECT    ┌──────────┐ ┌──────────┐ ┌──────────┐                  │
//! │     (bounded)  │ Projects │ │ Apps     │ │ ...      │  ≤ N in flight   │
//! │                │ snapshot │ │ snapshot │ │ snapshot │  each with its   │
//! │                │ diff     │ │ diff     │ │ diff     │  own timeout     │
//! │                │ hydrate  │ │ hydrate  │ │ hydrate  │                  │
//! │                └────┬─────┘ └────┬─────┘ └────┬─────┘                  │
//! │                     └── ok ──────┴── err ─────┘                        │
//! │                          │           └──► failures (isolated)          │
//! │  4. POST-PROCESS  UNDEPLOY: drop from Created, move Updated → Deleted  │
//! │        │                                                                │
//! │  5. RESPOND    InventoryDeltaOutcome { response, failures }            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The service keeps no state between calls; it only holds its collaborators
//! and settings.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use fleet_core::delta::{diff, software_update_diff};
use fleet_core::validation::validate_payload_unique_ids;
use fleet_core::{
    EdgeInventoryDeltaPayload, EdgeInventoryDeltaResponse, EntityKind,
    EntityVersionMetadataChangeInfo, InventoryEntity,
};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::{DeltaConfig, DeltaSettings, DuplicateIdPolicy};
use crate::error::{SyncError, SyncResult};
use crate::repository::{InventoryRepository, SelectorResolver};
use crate::scope::{application_snapshot, resolve_scope, EdgeContext, EdgeScope};

// =============================================================================
// Outcome Types
// =============================================================================

/// A collection that could not be reconciled in this request.
#[derive(Debug)]
pub struct CollectionFailure {
    pub kind: EntityKind,
    pub error: SyncError,
}

impl CollectionFailure {
    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

/// Result of one inventory delta request.
///
/// Collections listed in `failures` contribute nothing to `response`; the
/// edge keeps what it has for them and picks the change up next time.
#[derive(Debug, Default)]
pub struct InventoryDeltaOutcome {
    pub response: EdgeInventoryDeltaResponse,
    pub failures: Vec<CollectionFailure>,
}

impl InventoryDeltaOutcome {
    /// Returns true if every collection was reconciled.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Kinds that failed, in wire order.
    pub fn failed_kinds(&self) -> Vec<EntityKind> {
        self.failures.iter().map(|f| f.kind).collect()
    }
}

/// Delta of one collection after hydration.
#[derive(Debug, Default)]
struct CollectionDelta {
    deleted: Vec<String>,
    created: Vec<InventoryEntity>,
    updated: Vec<InventoryEntity>,
}

// =============================================================================
// Service
// =============================================================================

/// Computes inventory deltas for edges.
///
/// ## Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use fleet_core::EdgeInventoryDeltaPayload;
/// use fleet_sync::{DeltaConfig, EdgeContext, InMemoryInventory, InventoryDeltaService};
///
/// # async fn run() -> fleet_sync::SyncResult<()> {
/// let inventory = Arc::new(InMemoryInventory::new("tenant-1"));
/// let service = InventoryDeltaService::from_config(
///     inventory.clone(),
///     inventory,
///     &DeltaConfig::default(),
/// );
///
/// let ctx = EdgeContext::new("tenant-1", "edge-1");
/// let outcome = service
///     .get_edge_inventory_delta(&ctx, &EdgeInventoryDeltaPayload::default())
///     .await?;
/// println!("{}", serde_json::to_string(&outcome.response)?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InventoryDeltaService {
    resolver: Arc<dyn SelectorResolver>,
    repository: Arc<dyn InventoryRepository>,
    settings: DeltaSettings,
}

impl InventoryDeltaService {
    pub fn new(
        resolver: Arc<dyn SelectorResolver>,
        repository: Arc<dyn InventoryRepository>,
        settings: DeltaSettings,
    ) -> Self {
        InventoryDeltaService {
            resolver,
            repository,
            settings,
        }
    }

    pub fn from_config(
        resolver: Arc<dyn SelectorResolver>,
        repository: Arc<dyn InventoryRepository>,
        config: &DeltaConfig,
    ) -> Self {
        Self::new(resolver, repository, config.delta.clone())
    }

    pub fn settings(&self) -> &DeltaSettings {
        &self.settings
    }

    /// Kinds reconciled by this service, in wire order.
    pub fn tracked_kinds(&self) -> Vec<EntityKind> {
        EntityKind::ALL
            .into_iter()
            .filter(|kind| *kind != EntityKind::Categories || self.settings.send_categories_delta)
            .collect()
    }

    /// Computes what the edge must delete, create and update.
    ///
    /// ## Errors
    /// - [`SyncError::Validation`] if the payload is rejected
    /// - [`SyncError::UnknownEdge`] / [`SyncError::Scope`] if the scope
    ///   cannot be resolved
    ///
    /// Failures of single collections do not fail the request; they are
    /// reported in [`InventoryDeltaOutcome::failures`].
    pub async fn get_edge_inventory_delta(
        &self,
        ctx: &EdgeContext,
        payload: &EdgeInventoryDeltaPayload,
    ) -> SyncResult<InventoryDeltaOutcome> {
        let started = Instant::now();

        if self.settings.duplicate_ids == DuplicateIdPolicy::Reject {
            validate_payload_unique_ids(payload)?;
        }

        let scope = resolve_scope(self.resolver.as_ref(), self.repository.as_ref(), ctx).await?;

        let timeout = self.settings.collection_timeout();
        let timeout_ms = self.settings.collection_timeout_ms;
        let scope = &scope;

        let mut results: Vec<(EntityKind, SyncResult<CollectionDelta>)> =
            stream::iter(self.tracked_kinds())
                .map(move |kind| async move {
                    let collection_started = Instant::now();
                    let edge_snapshot = payload.snapshot(kind);
                    let result = match tokio::time::timeout(
                        timeout,
                        self.reconcile_collection(kind, scope, edge_snapshot),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(SyncError::CollectionTimeout { kind, timeout_ms }),
                    };
                    debug!(
                        collection = %kind,
                        elapsed_ms = collection_started.elapsed().as_millis() as u64,
                        ok = result.is_ok(),
                        "Collection reconciled"
                    );
                    (kind, result)
                })
                .buffer_unordered(self.settings.max_concurrent_collections.max(1))
                .collect()
                .await;

        results.sort_by_key(|(kind, _)| *kind);

        let mut outcome = InventoryDeltaOutcome::default();
        for (kind, result) in results {
            match result {
                Ok(delta) => {
                    outcome
                        .response
                        .set_collection(kind, delta.deleted, delta.created, delta.updated);
                }
                Err(error) => {
                    warn!(
                        tenant_id = %ctx.tenant_id,
                        edge_id = %ctx.edge_id,
                        collection = %kind,
                        retryable = error.is_retryable(),
                        error = %error,
                        "Collection skipped in inventory delta"
                    );
                    outcome.failures.push(CollectionFailure { kind, error });
                }
            }
        }

        outcome.response.drop_undeployed();

        info!(
            tenant_id = %ctx.tenant_id,
            edge_id = %ctx.edge_id,
            projects = scope.projects.len(),
            failed_collections = outcome.failures.len(),
            in_sync = outcome.response.is_empty(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Computed edge inventory delta"
        );

        Ok(outcome)
    }

    /// Snapshot, diff and hydrate one collection.
    async fn reconcile_collection(
        &self,
        kind: EntityKind,
        scope: &EdgeScope,
        edge_snapshot: &[fleet_core::EntityVersionMetadata],
    ) -> SyncResult<CollectionDelta> {
        let change = match kind {
            EntityKind::Projects => diff(edge_snapshot, &scope.projects),
            EntityKind::Applications => {
                let server = application_snapshot(self.resolver.as_ref(), scope).await?;
                diff(edge_snapshot, &server)
            }
            EntityKind::SoftwareUpdates => {
                let server = self.repository.scoped_snapshot(kind, scope).await?;
                software_update_diff(edge_snapshot, server.first())
            }
            _ => {
                let server = self.repository.scoped_snapshot(kind, scope).await?;
                diff(edge_snapshot, &server)
            }
        };

        self.hydrate(kind, scope, change).await
    }

    /// Fetches full entities for created and updated IDs in one call.
    async fn hydrate(
        &self,
        kind: EntityKind,
        scope: &EdgeScope,
        change: EntityVersionMetadataChangeInfo,
    ) -> SyncResult<CollectionDelta> {
        let created_ids = change.created.ids();
        let updated_ids = change.updated.ids();
        let mut delta = CollectionDelta {
            deleted: change.deleted.ids(),
            ..Default::default()
        };

        if created_ids.is_empty() && updated_ids.is_empty() {
            return Ok(delta);
        }

        let wanted: Vec<String> = created_ids.iter().chain(&updated_ids).cloned().collect();
        let mut fetched: HashMap<String, InventoryEntity> = self
            .repository
            .fetch_by_ids(kind, scope, &wanted)
            .await?
            .into_iter()
            .map(|entity| (entity.id.clone(), entity))
            .collect();

        for id in &created_ids {
            match fetched.remove(id) {
                Some(entity) => delta.created.push(entity),
                None => debug!(collection = %kind, id = %id, "Created entity vanished before fetch"),
            }
        }
        for id in &updated_ids {
            match fetched.remove(id) {
                Some(entity) => delta.updated.push(entity),
                None => debug!(collection = %kind, id = %id, "Updated entity vanished before fetch"),
            }
        }

        Ok(delta)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ApplicationRecord, EdgeRecord, InMemoryInventory, InventoryRecord, ProjectRecord};
    use crate::repository::{RepositoryError, RepositoryResult};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use fleet_core::{CategoryInfo, EntityState, EntityVersionMetadata, ValidationError};
    use std::time::Duration;

    const TENANT: &str = "tenant-1";
    const EDGE: &str = "edge-sfo";

    fn t(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 6, day, 12, 0, 0).unwrap()
    }

    fn ci(id: &str, value: &str) -> CategoryInfo {
        CategoryInfo::new(id, value)
    }

    fn evm(id: &str, day: u32) -> EntityVersionMetadata {
        EntityVersionMetadata::new(id, t(day))
    }

    fn fixture() -> InMemoryInventory {
        let mut inv = InMemoryInventory::new(TENANT);
        inv.edges.push(EdgeRecord::new(EDGE, vec![ci("Region", "SFO"), ci("Tier", "Gold")]));

        inv.projects.push(ProjectRecord::explicit("p-explicit", t(1), vec![EDGE.into()]));
        inv.projects.push(ProjectRecord::category("p-west", t(1), vec![ci("Region", "SFO")]));
        inv.projects.push(ProjectRecord::category("p-east", t(1), vec![ci("Region", "NYC")]));

        inv.applications.push(ApplicationRecord::new("app-1", t(2), "p-explicit").with_edges(vec![EDGE.into()]));
        inv.applications.push(ApplicationRecord::new("app-2", t(2), "p-west"));
        inv.applications.push(ApplicationRecord::new("app-east", t(2), "p-east"));

        inv.insert(EntityKind::DataPipelines, InventoryRecord::new(InventoryEntity::new("dp-1"), t(3)).with_projects(vec!["p-west".into()]));
        inv.insert(EntityKind::DataPipelines, InventoryRecord::new(InventoryEntity::new("dp-east"), t(3)).with_projects(vec!["p-east".into()]));
        inv.insert(EntityKind::Functions, InventoryRecord::new(InventoryEntity::new("fn-tenant"), t(3)));
        inv.insert(EntityKind::Categories, InventoryRecord::new(InventoryEntity::new("Region"), t(1)));
        inv.insert(EntityKind::SoftwareUpdates, InventoryRecord::new(InventoryEntity::new("batch-2"), t(5)));
        inv
    }

    fn service_with(inventory: InMemoryInventory, settings: DeltaSettings) -> InventoryDeltaService {
        let inventory = Arc::new(inventory);
        InventoryDeltaService::new(inventory.clone(), inventory, settings)
    }

    fn ctx() -> EdgeContext {
        EdgeContext::new(TENANT, EDGE)
    }

    /// The payload of an edge that is fully in sync with [`fixture`].
    fn in_sync_payload() -> EdgeInventoryDeltaPayload {
        EdgeInventoryDeltaPayload::default()
            .with(EntityKind::Projects, vec![evm("p-explicit", 1), evm("p-west", 1)])
            .with(EntityKind::Applications, vec![evm("app-1", 2), evm("app-2", 2)])
            .with(EntityKind::DataPipelines, vec![evm("dp-1", 3)])
            .with(EntityKind::Functions, vec![evm("fn-tenant", 3)])
            .with(EntityKind::SoftwareUpdates, vec![evm("batch-2", 5)])
    }

    #[tokio::test]
    async fn test_first_sync_creates_everything_in_scope() {
        let service = service_with(fixture(), DeltaSettings::default());
        let outcome = service
            .get_edge_inventory_delta(&ctx(), &EdgeInventoryDeltaPayload::default())
            .await
            .unwrap();

        assert!(outcome.is_complete());
        let created = &outcome.response.created;
        assert_eq!(created.entity_ids(EntityKind::Projects), vec!["p-explicit", "p-west"]);
        assert_eq!(created.entity_ids(EntityKind::Applications), vec!["app-1", "app-2"]);
        assert_eq!(created.entity_ids(EntityKind::DataPipelines), vec!["dp-1"]);
        assert_eq!(created.entity_ids(EntityKind::Functions), vec!["fn-tenant"]);
        assert_eq!(created.entity_ids(EntityKind::SoftwareUpdates), vec!["batch-2"]);
        // categories are not sent unless enabled
        assert!(created.entities(EntityKind::Categories).is_empty());
        assert!(outcome.response.deleted.is_empty());
        assert!(outcome.response.updated.is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_inventory_is_empty() {
        let service = service_with(fixture(), DeltaSettings::default());
        let outcome = service
            .get_edge_inventory_delta(&ctx(), &in_sync_payload())
            .await
            .unwrap();

        assert!(outcome.is_complete());
        assert!(outcome.response.is_empty(), "{:?}", outcome.response);
    }

    #[tokio::test]
    async fn test_mixed_delta_per_collection() {
        let service = service_with(fixture(), DeltaSettings::default());
        let payload = in_sync_payload()
            .with(EntityKind::DataPipelines, vec![evm("dp-1", 1), evm("dp-old", 1)])
            .with(EntityKind::Projects, vec![evm("p-explicit", 1)]);

        let response = service
            .get_edge_inventory_delta(&ctx(), &payload)
            .await
            .unwrap()
            .response;

        assert_eq!(response.deleted.ids(EntityKind::DataPipelines), &["dp-old".to_string()]);
        let updated = response.updated.entities(EntityKind::DataPipelines);
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].id, "dp-1");
        assert_eq!(updated[0].fields["updatedAt"], "2021-06-03T12:00:00Z");
        assert_eq!(response.created.entity_ids(EntityKind::Projects), vec!["p-west"]);
    }

    #[tokio::test]
    async fn test_out_of_scope_entities_are_deleted() {
        let service = service_with(fixture(), DeltaSettings::default());
        let payload = in_sync_payload()
            .with(EntityKind::Projects, vec![evm("p-explicit", 1), evm("p-west", 1), evm("p-east", 1)])
            .with(EntityKind::Applications, vec![evm("app-1", 2), evm("app-2", 2), evm("app-east", 2)]);

        let response = service
            .get_edge_inventory_delta(&ctx(), &payload)
            .await
            .unwrap()
            .response;

        assert_eq!(response.deleted.ids(EntityKind::Projects), &["p-east".to_string()]);
        assert_eq!(response.deleted.ids(EntityKind::Applications), &["app-east".to_string()]);
    }

    #[tokio::test]
    async fn test_undeployed_applications() {
        let mut inventory = fixture();
        inventory.applications.push(
            ApplicationRecord::new("app-off", t(2), "p-west")
                .with_entity(InventoryEntity::new("app-off").with_state(EntityState::Undeploy)),
        );
        inventory.applications[1].entity.state = Some(EntityState::Undeploy);
        inventory.applications[1].updated_at = t(4);

        let service = service_with(inventory, DeltaSettings::default());
        let response = service
            .get_edge_inventory_delta(&ctx(), &in_sync_payload())
            .await
            .unwrap()
            .response;

        // app-off is new and undeployed: not sent at all
        assert!(response.created.entities(EntityKind::Applications).is_empty());
        // app-2 was running and is now undeployed: turned into a delete
        assert!(response.updated.entities(EntityKind::Applications).is_empty());
        assert_eq!(response.deleted.ids(EntityKind::Applications), &["app-2".to_string()]);
    }

    #[tokio::test]
    async fn test_software_update_batch_change() {
        let service = service_with(fixture(), DeltaSettings::default());
        let payload = in_sync_payload().with(EntityKind::SoftwareUpdates, vec![evm("batch-1", 1)]);

        let response = service
            .get_edge_inventory_delta(&ctx(), &payload)
            .await
            .unwrap()
            .response;

        assert_eq!(response.deleted.ids(EntityKind::SoftwareUpdates), &["batch-1".to_string()]);
        assert_eq!(response.created.entity_ids(EntityKind::SoftwareUpdates), vec!["batch-2"]);
    }

    #[tokio::test]
    async fn test_categories_delta_gated_by_config() {
        let settings = DeltaSettings {
            send_categories_delta: true,
            ..Default::default()
        };
        let service = service_with(fixture(), settings);
        assert_eq!(service.tracked_kinds().len(), 16);

        let response = service
            .get_edge_inventory_delta(&ctx(), &in_sync_payload())
            .await
            .unwrap()
            .response;
        assert_eq!(response.created.entity_ids(EntityKind::Categories), vec!["Region"]);

        let service = service_with(fixture(), DeltaSettings::default());
        assert_eq!(service.tracked_kinds().len(), 15);
    }

    #[tokio::test]
    async fn test_unknown_edge_fails_request() {
        let service = service_with(fixture(), DeltaSettings::default());
        let err = service
            .get_edge_inventory_delta(&EdgeContext::new(TENANT, "edge-ghost"), &in_sync_payload())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnknownEdge { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_ids_policy() {
        let payload = in_sync_payload().with(EntityKind::Functions, vec![evm("fn-tenant", 1), evm("fn-tenant", 3)]);

        // last occurrence wins: the edge is in sync
        let service = service_with(fixture(), DeltaSettings::default());
        let outcome = service.get_edge_inventory_delta(&ctx(), &payload).await.unwrap();
        assert!(outcome.response.is_empty());

        let settings = DeltaSettings {
            duplicate_ids: DuplicateIdPolicy::Reject,
            ..Default::default()
        };
        let service = service_with(fixture(), settings);
        let err = service.get_edge_inventory_delta(&ctx(), &payload).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(ValidationError::Duplicate { .. })));
    }

    // -------------------------------------------------------------------------
    // Failure isolation
    // -------------------------------------------------------------------------

    /// Delegates to an inventory, except for one collection.
    struct FaultyRepository {
        inner: InMemoryInventory,
        kind: EntityKind,
        fault: Fault,
    }

    enum Fault {
        Unavailable,
        Hang,
    }

    #[async_trait]
    impl InventoryRepository for FaultyRepository {
        async fn scoped_snapshot(
            &self,
            kind: EntityKind,
            scope: &EdgeScope,
        ) -> RepositoryResult<Vec<EntityVersionMetadata>> {
            if kind == self.kind {
                match self.fault {
                    Fault::Unavailable => {
                        return Err(RepositoryError::Unavailable("replica lag".into()))
                    }
                    Fault::Hang => tokio::time::sleep(Duration::from_secs(3600)).await,
                }
            }
            self.inner.scoped_snapshot(kind, scope).await
        }

        async fn fetch_by_ids(
            &self,
            kind: EntityKind,
            scope: &EdgeScope,
            ids: &[String],
        ) -> RepositoryResult<Vec<InventoryEntity>> {
            self.inner.fetch_by_ids(kind, scope, ids).await
        }
    }

    fn faulty_service(kind: EntityKind, fault: Fault) -> InventoryDeltaService {
        let settings = DeltaSettings {
            collection_timeout_ms: 200,
            ..Default::default()
        };
        InventoryDeltaService::new(
            Arc::new(fixture()),
            Arc::new(FaultyRepository {
                inner: fixture(),
                kind,
                fault,
            }),
            settings,
        )
    }

    #[tokio::test]
    async fn test_collection_failure_is_isolated() {
        let service = faulty_service(EntityKind::DataPipelines, Fault::Unavailable);
        let outcome = service
            .get_edge_inventory_delta(&ctx(), &EdgeInventoryDeltaPayload::default())
            .await
            .unwrap();

        assert_eq!(outcome.failed_kinds(), vec![EntityKind::DataPipelines]);
        assert!(outcome.failures[0].is_retryable());
        assert!(outcome.response.created.entities(EntityKind::DataPipelines).is_empty());
        assert_eq!(
            outcome.response.created.entity_ids(EntityKind::Functions),
            vec!["fn-tenant"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_collection_timeout_is_isolated() {
        let service = faulty_service(EntityKind::Functions, Fault::Hang);
        let outcome = service
            .get_edge_inventory_delta(&ctx(), &EdgeInventoryDeltaPayload::default())
            .await
            .unwrap();

        assert_eq!(outcome.failed_kinds(), vec![EntityKind::Functions]);
        assert!(matches!(
            outcome.failures[0].error,
            SyncError::CollectionTimeout { kind: EntityKind::Functions, timeout_ms: 200 }
        ));
        assert_eq!(
            outcome.response.created.entity_ids(EntityKind::DataPipelines),
            vec!["dp-1"]
        );
    }

    #[tokio::test]
    async fn test_scope_failure_fails_request() {
        let service = faulty_service(EntityKind::LogCollectors, Fault::Unavailable);
        let err = service
            .get_edge_inventory_delta(&ctx(), &EdgeInventoryDeltaPayload::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Scope(RepositoryError::Unavailable(_))));
        assert!(err.is_retryable());
    }
}
