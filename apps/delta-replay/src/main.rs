//! # Delta Replay
//!
//! Replays an edge's inventory sync call against an inventory fixture.
//!
//! ```text
//! delta-replay --inventory tenant.json --payload edge-payload.json \
//!              --tenant tenant-1 --edge edge-sfo [--collection Applications] [--pretty]
//! ```
//!
//! The delta is written to stdout as JSON; logs go to stderr
//! (`RUST_LOG=debug` for per-collection timings).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fleet_core::validation::validate_collection_name;
use fleet_core::{EdgeInventoryDeltaPayload, EdgeInventoryDeltaResponse, EntityKind};
use fleet_sync::{DeltaConfig, EdgeContext, InMemoryInventory, InventoryDeltaService};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "delta-replay", version, about = "Replay an edge inventory delta request")]
struct Args {
    /// Inventory fixture (JSON) holding the tenant's edges, projects and entities
    #[arg(long)]
    inventory: PathBuf,

    /// Edge payload (JSON): `{ "Projects": [{"id", "updatedAt"}], ... }`
    #[arg(long)]
    payload: PathBuf,

    #[arg(long)]
    tenant: String,

    #[arg(long)]
    edge: String,

    /// Delta config file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only print this collection (e.g. `Applications`, `MLModels`)
    #[arg(long)]
    collection: Option<String>,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    let only = args
        .collection
        .as_deref()
        .map(validate_collection_name)
        .transpose()?;

    let config = DeltaConfig::load(args.config.clone()).context("loading delta config")?;

    let inventory = Arc::new(
        InMemoryInventory::load(&args.inventory)
            .with_context(|| format!("loading inventory {}", args.inventory.display()))?,
    );

    let payload_json = std::fs::read_to_string(&args.payload)
        .with_context(|| format!("reading payload {}", args.payload.display()))?;
    let payload: EdgeInventoryDeltaPayload =
        serde_json::from_str(&payload_json).context("parsing edge payload")?;

    info!(
        tenant_id = %args.tenant,
        edge_id = %args.edge,
        max_concurrent = config.delta.max_concurrent_collections,
        categories = config.delta.send_categories_delta,
        "Replaying inventory delta"
    );

    let service = InventoryDeltaService::from_config(inventory.clone(), inventory, &config);
    let outcome = service
        .get_edge_inventory_delta(&EdgeContext::new(&args.tenant, &args.edge), &payload)
        .await?;

    for failure in &outcome.failures {
        warn!(
            collection = %failure.kind,
            retryable = failure.is_retryable(),
            "Collection failed: {}",
            failure.error
        );
    }

    let output = match only {
        Some(kind) => collection_view(&outcome.response, kind)?,
        None => serde_json::to_value(&outcome.response)?,
    };

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");

    Ok(())
}

/// Narrows a response to one collection, keeping the Deleted/Created/Updated
/// envelope.
fn collection_view(response: &EdgeInventoryDeltaResponse, kind: EntityKind) -> anyhow::Result<Value> {
    let full = serde_json::to_value(response)?;
    let mut view = serde_json::Map::new();
    for section in ["Deleted", "Created", "Updated"] {
        let items = full
            .get(section)
            .and_then(|s| s.get(kind.wire_name()))
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        let mut inner = serde_json::Map::new();
        inner.insert(kind.wire_name().to_string(), items);
        view.insert(section.to_string(), Value::Object(inner));
    }
    Ok(Value::Object(view))
}
