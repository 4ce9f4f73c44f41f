//! # Delta Configuration
//!
//! Configuration management for the inventory delta orchestrator.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FLEET_MAX_CONCURRENT_COLLECTIONS=8                                 │
//! │     FLEET_SEND_CATEGORIES_DELTA=true                                   │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/fleet-inventory/delta.toml (Linux)                       │
//! │     ~/Library/Application Support/com.fleet.inventory/delta.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # delta.toml
//! [delta]
//! max_concurrent_collections = 4
//! collection_timeout_ms = 5000
//! send_categories_delta = false
//! duplicate_ids = "last_write_wins"  # last_write_wins | reject
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Duplicate ID Policy
// =============================================================================

/// What to do when an edge snapshot lists the same ID twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateIdPolicy {
    /// Resolve by the last occurrence of the ID.
    #[default]
    LastWriteWins,

    /// Fail the whole request with a validation error.
    Reject,
}

impl std::fmt::Display for DuplicateIdPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuplicateIdPolicy::LastWriteWins => write!(f, "last_write_wins"),
            DuplicateIdPolicy::Reject => write!(f, "reject"),
        }
    }
}

impl std::str::FromStr for DuplicateIdPolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "last_write_wins" | "last-write-wins" | "lww" => Ok(DuplicateIdPolicy::LastWriteWins),
            "reject" | "strict" => Ok(DuplicateIdPolicy::Reject),
            other => Err(SyncError::InvalidConfig(format!(
                "Unknown duplicate ID policy: '{}'. Valid options: last_write_wins, reject",
                other
            ))),
        }
    }
}

// =============================================================================
// Delta Settings
// =============================================================================

/// Orchestrator behavior settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaSettings {
    /// Upper bound on collections reconciled at the same time.
    #[serde(default = "default_max_concurrent_collections")]
    pub max_concurrent_collections: usize,

    /// Budget for one collection (snapshot, diff and hydration).
    #[serde(default = "default_collection_timeout_ms")]
    pub collection_timeout_ms: u64,

    /// Whether the Categories collection is reconciled at all.
    ///
    /// Edges that predate category sync do not expect the key, so this is
    /// off unless enabled explicitly.
    #[serde(default)]
    pub send_categories_delta: bool,

    /// Handling of duplicate IDs in the edge payload.
    #[serde(default)]
    pub duplicate_ids: DuplicateIdPolicy,
}

fn default_max_concurrent_collections() -> usize {
    4
}

fn default_collection_timeout_ms() -> u64 {
    5000
}

impl Default for DeltaSettings {
    fn default() -> Self {
        DeltaSettings {
            max_concurrent_collections: default_max_concurrent_collections(),
            collection_timeout_ms: default_collection_timeout_ms(),
            send_categories_delta: false,
            duplicate_ids: DuplicateIdPolicy::default(),
        }
    }
}

impl DeltaSettings {
    /// Returns the per-collection timeout.
    pub fn collection_timeout(&self) -> Duration {
        Duration::from_millis(self.collection_timeout_ms)
    }
}

// =============================================================================
// Main Delta Configuration
// =============================================================================

/// Complete orchestrator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaConfig {
    /// Orchestrator behavior settings.
    #[serde(default)]
    pub delta: DeltaSettings,
}

impl DeltaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (delta.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading delta config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load delta config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Delta config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.delta.max_concurrent_collections == 0 {
            return Err(SyncError::InvalidConfig(
                "max_concurrent_collections must be greater than 0".into(),
            ));
        }

        if self.delta.collection_timeout_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "collection_timeout_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("FLEET_MAX_CONCURRENT_COLLECTIONS") {
            match value.parse::<usize>() {
                Ok(n) => {
                    debug!(max = n, "Overriding collection concurrency from environment");
                    self.delta.max_concurrent_collections = n;
                }
                Err(_) => warn!(value = %value, "Invalid FLEET_MAX_CONCURRENT_COLLECTIONS"),
            }
        }

        if let Ok(value) = std::env::var("FLEET_COLLECTION_TIMEOUT_MS") {
            match value.parse::<u64>() {
                Ok(ms) => self.delta.collection_timeout_ms = ms,
                Err(_) => warn!(value = %value, "Invalid FLEET_COLLECTION_TIMEOUT_MS"),
            }
        }

        if let Ok(value) = std::env::var("FLEET_SEND_CATEGORIES_DELTA") {
            match value.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.delta.send_categories_delta = true,
                "0" | "false" | "no" | "off" => self.delta.send_categories_delta = false,
                _ => warn!(value = %value, "Invalid FLEET_SEND_CATEGORIES_DELTA"),
            }
        }

        if let Ok(value) = std::env::var("FLEET_DUPLICATE_IDS") {
            match value.parse() {
                Ok(policy) => {
                    debug!(policy = %value, "Overriding duplicate ID policy from environment");
                    self.delta.duplicate_ids = policy;
                }
                Err(_) => warn!(value = %value, "Unknown duplicate ID policy in environment"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "fleet", "inventory")
            .map(|dirs| dirs.config_dir().join("delta.toml"))
    }
}
