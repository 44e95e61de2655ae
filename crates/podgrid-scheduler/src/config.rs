//! podgrid.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use podgrid_placement::PlacementConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodgridConfig {
    pub state: StateConfig,
    pub lock: LockConfig,
    pub placement: PlacementConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// redb file holding node ledgers.
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("podgrid.redb"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Key of the cluster-wide scheduling lock.
    pub key: String,
    /// Lease ttl in milliseconds; also bounds lock and unlock waits.
    pub ttl_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            key: "/podgrid/schedule".to_string(),
            ttl_ms: 10_000,
        }
    }
}

impl LockConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl PodgridConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PodgridConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
