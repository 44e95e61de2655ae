pub mod node;
pub mod schedule;

use std::path::Path;

use podgrid_scheduler::PodgridConfig;
use podgrid_state::StateStore;
use tracing::debug;

/// Load `path` if it exists, otherwise fall back to defaults.
pub fn load_config(path: &Path) -> anyhow::Result<PodgridConfig> {
    if path.exists() {
        PodgridConfig::from_file(path)
    } else {
        debug!(?path, "no config file, using defaults");
        Ok(PodgridConfig::default())
    }
}

pub fn open_store(config: &PodgridConfig) -> anyhow::Result<StateStore> {
    Ok(StateStore::open(&config.state.path)?)
}
