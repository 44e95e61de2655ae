use std::sync::Arc;

use podgrid_lock::MemoryBackend;
use podgrid_resources::ResourceOptions;
use podgrid_scheduler::{Coordinator, PodgridConfig};
use podgrid_state::StateStore;

/// Reserve `count` instances and print the allocations as JSON.
///
/// The CLI runs as a single process, so the scheduling lock lives in an
/// in-process backend.
pub async fn schedule(
    config: &PodgridConfig,
    store: StateStore,
    options: ResourceOptions,
    count: usize,
) -> anyhow::Result<()> {
    let coordinator = Coordinator::from_config(config, store, Arc::new(MemoryBackend::new()))?;
    let allocations = coordinator.schedule(options, count).await?;
    println!("{}", serde_json::to_string_pretty(&allocations)?);
    Ok(())
}
