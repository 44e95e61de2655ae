use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, bail, ensure};
use podgrid_resources::{Node, QUOTA_BASE};
use podgrid_state::StateStore;
use serde::Deserialize;
use tracing::info;

/// Node description as written in a node file.
///
/// ```toml
/// name = "node-1"
/// memory = 17179869184
/// cores = ["8"]          # cores without NUMA topology
///
/// [[numa]]
/// id = "0"
/// cores = ["0", "1", "2", "3"]
/// memory = 8589934592
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub name: String,
    pub memory: i64,
    #[serde(default)]
    pub cores: Vec<String>,
    #[serde(default)]
    pub numa: Vec<NumaSpec>,
    /// Quota units per core; one full core by default.
    #[serde(default = "full_core")]
    pub core_quota: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NumaSpec {
    pub id: String,
    pub cores: Vec<String>,
    #[serde(default)]
    pub memory: i64,
}

fn full_core() -> i64 {
    QUOTA_BASE
}

impl NodeSpec {
    pub fn into_node(self) -> anyhow::Result<Node> {
        ensure!(!self.name.is_empty(), "node name is empty");
        ensure!(self.memory >= 0, "node {}: negative memory", self.name);
        ensure!(self.core_quota > 0, "node {}: core_quota must be positive", self.name);

        let mut seen = BTreeSet::new();
        let mut node = Node::new(&self.name).with_memory(self.memory);
        for core in &self.cores {
            if !seen.insert(core.clone()) {
                bail!("node {}: core {core} listed twice", self.name);
            }
            node = node.with_core(core.clone(), self.core_quota);
        }
        for domain in self.numa {
            ensure!(
                domain.memory >= 0,
                "node {}: negative memory on numa {}",
                self.name,
                domain.id
            );
            for core in domain.cores {
                if !seen.insert(core.clone()) {
                    bail!("node {}: core {core} listed twice", self.name);
                }
                node = node
                    .with_core(core.clone(), self.core_quota)
                    .with_numa(core, domain.id.clone());
            }
            node = node.with_numa_memory(domain.id, domain.memory);
        }
        ensure!(!seen.is_empty(), "node {}: no cores", self.name);
        Ok(node)
    }
}

pub fn add(store: &StateStore, file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("reading node file {}", file.display()))?;
    let spec: NodeSpec = toml::from_str(&content)?;
    let node = spec.into_node()?;

    store.put_node(&node)?;
    info!(node = node.name(), cores = node.cpu().len(), "node registered");
    println!("✓ Registered node {}", node.name());
    Ok(())
}

pub fn list(store: &StateStore) -> anyhow::Result<()> {
    let nodes = store.list_nodes()?;
    println!("{}", serde_json::to_string_pretty(&nodes)?);
    Ok(())
}

pub fn remove(store: &StateStore, name: &str) -> anyhow::Result<()> {
    if !store.delete_node(name)? {
        bail!("node not found: {name}");
    }
    println!("✓ Removed node {name}");
    Ok(())
}
