//! StateStore — redb-backed registry of node ledgers.

use std::path::Path;
use std::sync::Arc;

use podgrid_resources::Node;
use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::NODES;

/// Thread-safe node registry backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore").finish_non_exhaustive()
    }
}

impl StateStore {
    /// Open (or create) a persistent registry at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(|e| StateError::Open(e.to_string()))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory registry.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(|e| StateError::Open(e.to_string()))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(StateError::storage)?;
        txn.open_table(NODES).map_err(StateError::storage)?;
        txn.commit().map_err(StateError::storage)?;
        Ok(())
    }

    /// Insert or replace one node ledger.
    pub fn put_node(&self, node: &Node) -> StateResult<()> {
        self.put_nodes(std::slice::from_ref(node))
    }

    /// Insert or replace several ledgers in a single write transaction.
    ///
    /// Either every ledger is stored or none is.
    pub fn put_nodes(&self, nodes: &[Node]) -> StateResult<()> {
        let values = nodes
            .iter()
            .map(|node| {
                serde_json::to_vec(node)
                    .map(|v| (node.name(), v))
                    .map_err(|e| StateError::Encode {
                        node: node.name().to_string(),
                        reason: e.to_string(),
                    })
            })
            .collect::<StateResult<Vec<_>>>()?;

        let txn = self.db.begin_write().map_err(StateError::storage)?;
        {
            let mut table = txn.open_table(NODES).map_err(StateError::storage)?;
            for (name, value) in &values {
                table
                    .insert(*name, value.as_slice())
                    .map_err(StateError::storage)?;
            }
        }
        txn.commit().map_err(StateError::storage)?;
        debug!(count = values.len(), "nodes stored");
        Ok(())
    }

    /// Get a node ledger by name.
    pub fn get_node(&self, name: &str) -> StateResult<Option<Node>> {
        let txn = self.db.begin_read().map_err(StateError::storage)?;
        let table = txn.open_table(NODES).map_err(StateError::storage)?;
        match table.get(name).map_err(StateError::storage)? {
            Some(guard) => {
                let node: Node = serde_json::from_slice(guard.value())
                    .map_err(|e| StateError::decode(name, e))?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    /// List all node ledgers, ordered by name.
    pub fn list_nodes(&self) -> StateResult<Vec<Node>> {
        let txn = self.db.begin_read().map_err(StateError::storage)?;
        let table = txn.open_table(NODES).map_err(StateError::storage)?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(StateError::storage)? {
            let (key, value) = entry.map_err(StateError::storage)?;
            let node: Node = serde_json::from_slice(value.value())
                .map_err(|e| StateError::decode(key.value(), e))?;
            results.push(node);
        }
        Ok(results)
    }

    /// Delete a node by name. Returns true if it existed.
    pub fn delete_node(&self, name: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(StateError::storage)?;
        let existed;
        {
            let mut table = txn.open_table(NODES).map_err(StateError::storage)?;
            existed = table.remove(name).map_err(StateError::storage)?.is_some();
        }
        txn.commit().map_err(StateError::storage)?;
        debug!(%name, existed, "node deleted");
        Ok(existed)
    }
}
