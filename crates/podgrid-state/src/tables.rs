//! redb table definitions for the node registry.

use redb::TableDefinition;

/// Node ledgers keyed by node name, JSON values.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");
