//! Registry failures.
//!
//! redb's many error types collapse into [`StateError::Storage`]. Codec
//! failures keep the name of the node whose ledger could not be stored or
//! read back, since one bad entry otherwise poisons every listing.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot open node registry: {0}")]
    Open(String),

    /// Any redb failure after the database is open.
    #[error("node registry storage: {0}")]
    Storage(String),

    #[error("cannot encode ledger for node {node}: {reason}")]
    Encode { node: String, reason: String },

    #[error("stored ledger for node {node} is corrupt: {reason}")]
    Decode { node: String, reason: String },
}

impl StateError {
    pub(crate) fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    pub(crate) fn decode(node: &str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            node: node.to_string(),
            reason: err.to_string(),
        }
    }
}
