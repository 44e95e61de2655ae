//! Resource core error types.

use thiserror::Error;

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Errors produced while validating, selecting, or applying resources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("invalid resource: {0}")]
    InvalidResource(String),

    #[error("no available node")]
    NoAvailableNode,

    #[error("node not in plan: {0}")]
    NodeNotInPlan(String),

    #[error("slot {index} out of range for node {node} (capacity {capacity})")]
    IndexOutOfRange {
        node: String,
        index: usize,
        capacity: usize,
    },

    #[error("core {core} not found on node {node}")]
    UnknownCore { node: String, core: String },

    #[error("node selection failed: {0}")]
    Selection(String),
}

impl ResourceError {
    /// True for errors raised by request validation.
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, ResourceError::InvalidResource(_))
    }
}
