//! Scheduler error types.

use thiserror::Error;

/// Errors that can occur while reserving resources.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("instance count must be at least 1")]
    InvalidCount,

    #[error("insufficient capacity: requested {requested}, available {available}")]
    InsufficientCapacity { requested: usize, available: usize },

    #[error("selection returned unknown node: {0}")]
    UnknownNode(String),

    #[error("reservation task failed: {0}")]
    Task(String),

    #[error("resource error: {0}")]
    Resource(#[from] podgrid_resources::ResourceError),

    #[error("lock error: {0}")]
    Lock(#[from] podgrid_lock::LockError),

    #[error("state store error: {0}")]
    State(#[from] podgrid_state::StateError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
