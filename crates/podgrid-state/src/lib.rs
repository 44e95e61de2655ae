//! podgrid-state — embedded node registry.
//!
//! Backed by [redb](https://docs.rs/redb). Each [`Node`](podgrid_resources::Node)
//! ledger is JSON-serialized under its node name. The store is persistent or
//! in-memory (tests, dry runs).
//!
//! `StateStore` is `Clone + Send + Sync` (an `Arc<Database>` inside), so the
//! scheduler and the CLI share one handle.

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::StateStore;
