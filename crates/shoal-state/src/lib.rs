//! shoal-state: application model and snapshot store for Shoal.
//!
//! Holds the per-application aggregate: the append-only [`VersionStore`],
//! the mutable [`TaskRegistry`] and the current [`OpStatus`]. The
//! [`StateStore`] persists JSON snapshots of whole applications into redb
//! so the scheduler can record intent before dispatching work.
//!
//! # Architecture
//!
//! Applications are serialized as a single JSON value keyed by their id.
//! Versions are kept newest first; tasks are keyed by id so listings are
//! stable across snapshots.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod tasks;
pub mod types;
pub mod versions;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use tasks::TaskRegistry;
pub use types::*;
pub use versions::VersionStore;
