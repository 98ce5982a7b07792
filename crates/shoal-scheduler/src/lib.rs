//! shoal-scheduler: hosts applications and serializes operations on them.
//!
//! Sits between the request surface and the canary engine. The scheduler:
//!
//! - Keeps every application in an arena keyed by id
//! - Allows one operation per application at a time; others get `StateConflict`
//! - Snapshots each accepted mutation to the state store
//! - Dispatches launches and retirements to a [`TaskExecutor`]
//! - Settles applications once the executor reports back
//!
//! # Architecture
//!
//! ```text
//! Scheduler
//!   ├── StateStore (application snapshots)
//!   ├── TaskExecutor (launch / retire tasks)
//!   └── Per-application slot
//!       ├── op lock (held across the executor round trip)
//!       └── Application (read by queries, written on plan and settle)
//! ```

pub mod error;
pub mod executor;
pub mod scheduler;
pub mod wait;

pub use error::{SchedulerError, SchedulerResult};
pub use executor::{LocalExecutor, LocalExecutorConfig, TaskExecutor, TaskOutcome};
pub use scheduler::Scheduler;
pub use wait::{wait_for_removal, wait_for_status};
