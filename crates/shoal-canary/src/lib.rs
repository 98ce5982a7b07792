//! Shoal canary engine: weighted canary releases and traffic shifting.
//!
//! This crate owns the rules for when structural changes and weight
//! changes are legal on an application, and the arithmetic that turns a
//! requested traffic fraction into per-task integer weights. It never
//! talks to the task executor: controllers return a [`Dispatch`] describing
//! the launches and retirements to carry out, and later fold the executor's
//! [`BatchReport`] back into the application.
//!
//! # Components
//!
//! - **`balancer`**: fraction → (new, old) weight pair
//! - **`gate`**: op-status admission and settlement
//! - **`lifecycle`**: create and remove an application
//! - **`canary`**: introduce a canary version next to the running one
//! - **`weights`**: rebalance traffic between the two live versions
//! - **`request`**: request bodies accepted by the controllers
//! - **`resume`**: rebuild the dispatch of an interrupted operation

pub mod balancer;
pub mod canary;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod lifecycle;
pub mod request;
pub mod resume;
pub mod weights;

pub use balancer::{Weights, compute_weight};
pub use dispatch::{BatchReport, Dispatch, TaskFailure};
pub use error::{CanaryError, CanaryResult};
pub use request::{CanaryUpdateRequest, CreateAppRequest, WeightUpdateRequest};
pub use resume::resume;

#[cfg(test)]
mod testing;
