//! Client core for the TaskPlex file-processing service.
//!
//! [`mutation::Mutation`] wraps single-shot endpoints, [`tracker::Tracker`]
//! follows long-running server tasks through their progress stream. Both
//! publish their state to any number of subscribers.

pub mod api;
pub mod cancel;
pub mod config;
pub mod mutation;
pub mod store;
pub mod tracker;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use mutation::{Mutation, MutationError, MutationStatus};
pub use tracker::{TaskProgress, TaskStatus, Tracker};
