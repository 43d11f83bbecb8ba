//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of the server.
//!
//! # Tasks
//! - Cleanup: Purges cache entries past their stale grace period and
//!   expired credentials at configured intervals
//! - Invalidation: Applies record store write events to the cache

mod cleanup;
mod invalidation;

pub use cleanup::spawn_cleanup_task;
pub use invalidation::spawn_invalidation_listener;
