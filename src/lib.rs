//! Tenant Stats - Tenant-scoped statistics aggregation service
//!
//! Authenticates sellers, pins every request to the seller's tenant, and
//! serves aggregate metrics over that tenant's records through a
//! cache-aside layer with single-flight computation.

pub mod aggregation;
pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod seed;
pub mod store;
pub mod tasks;
pub mod tenant;

pub use api::{create_router, AppState};
pub use config::Config;
pub use tasks::{spawn_cleanup_task, spawn_invalidation_listener};
