//! API Module
//!
//! HTTP handlers and routing for the statistics service REST API.
//!
//! # Endpoints
//! - `POST /auth/login` - Obtain a tenant-bound bearer credential
//! - `POST /auth/logout` - Revoke a credential
//! - `GET /dashboard/stats` - Tenant-scoped aggregate metrics
//! - `GET /cache/stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod extract;
pub mod handlers;
pub mod routes;

pub use extract::{ApiJson, ApiQuery};
pub use handlers::*;
pub use routes::create_router;
