//! Request and Response models for the statistics API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{LoginRequest, StatsQuery};
pub use responses::{
    CacheStatsResponse, DashboardStatsResponse, ErrorResponse, HealthResponse, LoginResponse,
    LogoutResponse, MetricReport,
};
