//! Tenant Module
//!
//! Tenant identifiers and the isolation guard that scopes each request to
//! exactly one tenant.

mod guard;
mod id;

pub use guard::{
    bearer_token, AccessError, ScopeRequest, TenantContext, TenantIsolationGuard, TENANT_HEADER,
};
pub use id::{TenantId, MAX_TENANT_ID_LENGTH};
