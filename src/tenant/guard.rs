//! Tenant Isolation Guard
//!
//! Turns a validated access credential into the immutable [`TenantContext`]
//! that every downstream call is scoped by.

use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::auth::{AuthError, AuthGateway};
use crate::tenant::TenantId;

/// Header a client may use to name the tenant it expects to act on.
pub const TENANT_HEADER: &str = "x-tenant-id";

// == Access Error ==
/// Reasons a request cannot be scoped to a tenant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// Credential missing, unknown, revoked, or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Request referenced a tenant other than the credential's
    #[error("Forbidden: credential for tenant {credential} used against tenant {requested}")]
    Forbidden {
        credential: TenantId,
        requested: String,
    },
}

// == Tenant Context ==
/// Immutable tenant scope threaded through cache and aggregation calls.
///
/// Only [`TenantIsolationGuard::scope`] can build one outside this crate,
/// so every aggregation is tied to an authenticated tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

impl TenantContext {
    pub(crate) fn new(tenant_id: TenantId, user_id: Uuid, expires_at: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            user_id,
            expires_at,
        }
    }

    /// The tenant every query made with this context is restricted to.
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Expiry of the credential the context was derived from.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Builds a context directly, bypassing authentication. Test-only.
    #[cfg(test)]
    pub fn for_tests(tenant_id: &str) -> Self {
        Self::new(
            TenantId::parse(tenant_id).expect("valid test tenant id"),
            Uuid::nil(),
            Utc::now() + chrono::Duration::hours(1),
        )
    }
}

// == Scope Request ==
/// The tenant-relevant parts of an inbound request.
///
/// Any tenant named here is only compared against the credential; it is
/// never used to choose the scope.
#[derive(Debug, Clone, Default)]
pub struct ScopeRequest {
    /// Every tenant the client named, query parameter first, then each
    /// `X-Tenant-ID` header
    pub requested_tenants: Vec<String>,
    /// An `X-Tenant-ID` header was present but not valid text
    pub unreadable_header: bool,
}

impl ScopeRequest {
    /// Collects every tenant named by a `tenant_id` query parameter or an
    /// `X-Tenant-ID` header. Nothing is dropped when both are present.
    pub fn from_parts(headers: &HeaderMap, query_tenant: Option<&str>) -> Self {
        let mut request = Self::default();
        request
            .requested_tenants
            .extend(query_tenant.map(str::to_string));

        for value in headers.get_all(TENANT_HEADER) {
            match value.to_str() {
                Ok(tenant) => request.requested_tenants.push(tenant.to_string()),
                Err(_) => request.unreadable_header = true,
            }
        }
        request
    }

    /// First named tenant that is not `tenant_id`, if any.
    fn mismatch(&self, tenant_id: &TenantId) -> Option<String> {
        if self.unreadable_header {
            return Some(format!("<unreadable {} header>", TENANT_HEADER));
        }
        self.requested_tenants
            .iter()
            .find(|requested| TenantId::parse(requested).as_ref() != Some(tenant_id))
            .cloned()
    }
}

// == Tenant Isolation Guard ==
/// Validates credentials and enforces single-tenant scope per request.
#[derive(Clone)]
pub struct TenantIsolationGuard {
    gateway: Arc<AuthGateway>,
}

impl TenantIsolationGuard {
    pub fn new(gateway: Arc<AuthGateway>) -> Self {
        Self { gateway }
    }

    // == Scope ==
    /// Builds the tenant context for a request.
    ///
    /// The tenant always comes from the credential. A request that names a
    /// different tenant anywhere is rejected outright rather than re-scoped.
    pub fn scope(
        &self,
        request: &ScopeRequest,
        credential: Option<&str>,
    ) -> Result<TenantContext, AccessError> {
        let credential = self
            .gateway
            .validate(credential)
            .map_err(|e| match e {
                AuthError::MissingCredential => {
                    AccessError::Unauthorized("missing credential".to_string())
                }
                AuthError::ExpiredCredential => {
                    AccessError::Unauthorized("credential expired".to_string())
                }
                other => AccessError::Unauthorized(other.to_string()),
            })?;

        if let Some(requested) = request.mismatch(&credential.tenant_id) {
            warn!(
                target: "security",
                user_id = %credential.user_id,
                credential_tenant = %credential.tenant_id,
                requested_tenant = %requested,
                "Cross-tenant access attempt rejected"
            );
            return Err(AccessError::Forbidden {
                credential: credential.tenant_id,
                requested,
            });
        }

        Ok(TenantContext::new(
            credential.tenant_id,
            credential.user_id,
            credential.expires_at,
        ))
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
///
/// Returns `None` for a missing header or any other scheme.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
