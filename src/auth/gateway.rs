//! Auth Gateway
//!
//! Authenticates email/password pairs against tenant-bound identities and
//! issues short-lived bearer credentials.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::RngCore;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::password::PasswordDigest;
use crate::tenant::TenantId;

// == Auth Error ==
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Email unknown or password wrong; the two are never distinguished
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("No credential supplied")]
    MissingCredential,

    /// Token never issued, or revoked
    #[error("Unknown credential")]
    UnknownCredential,

    #[error("Credential expired")]
    ExpiredCredential,
}

// == Access Credential ==
/// Tenant-bound bearer credential issued at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCredential {
    /// Opaque bearer token (64 hex chars)
    pub token: String,
    pub user_id: Uuid,
    /// The single tenant this credential grants access to
    pub tenant_id: TenantId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessCredential {
    /// A credential is expired once `now` reaches `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone)]
struct Identity {
    user_id: Uuid,
    tenant_id: TenantId,
    digest: PasswordDigest,
}

// == Auth Gateway ==
/// Identity directory plus the table of live credentials.
#[derive(Debug)]
pub struct AuthGateway {
    /// Identities keyed by normalized email
    identities: RwLock<HashMap<String, Identity>>,
    /// Live credentials keyed by token
    sessions: RwLock<HashMap<String, AccessCredential>>,
    credential_ttl: Duration,
    /// Verified against when the email is unknown
    decoy: PasswordDigest,
}

impl AuthGateway {
    // == Constructor ==
    /// Creates an empty gateway issuing credentials valid for `credential_ttl`.
    pub fn new(credential_ttl: Duration) -> Self {
        Self {
            identities: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            credential_ttl,
            decoy: PasswordDigest::new("decoy-password"),
        }
    }

    // == Register ==
    /// Adds (or replaces) an identity bound to `tenant_id`.
    ///
    /// Returns the identity's user id.
    pub fn register(&self, email: &str, password: &str, tenant_id: TenantId) -> Uuid {
        let user_id = Uuid::new_v4();
        let identity = Identity {
            user_id,
            tenant_id: tenant_id.clone(),
            digest: PasswordDigest::new(password),
        };
        self.identities
            .write()
            .insert(normalize_email(email), identity);

        debug!(%user_id, %tenant_id, "Identity registered");
        user_id
    }

    // == Authenticate ==
    /// Validates an email/password pair and issues a credential.
    ///
    /// Unknown emails are checked against a decoy digest so both failure
    /// paths do the same work and return the same error.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<AccessCredential, AuthError> {
        let identity = self.identities.read().get(&normalize_email(email)).cloned();

        let verified = match &identity {
            Some(identity) => identity.digest.verify(password),
            None => {
                let _ = self.decoy.verify(password);
                false
            }
        };

        let identity = match identity {
            Some(identity) if verified => identity,
            _ => {
                info!(target: "audit", outcome = "failure", "Login attempt rejected");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let issued_at = Utc::now();
        let ttl = chrono::Duration::from_std(self.credential_ttl)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let credential = AccessCredential {
            token: generate_token(),
            user_id: identity.user_id,
            tenant_id: identity.tenant_id,
            issued_at,
            expires_at: issued_at + ttl,
        };

        self.sessions
            .write()
            .insert(credential.token.clone(), credential.clone());

        info!(
            target: "audit",
            outcome = "success",
            user_id = %credential.user_id,
            tenant_id = %credential.tenant_id,
            "Login succeeded"
        );
        Ok(credential)
    }

    // == Validate ==
    /// Resolves a bearer token to its live credential.
    ///
    /// Expired credentials are dropped from the session table when seen.
    pub fn validate(&self, token: Option<&str>) -> Result<AccessCredential, AuthError> {
        let token = token.ok_or(AuthError::MissingCredential)?;

        let credential = self
            .sessions
            .read()
            .get(token)
            .cloned()
            .ok_or(AuthError::UnknownCredential)?;

        if credential.is_expired_at(Utc::now()) {
            self.sessions.write().remove(token);
            return Err(AuthError::ExpiredCredential);
        }

        Ok(credential)
    }

    // == Revoke ==
    /// Destroys a credential. Returns false if the token was not live.
    pub fn revoke(&self, token: &str) -> bool {
        let removed = self.sessions.write().remove(token);
        if let Some(credential) = &removed {
            info!(
                target: "audit",
                user_id = %credential.user_id,
                tenant_id = %credential.tenant_id,
                "Credential revoked"
            );
        }
        removed.is_some()
    }

    // == Purge Expired ==
    /// Removes every expired credential, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, credential| !credential.is_expired_at(now));
        before - sessions.len()
    }

    /// Number of live (not yet purged) credentials.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
