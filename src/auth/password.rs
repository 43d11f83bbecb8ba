//! Password Digest Module
//!
//! Salted, iterated SHA-256 digests with constant-time verification.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of hashing rounds applied on top of the salted digest
const ROUNDS: u32 = 4096;

/// Salt length in bytes
const SALT_LEN: usize = 16;

// == Password Digest ==
/// Stored form of a password.
#[derive(Clone)]
pub struct PasswordDigest {
    salt: [u8; SALT_LEN],
    hash: [u8; 32],
}

impl PasswordDigest {
    // == Constructor ==
    /// Derives a digest for `password` under a fresh random salt.
    pub fn new(password: &str) -> Self {
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);
        Self::with_salt(password, salt)
    }

    fn with_salt(password: &str, salt: [u8; SALT_LEN]) -> Self {
        Self {
            salt,
            hash: derive(password.as_bytes(), &salt),
        }
    }

    // == Verify ==
    /// Checks `password` against the digest.
    ///
    /// Always runs the full derivation and compares every byte, so the
    /// time taken does not depend on where a mismatch occurs.
    pub fn verify(&self, password: &str) -> bool {
        let candidate = derive(password.as_bytes(), &self.salt);
        constant_time_eq(&candidate, &self.hash)
    }

    /// Hex rendering of `salt$hash`.
    #[cfg(test)]
    fn encoded(&self) -> String {
        format!("{}${}", hex::encode(self.salt), hex::encode(self.hash))
    }
}

impl std::fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordDigest(..)")
    }
}

fn derive(password: &[u8], salt: &[u8]) -> [u8; 32] {
    let mut out: [u8; 32] = Sha256::new()
        .chain_update(salt)
        .chain_update(password)
        .finalize()
        .into();

    for _ in 1..ROUNDS {
        out = Sha256::new()
            .chain_update(out)
            .chain_update(salt)
            .finalize()
            .into();
    }
    out
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
