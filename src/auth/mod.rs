//! Auth Module
//!
//! Credential validation and issuance of tenant-bound access credentials.

mod gateway;
mod password;

pub use gateway::{AccessCredential, AuthError, AuthGateway};
