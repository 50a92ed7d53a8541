//! Store capabilities and their implementations.
//!
//! The authority talks to three persistent stores and one cache, all keyed by
//! [`TargetEndpoint`](crate::credentials::TargetEndpoint):
//! - PAT store: `CredentialStore` holding issued personal access tokens
//! - refresh-token store: `TokenStore` holding OAuth refresh tokens
//! - user-credential store: `CredentialStore` holding username/password pairs
//! - cache: `CredentialCache`, an in-process shadow of the PAT store
//!
//! `memory` backs all of them with hash maps (tests, ephemeral sessions);
//! `db` backs the persistent ones with encrypted SQLite rows.
//!
//! Every implementation refuses to hold an empty secret, so an existing entry
//! is always a usable one and `exists` never needs to open it.

pub mod db;
pub mod memory;
pub mod refresh;

use async_trait::async_trait;

use crate::credentials::{Credential, TargetEndpoint, Token};
use crate::error::AuthError;

pub use db::SecretDb;
pub use memory::{MemoryCredentialCache, MemoryCredentialStore, MemoryTokenStore};

/// Refuse to store a blank secret.
pub(crate) fn ensure_secret(secret: &str) -> Result<(), AuthError> {
    if secret.trim().is_empty() {
        return Err(AuthError::InvalidCredential(
            "refusing to store an empty secret".into(),
        ));
    }
    Ok(())
}

/// Keyed persistent storage for credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn read(&self, endpoint: &TargetEndpoint) -> Result<Option<Credential>, AuthError>;

    /// Insert or replace the credential for `endpoint`.
    async fn write(&self, endpoint: &TargetEndpoint, credential: &Credential)
        -> Result<(), AuthError>;

    /// Whether an entry exists for `endpoint`, without opening the secret.
    async fn exists(&self, endpoint: &TargetEndpoint) -> Result<bool, AuthError>;

    /// Returns whether an entry was removed. Deleting an absent key is `Ok(false)`.
    async fn delete(&self, endpoint: &TargetEndpoint) -> Result<bool, AuthError>;
}

/// Keyed persistent storage for tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn read(&self, endpoint: &TargetEndpoint) -> Result<Option<Token>, AuthError>;

    async fn write(&self, endpoint: &TargetEndpoint, token: &Token) -> Result<(), AuthError>;

    async fn exists(&self, endpoint: &TargetEndpoint) -> Result<bool, AuthError>;

    async fn delete(&self, endpoint: &TargetEndpoint) -> Result<bool, AuthError>;
}

/// In-memory credential cache. Never the source of truth: every entry must be
/// re-derivable from the PAT store, so evicting is always safe.
#[async_trait]
pub trait CredentialCache: Send + Sync {
    async fn read(&self, endpoint: &TargetEndpoint) -> Result<Option<Credential>, AuthError>;

    async fn write(&self, endpoint: &TargetEndpoint, credential: &Credential)
        -> Result<(), AuthError>;

    async fn evict(&self, endpoint: &TargetEndpoint) -> Result<bool, AuthError>;
}
