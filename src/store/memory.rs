use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::{ensure_secret, CredentialCache, CredentialStore, TokenStore};
use crate::credentials::{Credential, TargetEndpoint, Token};
use crate::error::AuthError;

/// Hash map guarded by an async lock, with read/write counters.
struct Tier<V> {
    entries: RwLock<HashMap<TargetEndpoint, V>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl<V: Clone> Tier<V> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    async fn get(&self, endpoint: &TargetEndpoint) -> Option<V> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.entries.read().await.get(endpoint).cloned()
    }

    async fn put(&self, endpoint: &TargetEndpoint, value: V) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.entries.write().await.insert(endpoint.clone(), value);
    }

    async fn remove(&self, endpoint: &TargetEndpoint) -> bool {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.entries.write().await.remove(endpoint).is_some()
    }

    async fn contains(&self, endpoint: &TargetEndpoint) -> bool {
        self.entries.read().await.contains_key(endpoint)
    }

    /// Like `contains`, but counted as a read.
    async fn probe(&self, endpoint: &TargetEndpoint) -> bool {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.contains(endpoint).await
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

macro_rules! counters {
    ($ty:ty) => {
        impl $ty {
            /// Number of reads served so far.
            pub fn read_count(&self) -> usize {
                self.tier.reads.load(Ordering::Relaxed)
            }

            /// Number of writes and deletes applied so far.
            pub fn write_count(&self) -> usize {
                self.tier.writes.load(Ordering::Relaxed)
            }

            /// Peek without touching the counters.
            pub async fn contains(&self, endpoint: &TargetEndpoint) -> bool {
                self.tier.contains(endpoint).await
            }

            pub async fn len(&self) -> usize {
                self.tier.len().await
            }

            pub async fn is_empty(&self) -> bool {
                self.tier.len().await == 0
            }
        }
    };
}

/// Process-local credential store.
pub struct MemoryCredentialStore {
    tier: Tier<Credential>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self { tier: Tier::new() }
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

counters!(MemoryCredentialStore);

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn read(&self, endpoint: &TargetEndpoint) -> Result<Option<Credential>, AuthError> {
        Ok(self.tier.get(endpoint).await)
    }

    async fn write(
        &self,
        endpoint: &TargetEndpoint,
        credential: &Credential,
    ) -> Result<(), AuthError> {
        ensure_secret(&credential.secret)?;
        self.tier.put(endpoint, credential.clone()).await;
        Ok(())
    }

    async fn exists(&self, endpoint: &TargetEndpoint) -> Result<bool, AuthError> {
        Ok(self.tier.probe(endpoint).await)
    }

    async fn delete(&self, endpoint: &TargetEndpoint) -> Result<bool, AuthError> {
        Ok(self.tier.remove(endpoint).await)
    }
}

/// Process-local token store.
pub struct MemoryTokenStore {
    tier: Tier<Token>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self { tier: Tier::new() }
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

counters!(MemoryTokenStore);

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn read(&self, endpoint: &TargetEndpoint) -> Result<Option<Token>, AuthError> {
        Ok(self.tier.get(endpoint).await)
    }

    async fn write(&self, endpoint: &TargetEndpoint, token: &Token) -> Result<(), AuthError> {
        ensure_secret(&token.value)?;
        self.tier.put(endpoint, token.clone()).await;
        Ok(())
    }

    async fn exists(&self, endpoint: &TargetEndpoint) -> Result<bool, AuthError> {
        Ok(self.tier.probe(endpoint).await)
    }

    async fn delete(&self, endpoint: &TargetEndpoint) -> Result<bool, AuthError> {
        Ok(self.tier.remove(endpoint).await)
    }
}

/// The in-process credential cache.
pub struct MemoryCredentialCache {
    tier: Tier<Credential>,
}

impl MemoryCredentialCache {
    pub fn new() -> Self {
        Self { tier: Tier::new() }
    }
}

impl Default for MemoryCredentialCache {
    fn default() -> Self {
        Self::new()
    }
}

counters!(MemoryCredentialCache);

#[async_trait]
impl CredentialCache for MemoryCredentialCache {
    async fn read(&self, endpoint: &TargetEndpoint) -> Result<Option<Credential>, AuthError> {
        Ok(self.tier.get(endpoint).await)
    }

    async fn write(
        &self,
        endpoint: &TargetEndpoint,
        credential: &Credential,
    ) -> Result<(), AuthError> {
        ensure_secret(&credential.secret)?;
        self.tier.put(endpoint, credential.clone()).await;
        Ok(())
    }

    async fn evict(&self, endpoint: &TargetEndpoint) -> Result<bool, AuthError> {
        Ok(self.tier.remove(endpoint).await)
    }
}
