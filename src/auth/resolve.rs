use super::{AuthEvent, Authority};
use crate::credentials::{Credential, TargetEndpoint};
use crate::error::AuthError;

impl Authority {
    /// Look up the credential for `endpoint`: cache first, then the PAT store.
    ///
    /// A PAT store hit is written through into the cache before it is returned.
    /// Never touches the network. A cache that fails is skipped, not fatal.
    pub async fn resolve(&self, endpoint: &TargetEndpoint) -> Result<Option<Credential>, AuthError> {
        match self.cache.read(endpoint).await {
            Ok(Some(credential)) => {
                self.emit(AuthEvent::CacheHit {
                    endpoint: endpoint.clone(),
                });
                return Ok(Some(credential));
            }
            Ok(None) => {}
            Err(e) => self.emit(AuthEvent::CacheFailed {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            }),
        }

        let credential = match self.pat_store.read(endpoint).await? {
            Some(credential) => credential,
            None => {
                self.emit(AuthEvent::ResolveMiss {
                    endpoint: endpoint.clone(),
                });
                return Ok(None);
            }
        };

        match self.cache.write(endpoint, &credential).await {
            Ok(()) => self.emit(AuthEvent::CachePromoted {
                endpoint: endpoint.clone(),
            }),
            Err(e) => self.emit(AuthEvent::CacheFailed {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            }),
        }
        Ok(Some(credential))
    }
}
