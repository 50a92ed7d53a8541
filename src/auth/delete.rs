use super::{AuthEvent, Authority, StoreTier};
use crate::credentials::TargetEndpoint;
use crate::error::AuthError;

impl Authority {
    /// Logout: clear `endpoint` from the first persistent tier that holds it.
    ///
    /// Probe order is PAT store, refresh-token store, user-credential store.
    /// Later tiers are left alone once one matches. A PAT match also evicts the
    /// cache entry, before the store delete, so a failure in between never
    /// leaves a cached value with no persistent source. Tiers are probed with
    /// `exists`, so entries that can no longer be opened are still cleared.
    /// Returns the tier that was cleared, or `None` when no tier held the endpoint.
    pub async fn delete(&self, endpoint: &TargetEndpoint) -> Result<Option<StoreTier>, AuthError> {
        let tier = if self.pat_store.exists(endpoint).await? {
            self.cache.evict(endpoint).await?;
            self.pat_store.delete(endpoint).await?;
            StoreTier::PersonalAccessToken
        } else if self.refresh_store.exists(endpoint).await? {
            self.refresh_store.delete(endpoint).await?;
            StoreTier::RefreshToken
        } else if self.user_store.exists(endpoint).await? {
            self.user_store.delete(endpoint).await?;
            StoreTier::UserCredential
        } else {
            self.emit(AuthEvent::DeleteNoop {
                endpoint: endpoint.clone(),
            });
            return Ok(None);
        };

        self.emit(AuthEvent::Deleted {
            endpoint: endpoint.clone(),
            tier,
        });
        Ok(Some(tier))
    }
}
