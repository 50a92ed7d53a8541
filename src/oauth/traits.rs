use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::credentials::{OAuthResult, TargetEndpoint};
use crate::error::AuthError;

/// Raw tokens returned by an OAuth token endpoint after code exchange or refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

/// The interactive (or silent) OAuth sign-in that produces an [`OAuthResult`].
///
/// Implementations own the browser/device-code dance; this crate only calls
/// them when no usable credential exists for an endpoint and persists what
/// they return.
#[async_trait]
pub trait OAuthFlow: Send + Sync {
    /// Short identifier used in logs (e.g. "device-code", "broker").
    fn id(&self) -> &str;

    /// Authenticate the user against `endpoint`.
    async fn authenticate(&self, endpoint: &TargetEndpoint) -> Result<OAuthResult, AuthError>;
}
