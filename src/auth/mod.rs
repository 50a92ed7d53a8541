//! The credential authority: tiered resolution, deletion cascade, remote
//! validation and PAT issuance over a set of independently failing stores.
//!
//! Store layout and precedence:
//! - reads go cache first, then the persistent PAT store (promoting into the cache)
//! - deletes probe PAT store, refresh-token store, user-credential store in that
//!   order and clear only the first tier holding the endpoint
//! - issuance writes the PAT store before the cache
//!
//! A tier holds an endpoint when its store has an entry for it. Stores refuse
//! blank secrets, so resolve (which reads the entry) and delete (which only
//! asks `exists`) agree on what is held.
//!
//! A given endpoint is expected to live in exactly one persistent tier at a
//! time. That is not enforced here; when it is violated the probe order above
//! decides which tier a delete clears.

mod delete;
mod observe;
mod pat;
mod resolve;
mod verify;

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::config::Config;
use crate::credentials::{Credential, OAuthResult, TargetEndpoint};
use crate::error::AuthError;
use crate::oauth::OAuthFlow;
use crate::store::{
    self, CredentialCache, CredentialStore, MemoryCredentialCache, MemoryCredentialStore,
    MemoryTokenStore, SecretDb, TokenStore,
};

pub use observe::{AuthEvent, AuthObserver, RecordingObserver, TracingObserver};

pub const DEFAULT_SERVICE_URL: &str = "https://app.vssps.visualstudio.com";
const PROFILE_PATH: &str = "_apis/profile/profiles/me?api-version=1.0";
const SESSION_TOKEN_PATH: &str = "_apis/token/sessiontokens?api-version=1.0&tokentype=compact";

/// Which persistent tier a delete cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreTier {
    PersonalAccessToken,
    RefreshToken,
    UserCredential,
}

impl StoreTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreTier::PersonalAccessToken => "personal_access_token",
            StoreTier::RefreshToken => "refresh_token",
            StoreTier::UserCredential => "user_credential",
        }
    }
}

/// The two fixed endpoints of the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    pub profile_url: Url,
    pub session_token_url: Url,
}

impl ServiceEndpoints {
    pub fn from_base(base_url: &str) -> Result<Self, AuthError> {
        let base = base_url.trim().trim_end_matches('/');
        let join = |path: &str| {
            Url::parse(&format!("{base}/{path}"))
                .map_err(|e| AuthError::Config(format!("invalid service URL {base_url:?}: {e}")))
        };
        Ok(Self {
            profile_url: join(PROFILE_PATH)?,
            session_token_url: join(SESSION_TOKEN_PATH)?,
        })
    }
}

/// The stores an [`Authority`] operates on.
#[derive(Clone)]
pub struct AuthorityStores {
    pub pat: Arc<dyn CredentialStore>,
    pub refresh_tokens: Arc<dyn TokenStore>,
    pub user_credentials: Arc<dyn CredentialStore>,
    pub cache: Arc<dyn CredentialCache>,
}

impl AuthorityStores {
    /// Everything in process memory; nothing survives the process.
    pub fn in_memory() -> Self {
        Self {
            pat: Arc::new(MemoryCredentialStore::new()),
            refresh_tokens: Arc::new(MemoryTokenStore::new()),
            user_credentials: Arc::new(MemoryCredentialStore::new()),
            cache: Arc::new(MemoryCredentialCache::new()),
        }
    }

    /// Persistent tiers from `db`, fronted by a fresh in-memory cache.
    pub fn from_db(db: &SecretDb) -> Self {
        Self {
            pat: Arc::new(db.pat_store()),
            refresh_tokens: Arc::new(db.refresh_token_store()),
            user_credentials: Arc::new(db.user_credential_store()),
            cache: Arc::new(MemoryCredentialCache::new()),
        }
    }
}

pub struct Authority {
    pat_store: Arc<dyn CredentialStore>,
    refresh_store: Arc<dyn TokenStore>,
    user_store: Arc<dyn CredentialStore>,
    cache: Arc<dyn CredentialCache>,
    endpoints: ServiceEndpoints,
    http: reqwest::Client,
    observer: Arc<dyn AuthObserver>,
}

impl Authority {
    pub fn new(stores: AuthorityStores, endpoints: ServiceEndpoints) -> Self {
        Self {
            pat_store: stores.pat,
            refresh_store: stores.refresh_tokens,
            user_store: stores.user_credentials,
            cache: stores.cache,
            endpoints,
            http: reqwest::Client::new(),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Build with the service URL and HTTP timeout from `config`.
    pub fn from_config(config: &Config, stores: AuthorityStores) -> Result<Self, AuthError> {
        let endpoints = ServiceEndpoints::from_base(&config.service_url)?;
        let http = build_http_client(config.http_timeout)?;
        Ok(Self::new(stores, endpoints).with_http_client(http))
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn AuthObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Persist the OAuth refresh token for `endpoint` (no cache tier).
    pub async fn store_refresh_token(
        &self,
        endpoint: &TargetEndpoint,
        oauth: &OAuthResult,
    ) -> Result<(), AuthError> {
        let token =
            store::refresh::store_refresh_token(self.refresh_store.as_ref(), endpoint, oauth)
                .await?;
        self.emit(AuthEvent::RefreshTokenStored {
            endpoint: endpoint.clone(),
            expires_on: token.expires_at,
        });
        Ok(())
    }

    /// Run `flow`, then persist what it produced: the refresh token (when the
    /// flow returned one) and a freshly issued PAT.
    ///
    /// Returns `true` once a PAT is stored. Every failure, including bad output
    /// from the flow, is reported to the observer and returns `false`.
    pub async fn refresh(&self, endpoint: &TargetEndpoint, flow: &dyn OAuthFlow) -> bool {
        let fail = |reason: String| {
            self.emit(AuthEvent::RefreshFailed {
                endpoint: endpoint.clone(),
                flow: flow.id().to_string(),
                reason,
            });
            false
        };

        let oauth = match flow.authenticate(endpoint).await {
            Ok(oauth) => oauth,
            Err(e) => return fail(e.to_string()),
        };

        if !oauth.refresh_token.trim().is_empty() {
            // The PAT is what callers need; a lost refresh token only costs a
            // later interactive sign-in.
            if let Err(e) = self.store_refresh_token(endpoint, &oauth).await {
                self.emit(AuthEvent::RefreshTokenNotStored {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                });
            }
        }

        match self.try_issue_pat(endpoint, &oauth).await {
            Ok(Ok(_)) => {
                self.emit(AuthEvent::RefreshSucceeded {
                    endpoint: endpoint.clone(),
                    flow: flow.id().to_string(),
                });
                true
            }
            Ok(Err(failure)) => fail(failure.to_string()),
            Err(e) => fail(e.to_string()),
        }
    }

    /// Resolve a credential for `endpoint`, refreshing through `flow` when none
    /// is stored or the stored one is rejected by the service.
    pub async fn acquire(
        &self,
        endpoint: &TargetEndpoint,
        flow: &dyn OAuthFlow,
    ) -> Result<Option<Credential>, AuthError> {
        if let Some(credential) = self.resolve(endpoint).await? {
            if self.validate(&credential).await? {
                return Ok(Some(credential));
            }
        }

        if !self.refresh(endpoint, flow).await {
            return Ok(None);
        }
        self.resolve(endpoint).await
    }

    fn emit(&self, event: AuthEvent) {
        self.observer.observe(&event);
    }
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client, AuthError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("pat-auth/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AuthError::Internal(format!("failed to build HTTP client: {e}")))
}
