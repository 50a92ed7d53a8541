pub mod auth;
pub mod config;
pub mod credentials;
pub mod crypto;
pub mod error;
pub mod oauth;
pub mod store;

pub use auth::{AuthEvent, AuthObserver, Authority, AuthorityStores, ServiceEndpoints, StoreTier};
pub use config::Config;
pub use credentials::{Credential, OAuthResult, TargetEndpoint, Token, TokenKind};
pub use error::{AuthError, SoftFailure};
pub use oauth::{OAuthFlow, TokenSet};
