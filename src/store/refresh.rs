//! Refresh token persistence.
//!
//! The OAuth refresh token is written straight to the persistent token store.
//! There is no cache tier for it: only the interactive collaborator reads it,
//! and rarely.

use super::TokenStore;
use crate::credentials::{OAuthResult, TargetEndpoint, Token, TokenKind};
use crate::error::AuthError;

/// Persist `oauth.refresh_token` for `endpoint`, replacing any previous one.
pub async fn store_refresh_token(
    store: &dyn TokenStore,
    endpoint: &TargetEndpoint,
    oauth: &OAuthResult,
) -> Result<Token, AuthError> {
    oauth.check()?;
    if oauth.refresh_token.trim().is_empty() {
        return Err(AuthError::InvalidOAuthResult("refresh token is empty".into()));
    }

    let token = Token::new(oauth.refresh_token.clone(), oauth.expires_on, TokenKind::Refresh);
    store.write(endpoint, &token).await?;
    Ok(token)
}
