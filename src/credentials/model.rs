use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AuthError;
use crate::oauth::TokenSet;

/// A username/secret pair used for HTTP Basic authentication.
///
/// PATs are stored as credentials with an empty username.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub secret: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// A PAT credential: the secret alone, no username.
    pub fn personal_access_token(token: impl Into<String>) -> Self {
        Self::new(String::new(), token)
    }

    /// Whether this value counts as a stored credential at all.
    pub fn is_present(&self) -> bool {
        !self.secret.trim().is_empty()
    }

    /// Structural check required before the credential is sent anywhere.
    pub fn check(&self) -> Result<(), AuthError> {
        if !self.is_present() {
            return Err(AuthError::InvalidCredential("secret is empty".into()));
        }
        if self.username.contains(':') {
            return Err(AuthError::InvalidCredential(
                "username must not contain ':'".into(),
            ));
        }
        Ok(())
    }

    fn masked_secret(&self) -> String {
        let secret = &self.secret;
        if secret.chars().count() <= 8 {
            "***".to_string()
        } else {
            let prefix: String = secret.chars().take(4).collect();
            let suffix: String = secret
                .chars()
                .rev()
                .take(4)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            format!("{prefix}****{suffix}")
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &self.masked_secret())
            .finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.username, self.masked_secret())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Personal,
    Refresh,
    Access,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Personal => "personal",
            TokenKind::Refresh => "refresh",
            TokenKind::Access => "access",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "personal" => Some(TokenKind::Personal),
            "refresh" => Some(TokenKind::Refresh),
            "access" => Some(TokenKind::Access),
            _ => None,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub kind: TokenKind,
}

impl Token {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>, kind: TokenKind) -> Self {
        Self {
            value: value.into(),
            expires_at,
            kind,
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Output of the interactive OAuth collaborator, consumed read-only.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthResult {
    pub access_token: String,
    pub access_token_type: String,
    pub refresh_token: String,
    pub expires_on: DateTime<Utc>,
}

impl OAuthResult {
    /// Build from a raw token-endpoint response received at `now`.
    ///
    /// A response without `expires_in` is treated as expiring immediately, so the
    /// refresh token is kept but never assumed to outlive the access token.
    pub fn from_token_set(set: TokenSet, now: DateTime<Utc>) -> Self {
        let lifetime = set
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .map(Duration::seconds)
            .unwrap_or_else(Duration::zero);
        Self {
            access_token: set.access_token,
            access_token_type: set.token_type,
            refresh_token: set.refresh_token.unwrap_or_default(),
            expires_on: now + lifetime,
        }
    }

    /// Preconditions for exchanging the access token.
    pub fn check(&self) -> Result<(), AuthError> {
        if self.access_token.trim().is_empty() {
            return Err(AuthError::InvalidOAuthResult("access token is empty".into()));
        }
        if self.access_token_type.trim().is_empty() {
            return Err(AuthError::InvalidOAuthResult(
                "access token type is empty".into(),
            ));
        }
        Ok(())
    }

    /// The `Authorization` header value, e.g. `Bearer eyJ...`.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.access_token_type.trim(), self.access_token.trim())
    }
}

impl fmt::Debug for OAuthResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthResult")
            .field("access_token", &"[REDACTED]")
            .field("access_token_type", &self.access_token_type)
            .field("refresh_token", &"[REDACTED]")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_check() {
        assert!(Credential::new("alice", "s3cret").check().is_ok());
        assert!(Credential::personal_access_token("abc123").check().is_ok());
        assert!(Credential::new("alice", "  ").check().is_err());
        assert!(Credential::new("al:ice", "s3cret").check().is_err());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let cred = Credential::new("alice", "abcdefghijklmnop");
        let rendered = format!("{cred:?} {cred}");
        assert!(!rendered.contains("abcdefghijklmnop"));
        assert!(rendered.contains("abcd****mnop"));
        assert_eq!(Credential::new("bob", "short").masked_secret(), "***");
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = Token::new("rt-secret", Utc::now() + Duration::hours(1), TokenKind::Refresh);
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("rt-secret"));
        assert!(rendered.contains("Refresh"));
    }

    #[test]
    fn test_token_kind_roundtrips_through_str() {
        for kind in [TokenKind::Personal, TokenKind::Refresh, TokenKind::Access] {
            assert_eq!(TokenKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TokenKind::parse("bogus"), None);
    }

    #[test]
    fn test_oauth_result_from_token_set() {
        let now = Utc::now();
        let result = OAuthResult::from_token_set(
            TokenSet {
                access_token: "at".into(),
                refresh_token: Some("rt".into()),
                token_type: "Bearer".into(),
                expires_in: Some(3600),
                scope: None,
            },
            now,
        );
        assert_eq!(result.expires_on, now + Duration::seconds(3600));
        assert_eq!(result.refresh_token, "rt");
        assert_eq!(result.authorization_header(), "Bearer at");
        assert!(result.check().is_ok());
    }

    #[test]
    fn test_oauth_result_check() {
        let mut result = OAuthResult {
            access_token: "at".into(),
            access_token_type: "Bearer".into(),
            refresh_token: String::new(),
            expires_on: Utc::now(),
        };
        assert!(result.check().is_ok());
        result.access_token_type = String::new();
        assert!(matches!(
            result.check(),
            Err(AuthError::InvalidOAuthResult(_))
        ));
    }
}
