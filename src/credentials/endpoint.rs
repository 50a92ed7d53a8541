use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::AuthError;

/// Validated identity of a remote service instance.
///
/// Every store is keyed by this value. It can only be built through
/// [`TargetEndpoint::parse`], so store operations never see a malformed key.
/// Two URIs that differ only in case of scheme/host, default port, query,
/// fragment or a trailing slash map to the same endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetEndpoint {
    identity: String,
}

impl TargetEndpoint {
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AuthError::InvalidEndpoint("endpoint is empty".into()));
        }

        let url = Url::parse(trimmed)
            .map_err(|e| AuthError::InvalidEndpoint(format!("{trimmed}: {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(AuthError::InvalidEndpoint(format!(
                    "unsupported scheme '{other}' in {trimmed}"
                )))
            }
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AuthError::InvalidEndpoint(format!("{trimmed}: missing host")))?;

        if !url.username().is_empty() || url.password().is_some() {
            return Err(AuthError::InvalidEndpoint(format!(
                "{host}: endpoint must not embed user information"
            )));
        }

        // Url already lower-cases scheme and host and drops the default port.
        let mut identity = format!("{}://{}", url.scheme(), host);
        if let Some(port) = url.port() {
            identity.push(':');
            identity.push_str(&port.to_string());
        }
        identity.push_str(url.path().trim_end_matches('/'));

        Ok(Self { identity })
    }

    pub fn as_str(&self) -> &str {
        &self.identity
    }
}

impl fmt::Display for TargetEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity)
    }
}

impl FromStr for TargetEndpoint {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
