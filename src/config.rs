use anyhow::{Context, Result};
use std::fmt;
use std::time::Duration;

use crate::auth::DEFAULT_SERVICE_URL;
use crate::credentials::TargetEndpoint;

/// Application configuration, loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    // ── Remote service ──────────────────────────────────────────────────
    /// Base URL of the profile and session token endpoints.
    pub service_url: String,
    pub http_timeout: Duration,
    /// Endpoint the binary operates on.
    pub target_url: Option<String>,

    // ── Database (SQLite) ───────────────────────────────────────────────
    pub database_url: String,

    // ── Crypto ──────────────────────────────────────────────────────────
    /// 32-byte base64-encoded master key for AES-256-GCM encryption.
    pub master_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let http_timeout_secs: u64 = var("HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".into())
            .parse()
            .context("Invalid HTTP_TIMEOUT_SECS")?;

        Ok(Config {
            service_url: var("SERVICE_URL").unwrap_or_else(|| DEFAULT_SERVICE_URL.into()),
            http_timeout: Duration::from_secs(http_timeout_secs),
            target_url: var("TARGET_URL").filter(|v| !v.trim().is_empty()),

            database_url: var("DATABASE_URL").unwrap_or_else(|| "sqlite://pat-auth.db".into()),
            master_key: var("MASTER_KEY").context("MASTER_KEY is required (32 bytes, base64)")?,
        })
    }

    /// The configured `TARGET_URL`, validated.
    pub fn target(&self) -> Result<TargetEndpoint> {
        let raw = self
            .target_url
            .as_deref()
            .context("TARGET_URL is required for this command")?;
        TargetEndpoint::parse(raw).context("Invalid TARGET_URL")
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("service_url", &self.service_url)
            .field("http_timeout", &self.http_timeout)
            .field("target_url", &self.target_url)
            .field("database_url", &self.database_url)
            .field("master_key", &"[REDACTED]")
            .finish()
    }
}
