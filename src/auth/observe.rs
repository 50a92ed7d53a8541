//! Structured auth events and the observers that consume them.
//!
//! The authority never logs directly; it reports what happened to an injected
//! [`AuthObserver`]. Events carry endpoints, usernames and failure reasons but
//! never secret material.

use chrono::{DateTime, Utc};
use std::sync::Mutex;

use super::StoreTier;
use crate::credentials::TargetEndpoint;
use crate::error::SoftFailure;

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    // ── Resolution ──────────────────────────────────────────────────────
    CacheHit {
        endpoint: TargetEndpoint,
    },
    CachePromoted {
        endpoint: TargetEndpoint,
    },
    ResolveMiss {
        endpoint: TargetEndpoint,
    },
    CacheFailed {
        endpoint: TargetEndpoint,
        reason: String,
    },

    // ── Deletion ────────────────────────────────────────────────────────
    Deleted {
        endpoint: TargetEndpoint,
        tier: StoreTier,
    },
    DeleteNoop {
        endpoint: TargetEndpoint,
    },

    // ── Remote calls ────────────────────────────────────────────────────
    ValidationSucceeded {
        username: String,
    },
    ValidationFailed {
        username: String,
        failure: SoftFailure,
    },
    PatIssued {
        endpoint: TargetEndpoint,
    },
    PatIssueFailed {
        endpoint: TargetEndpoint,
        failure: SoftFailure,
    },

    // ── OAuth hand-off ──────────────────────────────────────────────────
    RefreshTokenStored {
        endpoint: TargetEndpoint,
        expires_on: DateTime<Utc>,
    },
    RefreshTokenNotStored {
        endpoint: TargetEndpoint,
        reason: String,
    },
    RefreshSucceeded {
        endpoint: TargetEndpoint,
        flow: String,
    },
    RefreshFailed {
        endpoint: TargetEndpoint,
        flow: String,
        reason: String,
    },
}

impl AuthEvent {
    /// Stable event name, matching the `event` field emitted by [`TracingObserver`].
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::CacheHit { .. } => "cache_hit",
            AuthEvent::CachePromoted { .. } => "cache_promoted",
            AuthEvent::ResolveMiss { .. } => "resolve_miss",
            AuthEvent::CacheFailed { .. } => "cache_failed",
            AuthEvent::Deleted { .. } => "deleted",
            AuthEvent::DeleteNoop { .. } => "delete_noop",
            AuthEvent::ValidationSucceeded { .. } => "validation_succeeded",
            AuthEvent::ValidationFailed { .. } => "validation_failed",
            AuthEvent::PatIssued { .. } => "pat_issued",
            AuthEvent::PatIssueFailed { .. } => "pat_issue_failed",
            AuthEvent::RefreshTokenStored { .. } => "refresh_token_stored",
            AuthEvent::RefreshTokenNotStored { .. } => "refresh_token_not_stored",
            AuthEvent::RefreshSucceeded { .. } => "refresh_succeeded",
            AuthEvent::RefreshFailed { .. } => "refresh_failed",
        }
    }
}

pub trait AuthObserver: Send + Sync {
    fn observe(&self, event: &AuthEvent);
}

/// Forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl AuthObserver for TracingObserver {
    fn observe(&self, event: &AuthEvent) {
        let name = event.name();
        match event {
            AuthEvent::CacheHit { endpoint }
            | AuthEvent::CachePromoted { endpoint }
            | AuthEvent::ResolveMiss { endpoint } => {
                tracing::debug!(event = name, endpoint = %endpoint, "credential resolution");
            }
            AuthEvent::CacheFailed { endpoint, reason } => {
                tracing::warn!(event = name, endpoint = %endpoint, reason = %reason, "credential cache unavailable");
            }
            AuthEvent::Deleted { endpoint, tier } => {
                tracing::info!(event = name, endpoint = %endpoint, tier = tier.as_str(), "credential deleted");
            }
            AuthEvent::DeleteNoop { endpoint } => {
                tracing::debug!(event = name, endpoint = %endpoint, "no stored credential to delete");
            }
            AuthEvent::ValidationSucceeded { username } => {
                tracing::debug!(event = name, username = %username, "credential accepted");
            }
            AuthEvent::ValidationFailed { username, failure } => {
                tracing::info!(
                    event = name,
                    username = %username,
                    failure = failure.kind(),
                    detail = %failure,
                    "credential validation failed"
                );
            }
            AuthEvent::PatIssued { endpoint } => {
                tracing::info!(event = name, endpoint = %endpoint, "personal access token issued");
            }
            AuthEvent::PatIssueFailed { endpoint, failure } => {
                tracing::warn!(
                    event = name,
                    endpoint = %endpoint,
                    failure = failure.kind(),
                    detail = %failure,
                    "personal access token issuance failed"
                );
            }
            AuthEvent::RefreshTokenStored {
                endpoint,
                expires_on,
            } => {
                tracing::debug!(event = name, endpoint = %endpoint, expires_on = %expires_on, "refresh token stored");
            }
            AuthEvent::RefreshTokenNotStored { endpoint, reason } => {
                tracing::warn!(event = name, endpoint = %endpoint, reason = %reason, "refresh token not stored");
            }
            AuthEvent::RefreshSucceeded { endpoint, flow } => {
                tracing::info!(event = name, endpoint = %endpoint, flow = %flow, "credentials refreshed");
            }
            AuthEvent::RefreshFailed {
                endpoint,
                flow,
                reason,
            } => {
                tracing::warn!(event = name, endpoint = %endpoint, flow = %flow, reason = %reason, "credential refresh failed");
            }
        }
    }
}

/// Keeps every event in memory. Handy for tests and for surfacing a session's
/// auth history in diagnostics.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<AuthEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuthEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(AuthEvent::name).collect()
    }
}

impl AuthObserver for RecordingObserver {
    fn observe(&self, event: &AuthEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
