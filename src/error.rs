/// Unified error type for pat-auth.
///
/// Network and parse failures of the remote service never show up here; they are
/// reported as [`SoftFailure`] and collapsed to `false` at the public boundary.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // ── Preconditions (programmer error, never retried) ─────────────────
    #[error("Invalid target endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Invalid OAuth result: {0}")]
    InvalidOAuthResult(String),

    // ── Storage ─────────────────────────────────────────────────────────
    #[error("Database error: {0}")]
    Database(String),

    #[error("Crypto error: {0}")]
    CryptoError(String),

    #[error("Store error: {0}")]
    Store(String),

    // ── Internal ────────────────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// True for the fatal precondition variants: bad input from the caller that
    /// retrying cannot fix.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidEndpoint(_)
                | AuthError::InvalidCredential(_)
                | AuthError::InvalidOAuthResult(_)
        )
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("Database error: {e}");
        AuthError::Database(e.to_string())
    }
}

/// Why a validation probe or a PAT issuance did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SoftFailure {
    /// The service answered, but not with 200.
    #[error("rejected with HTTP {status}")]
    Rejected { status: u16 },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// 200 with a body that does not match the session token schema.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The issued token could not be persisted.
    #[error("storage error: {0}")]
    Storage(String),
}

impl SoftFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            SoftFailure::Rejected { .. } => "rejected",
            SoftFailure::Transport(_) => "transport",
            SoftFailure::MalformedResponse(_) => "malformed_response",
            SoftFailure::Storage(_) => "storage",
        }
    }
}
