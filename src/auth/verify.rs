use reqwest::StatusCode;

use super::{AuthEvent, Authority};
use crate::credentials::Credential;
use crate::error::{AuthError, SoftFailure};

impl Authority {
    /// Ask the profile endpoint whether `credential` is currently accepted.
    ///
    /// `Err` only for a malformed credential. Anything the service or the
    /// network does wrong ends up as `Ok(false)`.
    pub async fn validate(&self, credential: &Credential) -> Result<bool, AuthError> {
        Ok(self.probe(credential).await?.is_ok())
    }

    /// Like [`Authority::validate`], keeping the reason for a rejection.
    pub async fn probe(&self, credential: &Credential) -> Result<Result<(), SoftFailure>, AuthError> {
        credential.check()?;

        let outcome = match self
            .http
            .get(self.endpoints.profile_url.clone())
            .basic_auth(&credential.username, Some(&credential.secret))
            .send()
            .await
        {
            Ok(resp) if resp.status() == StatusCode::OK => Ok(()),
            Ok(resp) => Err(SoftFailure::Rejected {
                status: resp.status().as_u16(),
            }),
            Err(e) => Err(SoftFailure::Transport(e.to_string())),
        };

        match &outcome {
            Ok(()) => self.emit(AuthEvent::ValidationSucceeded {
                username: credential.username.clone(),
            }),
            Err(failure) => self.emit(AuthEvent::ValidationFailed {
                username: credential.username.clone(),
                failure: failure.clone(),
            }),
        }
        Ok(outcome)
    }
}
