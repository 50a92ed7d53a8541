//! Exchange of an OAuth access token for a compact personal access token.

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;

use super::{AuthEvent, Authority};
use crate::credentials::{Credential, OAuthResult, TargetEndpoint};
use crate::error::{AuthError, SoftFailure};

/// Body of a successful session token response. Other fields are ignored.
#[derive(Debug, Deserialize)]
struct SessionTokenResponse {
    token: String,
}

/// Pull the `token` string out of a session token response body.
pub(crate) fn parse_session_token(body: &str) -> Result<String, SoftFailure> {
    let parsed: SessionTokenResponse = serde_json::from_str(body)
        .map_err(|e| SoftFailure::MalformedResponse(e.to_string()))?;
    let token = parsed.token.trim();
    if token.is_empty() {
        return Err(SoftFailure::MalformedResponse("token is empty".into()));
    }
    Ok(token.to_string())
}

impl Authority {
    /// Issue a PAT for `endpoint` and persist it. `Ok(true)` once both the PAT
    /// store and the cache hold it.
    pub async fn issue_pat(
        &self,
        endpoint: &TargetEndpoint,
        oauth: &OAuthResult,
    ) -> Result<bool, AuthError> {
        Ok(self.try_issue_pat(endpoint, oauth).await?.is_ok())
    }

    /// Issue a PAT, keeping the reason on failure.
    ///
    /// Nothing is written unless the service returned a usable token. The PAT
    /// store is written before the cache; if the store write fails the cache is
    /// left alone, and a failed cache write is reported but does not fail the
    /// issuance since the next resolve promotes from the store.
    pub async fn try_issue_pat(
        &self,
        endpoint: &TargetEndpoint,
        oauth: &OAuthResult,
    ) -> Result<Result<Credential, SoftFailure>, AuthError> {
        oauth.check()?;

        let outcome = match self.request_session_token(oauth).await {
            Ok(token) => self.persist_pat(endpoint, token).await,
            Err(failure) => Err(failure),
        };

        match &outcome {
            Ok(_) => self.emit(AuthEvent::PatIssued {
                endpoint: endpoint.clone(),
            }),
            Err(failure) => self.emit(AuthEvent::PatIssueFailed {
                endpoint: endpoint.clone(),
                failure: failure.clone(),
            }),
        }
        Ok(outcome)
    }

    async fn request_session_token(&self, oauth: &OAuthResult) -> Result<String, SoftFailure> {
        let resp = self
            .http
            .post(self.endpoints.session_token_url.clone())
            .header(AUTHORIZATION, oauth.authorization_header())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .body("")
            .send()
            .await
            .map_err(|e| SoftFailure::Transport(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(SoftFailure::Rejected {
                status: status.as_u16(),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| SoftFailure::Transport(e.to_string()))?;
        parse_session_token(&body)
    }

    async fn persist_pat(
        &self,
        endpoint: &TargetEndpoint,
        token: String,
    ) -> Result<Credential, SoftFailure> {
        let credential = Credential::personal_access_token(token);

        self.pat_store
            .write(endpoint, &credential)
            .await
            .map_err(|e| SoftFailure::Storage(e.to_string()))?;

        if let Err(e) = self.cache.write(endpoint, &credential).await {
            self.emit(AuthEvent::CacheFailed {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            });
        }
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{AuthorityStores, ServiceEndpoints};
    use super::*;
    use crate::store::CredentialStore;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    fn session_mock<'a>(server: &'a MockServer, status: u16, body: &str) -> httpmock::Mock<'a> {
        server.mock(|when, then| {
            when.method(POST)
                .path("/_apis/token/sessiontokens")
                .query_param("api-version", "1.0")
                .query_param("tokentype", "compact")
                .header("authorization", "Bearer aad-access-token")
                .header("content-type", "application/json")
                .body("");
            then.status(status)
                .header("content-type", "application/json")
                .body(body);
        })
    }

    #[test]
    fn test_parse_session_token() {
        assert_eq!(
            parse_session_token(r#"{"token":"abc123","scope":"vso.code"}"#).unwrap(),
            "abc123"
        );
        assert_eq!(
            parse_session_token("{ \"token\" : \"  abc123 \" }").unwrap(),
            "abc123"
        );

        for body in [
            r#"{"displayName":"git"}"#,
            r#"{"token":""}"#,
            r#"{"token":{"value":"abc123"}}"#,
            r#"{"token":["abc123"]}"#,
            r#"{"Token":"abc123"}"#,
            r#"[{"token":"abc123"}]"#,
            "token: abc123",
        ] {
            assert!(
                matches!(
                    parse_session_token(body),
                    Err(SoftFailure::MalformedResponse(_))
                ),
                "{body} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_issue_persists_store_and_cache() {
        let server = MockServer::start();
        let mock = session_mock(&server, 200, r#"{"token":"abc123"}"#);

        let harness = Harness::new();
        let authority = harness.authority(&server.base_url());
        let ep = endpoint();

        assert!(authority.issue_pat(&ep, &oauth_result()).await.unwrap());
        mock.assert();

        let stored = harness.pat.read(&ep).await.unwrap().unwrap();
        assert_eq!(stored.secret, "abc123");
        assert!(stored.username.is_empty());
        assert!(harness.cache.contains(&ep).await);
        assert_eq!(harness.observer.names(), vec!["pat_issued"]);
    }

    #[tokio::test]
    async fn test_request_body_is_empty() {
        let server = MockServer::start();
        let braces = server.mock(|when, then| {
            when.method(POST)
                .path("/_apis/token/sessiontokens")
                .body("{}");
            then.status(200).json_body(json!({ "token": "wrong" }));
        });
        let empty = session_mock(&server, 200, r#"{"token":"abc123"}"#);

        let authority = Harness::new().authority(&server.base_url());
        let credential = authority
            .try_issue_pat(&endpoint(), &oauth_result())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(credential.secret, "abc123");
        empty.assert();
        braces.assert_calls(0);
    }

    #[tokio::test]
    async fn test_non_200_writes_nothing() {
        let server = MockServer::start();
        session_mock(&server, 401, r#"{"token":"abc123"}"#);

        let harness = Harness::new();
        let authority = harness.authority(&server.base_url());

        let outcome = authority
            .try_issue_pat(&endpoint(), &oauth_result())
            .await
            .unwrap();
        assert_eq!(outcome, Err(SoftFailure::Rejected { status: 401 }));
        assert_eq!(harness.pat.write_count(), 0);
        assert_eq!(harness.cache.write_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_body_writes_nothing() {
        for body in [r#"{"message":"ok"}"#, r#"{"token":{"token":"abc123"}}"#] {
            let server = MockServer::start();
            session_mock(&server, 200, body);

            let harness = Harness::new();
            let authority = harness.authority(&server.base_url());

            assert!(!authority
                .issue_pat(&endpoint(), &oauth_result())
                .await
                .unwrap());
            assert_eq!(harness.pat.write_count(), 0);
            assert_eq!(harness.cache.write_count(), 0);
            assert!(matches!(
                harness.observer.events().as_slice(),
                [AuthEvent::PatIssueFailed {
                    failure: SoftFailure::MalformedResponse(_),
                    ..
                }]
            ));
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_false() {
        let harness = Harness::new();
        let authority = harness.authority("http://127.0.0.1:9");

        let outcome = authority
            .try_issue_pat(&endpoint(), &oauth_result())
            .await
            .unwrap();
        assert!(matches!(outcome, Err(SoftFailure::Transport(_))));
        assert!(harness.pat.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_failure_skips_cache() {
        let server = MockServer::start();
        session_mock(&server, 200, r#"{"token":"abc123"}"#);

        let harness = Harness::new();
        let stores = AuthorityStores {
            pat: Arc::new(BrokenStore),
            refresh_tokens: harness.refresh_tokens.clone(),
            user_credentials: harness.user_credentials.clone(),
            cache: harness.cache.clone(),
        };
        let authority =
            Authority::new(stores, ServiceEndpoints::from_base(&server.base_url()).unwrap());

        let outcome = authority
            .try_issue_pat(&endpoint(), &oauth_result())
            .await
            .unwrap();
        assert!(matches!(outcome, Err(SoftFailure::Storage(_))));
        assert_eq!(harness.cache.write_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_failure_still_succeeds() {
        let server = MockServer::start();
        session_mock(&server, 200, r#"{"token":"abc123"}"#);

        let harness = Harness::new();
        let stores = AuthorityStores {
            pat: harness.pat.clone(),
            refresh_tokens: harness.refresh_tokens.clone(),
            user_credentials: harness.user_credentials.clone(),
            cache: Arc::new(BrokenStore),
        };
        let authority =
            Authority::new(stores, ServiceEndpoints::from_base(&server.base_url()).unwrap())
                .with_observer(harness.observer.clone());

        assert!(authority.issue_pat(&endpoint(), &oauth_result()).await.unwrap());
        assert!(harness.pat.contains(&endpoint()).await);
        assert_eq!(harness.observer.names(), vec!["cache_failed", "pat_issued"]);
    }

    #[tokio::test]
    async fn test_invalid_oauth_result_is_precondition() {
        let harness = Harness::new();
        let authority = harness.authority("http://127.0.0.1:9");
        let mut oauth = oauth_result();
        oauth.access_token.clear();

        let err = authority.issue_pat(&endpoint(), &oauth).await.unwrap_err();
        assert!(err.is_precondition());
        assert!(harness.observer.events().is_empty());
    }
}
