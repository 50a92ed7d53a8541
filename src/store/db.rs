//! SQLite-backed persistent stores.
//!
//! One table holds every persisted secret, keyed by `(kind, endpoint_key)`:
//! - `kind`: which logical store the row belongs to (`pat`, `credential`, `refresh_token`)
//! - `endpoint_key`: hex SHA-256 of the normalized endpoint
//!
//! Secret values are AES-256-GCM sealed before they reach the database, bound to
//! their `(kind, endpoint_key)` so rows cannot be swapped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

use super::{ensure_secret, CredentialStore, TokenStore};
use crate::credentials::{Credential, TargetEndpoint, Token, TokenKind};
use crate::crypto::CryptoEngine;
use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    Pat,
    UserCredential,
    RefreshToken,
}

impl SecretKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretKind::Pat => "pat",
            SecretKind::UserCredential => "credential",
            SecretKind::RefreshToken => "refresh_token",
        }
    }
}

/// Encrypted secret database shared by the persistent store views.
#[derive(Clone)]
pub struct SecretDb {
    pool: SqlitePool,
    crypto: Arc<CryptoEngine>,
}

struct StoredRow {
    username: String,
    secret: String,
    token_kind: Option<String>,
    expires_at: Option<i64>,
}

impl SecretDb {
    pub async fn connect(db_url: &str, crypto: CryptoEngine) -> Result<Self, AuthError> {
        let options = SqliteConnectOptions::from_str(db_url)
            .map_err(|e| AuthError::Database(format!("Invalid database URL {db_url}: {e}")))?
            .create_if_missing(true);

        // Every connection to `:memory:` opens a fresh database, so pin a single
        // connection that is never recycled.
        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if db_url.contains(":memory:") {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AuthError::Database(format!("Failed to open {db_url}: {e}")))?;

        Ok(Self {
            pool,
            crypto: Arc::new(crypto),
        })
    }

    /// Run schema migrations.
    pub async fn migrate(&self) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stored_secrets (
                kind            TEXT NOT NULL,
                endpoint_key    TEXT NOT NULL,
                endpoint        TEXT NOT NULL,
                username        TEXT NOT NULL DEFAULT '',
                secret          TEXT NOT NULL,
                token_kind      TEXT,
                expires_at      INTEGER,
                updated_at      INTEGER NOT NULL,
                PRIMARY KEY (kind, endpoint_key)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store of issued personal access tokens.
    pub fn pat_store(&self) -> DbCredentialStore {
        DbCredentialStore {
            db: self.clone(),
            kind: SecretKind::Pat,
        }
    }

    /// Store of username/password credentials.
    pub fn user_credential_store(&self) -> DbCredentialStore {
        DbCredentialStore {
            db: self.clone(),
            kind: SecretKind::UserCredential,
        }
    }

    /// Store of OAuth refresh tokens.
    pub fn refresh_token_store(&self) -> DbTokenStore {
        DbTokenStore { db: self.clone() }
    }

    async fn read_row(
        &self,
        kind: SecretKind,
        endpoint: &TargetEndpoint,
    ) -> Result<Option<StoredRow>, AuthError> {
        let key = endpoint_key(endpoint);
        let row = sqlx::query(
            r#"
            SELECT username, secret, token_kind, expires_at
            FROM stored_secrets
            WHERE kind = ?1 AND endpoint_key = ?2
            "#,
        )
        .bind(kind.as_str())
        .bind(&key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let sealed: String = row.try_get("secret")?;
        let secret = self.crypto.open(&sealed, &seal_context(kind, &key))?;

        Ok(Some(StoredRow {
            username: row.try_get("username")?,
            secret,
            token_kind: row.try_get("token_kind")?,
            expires_at: row.try_get("expires_at")?,
        }))
    }

    async fn upsert_row(
        &self,
        kind: SecretKind,
        endpoint: &TargetEndpoint,
        username: &str,
        secret: &str,
        token_kind: Option<TokenKind>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), AuthError> {
        ensure_secret(secret)?;
        let key = endpoint_key(endpoint);
        let sealed = self.crypto.seal(secret, &seal_context(kind, &key))?;

        sqlx::query(
            r#"
            INSERT INTO stored_secrets
                (kind, endpoint_key, endpoint, username, secret, token_kind, expires_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (kind, endpoint_key)
            DO UPDATE SET
                endpoint = excluded.endpoint,
                username = excluded.username,
                secret = excluded.secret,
                token_kind = excluded.token_kind,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(kind.as_str())
        .bind(&key)
        .bind(endpoint.as_str())
        .bind(username)
        .bind(&sealed)
        .bind(token_kind.map(|k| k.as_str()))
        .bind(expires_at.map(|t| t.timestamp()))
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Row presence only. The secret column is never read, so rows sealed with
    /// a previous master key can still be found and deleted.
    async fn row_exists(
        &self,
        kind: SecretKind,
        endpoint: &TargetEndpoint,
    ) -> Result<bool, AuthError> {
        let row = sqlx::query("SELECT 1 FROM stored_secrets WHERE kind = ?1 AND endpoint_key = ?2")
            .bind(kind.as_str())
            .bind(endpoint_key(endpoint))
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    async fn delete_row(&self, kind: SecretKind, endpoint: &TargetEndpoint) -> Result<bool, AuthError> {
        let affected = sqlx::query("DELETE FROM stored_secrets WHERE kind = ?1 AND endpoint_key = ?2")
            .bind(kind.as_str())
            .bind(endpoint_key(endpoint))
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(affected > 0)
    }
}

/// A credential-holding view over [`SecretDb`].
#[derive(Clone)]
pub struct DbCredentialStore {
    db: SecretDb,
    kind: SecretKind,
}

#[async_trait]
impl CredentialStore for DbCredentialStore {
    async fn read(&self, endpoint: &TargetEndpoint) -> Result<Option<Credential>, AuthError> {
        let row = self.db.read_row(self.kind, endpoint).await?;
        Ok(row.map(|r| Credential::new(r.username, r.secret)))
    }

    async fn write(
        &self,
        endpoint: &TargetEndpoint,
        credential: &Credential,
    ) -> Result<(), AuthError> {
        self.db
            .upsert_row(
                self.kind,
                endpoint,
                &credential.username,
                &credential.secret,
                None,
                None,
            )
            .await
    }

    async fn exists(&self, endpoint: &TargetEndpoint) -> Result<bool, AuthError> {
        self.db.row_exists(self.kind, endpoint).await
    }

    async fn delete(&self, endpoint: &TargetEndpoint) -> Result<bool, AuthError> {
        self.db.delete_row(self.kind, endpoint).await
    }
}

/// The refresh-token view over [`SecretDb`].
#[derive(Clone)]
pub struct DbTokenStore {
    db: SecretDb,
}

#[async_trait]
impl TokenStore for DbTokenStore {
    async fn read(&self, endpoint: &TargetEndpoint) -> Result<Option<Token>, AuthError> {
        let Some(row) = self.db.read_row(SecretKind::RefreshToken, endpoint).await? else {
            return Ok(None);
        };

        let kind = row
            .token_kind
            .as_deref()
            .and_then(TokenKind::parse)
            .ok_or_else(|| AuthError::Store(format!("token for {endpoint} has no valid kind")))?;
        let expires_at = row
            .expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .ok_or_else(|| AuthError::Store(format!("token for {endpoint} has no valid expiry")))?;

        Ok(Some(Token::new(row.secret, expires_at, kind)))
    }

    async fn write(&self, endpoint: &TargetEndpoint, token: &Token) -> Result<(), AuthError> {
        self.db
            .upsert_row(
                SecretKind::RefreshToken,
                endpoint,
                "",
                &token.value,
                Some(token.kind),
                Some(token.expires_at),
            )
            .await
    }

    async fn exists(&self, endpoint: &TargetEndpoint) -> Result<bool, AuthError> {
        self.db.row_exists(SecretKind::RefreshToken, endpoint).await
    }

    async fn delete(&self, endpoint: &TargetEndpoint) -> Result<bool, AuthError> {
        self.db.delete_row(SecretKind::RefreshToken, endpoint).await
    }
}

fn endpoint_key(endpoint: &TargetEndpoint) -> String {
    let mut hasher = Sha256::new();
    hasher.update(endpoint.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

fn seal_context(kind: SecretKind, endpoint_key: &str) -> String {
    format!("{}:{endpoint_key}", kind.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use chrono::Duration;

    async fn test_db() -> SecretDb {
        let key = base64::engine::general_purpose::STANDARD.encode([0x42u8; 32]);
        let db = SecretDb::connect("sqlite::memory:", CryptoEngine::new(&key).unwrap())
            .await
            .unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn endpoint() -> TargetEndpoint {
        TargetEndpoint::parse("https://contoso.visualstudio.com").unwrap()
    }

    #[tokio::test]
    async fn test_credential_roundtrip_and_delete() {
        let db = test_db().await;
        let store = db.pat_store();
        let ep = endpoint();

        assert_eq!(store.read(&ep).await.unwrap(), None);
        store
            .write(&ep, &Credential::personal_access_token("abc123"))
            .await
            .unwrap();
        let read = store.read(&ep).await.unwrap().unwrap();
        assert_eq!(read.secret, "abc123");
        assert_eq!(read.username, "");

        assert!(store.delete(&ep).await.unwrap());
        assert!(!store.delete(&ep).await.unwrap());
        assert_eq!(store.read(&ep).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_views_are_isolated_by_kind() {
        let db = test_db().await;
        let ep = endpoint();
        db.user_credential_store()
            .write(&ep, &Credential::new("alice", "pw"))
            .await
            .unwrap();

        assert!(db.pat_store().read(&ep).await.unwrap().is_none());
        assert!(db.refresh_token_store().read(&ep).await.unwrap().is_none());
        assert!(!db.pat_store().delete(&ep).await.unwrap());
        assert_eq!(
            db.user_credential_store().read(&ep).await.unwrap(),
            Some(Credential::new("alice", "pw"))
        );
    }

    #[tokio::test]
    async fn test_upsert_replaces_previous_value() {
        let db = test_db().await;
        let store = db.pat_store();
        let ep = endpoint();
        store.write(&ep, &Credential::personal_access_token("old")).await.unwrap();
        store.write(&ep, &Credential::personal_access_token("new")).await.unwrap();
        assert_eq!(store.read(&ep).await.unwrap().unwrap().secret, "new");
    }

    #[tokio::test]
    async fn test_token_roundtrip_keeps_kind_and_expiry() {
        let db = test_db().await;
        let store = db.refresh_token_store();
        let ep = endpoint();
        let expires_at = DateTime::<Utc>::from_timestamp(Utc::now().timestamp(), 0).unwrap()
            + Duration::hours(1);
        let token = Token::new("refresh-xyz", expires_at, TokenKind::Refresh);

        store.write(&ep, &token).await.unwrap();
        assert_eq!(store.read(&ep).await.unwrap(), Some(token));
    }

    #[tokio::test]
    async fn test_secrets_are_encrypted_at_rest() {
        let db = test_db().await;
        let ep = endpoint();
        db.pat_store()
            .write(&ep, &Credential::personal_access_token("plaintext-pat"))
            .await
            .unwrap();

        let row = sqlx::query("SELECT secret, endpoint_key FROM stored_secrets")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        let stored: String = row.get("secret");
        let key: String = row.get("endpoint_key");
        assert!(!stored.contains("plaintext-pat"));
        assert_eq!(key.len(), 64);
    }

    #[tokio::test]
    async fn test_secret_copied_to_another_endpoint_does_not_open() {
        let db = test_db().await;
        let ep = endpoint();
        let other = TargetEndpoint::parse("https://fabrikam.visualstudio.com").unwrap();
        let store = db.pat_store();
        store.write(&ep, &Credential::personal_access_token("contoso-pat")).await.unwrap();
        store.write(&other, &Credential::personal_access_token("fabrikam-pat")).await.unwrap();

        sqlx::query(
            "UPDATE stored_secrets SET secret = (SELECT secret FROM stored_secrets WHERE endpoint_key = ?1) WHERE endpoint_key = ?2",
        )
        .bind(endpoint_key(&ep))
        .bind(endpoint_key(&other))
        .execute(&db.pool)
        .await
        .unwrap();

        assert!(matches!(
            store.read(&other).await,
            Err(AuthError::CryptoError(_))
        ));
    }

    #[tokio::test]
    async fn test_rows_under_a_rotated_key_can_be_found_and_deleted() {
        let db = test_db().await;
        let ep = endpoint();
        db.pat_store()
            .write(&ep, &Credential::personal_access_token("old-key-pat"))
            .await
            .unwrap();
        db.refresh_token_store()
            .write(&ep, &Token::new("old-key-rt", Utc::now(), TokenKind::Refresh))
            .await
            .unwrap();

        let new_key = base64::engine::general_purpose::STANDARD.encode([0x07u8; 32]);
        let rotated = SecretDb {
            pool: db.pool.clone(),
            crypto: Arc::new(CryptoEngine::new(&new_key).unwrap()),
        };

        assert!(matches!(
            rotated.pat_store().read(&ep).await,
            Err(AuthError::CryptoError(_))
        ));
        assert!(rotated.pat_store().exists(&ep).await.unwrap());
        assert!(rotated.refresh_token_store().exists(&ep).await.unwrap());
        assert!(rotated.pat_store().delete(&ep).await.unwrap());
        assert!(rotated.refresh_token_store().delete(&ep).await.unwrap());
        assert!(!rotated.pat_store().exists(&ep).await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_secret_is_not_stored() {
        let db = test_db().await;
        let ep = endpoint();
        let err = db
            .pat_store()
            .write(&ep, &Credential::personal_access_token(""))
            .await
            .unwrap_err();
        assert!(err.is_precondition());
        assert!(!db.pat_store().exists(&ep).await.unwrap());
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = test_db().await;
        db.migrate().await.unwrap();
    }
}
