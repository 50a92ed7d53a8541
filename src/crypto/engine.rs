//! Secret sealing for the SQLite store.
//!
//! Each sealed value is bound to a context (the row it lives in) through AES-GCM
//! associated data, so a ciphertext moved to another endpoint's row fails to
//! open instead of silently authenticating against the wrong service.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use rand::RngCore;

use crate::error::AuthError;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

pub struct CryptoEngine {
    cipher: Aes256Gcm,
}

impl CryptoEngine {
    /// `master_key_b64` is the base64 of a 32-byte AES-256 key.
    pub fn new(master_key_b64: &str) -> Result<Self, AuthError> {
        let key = B64
            .decode(master_key_b64.trim())
            .map_err(|e| AuthError::CryptoError(format!("MASTER_KEY is not base64: {e}")))?;
        if key.len() != KEY_LEN {
            return Err(AuthError::CryptoError(format!(
                "MASTER_KEY must decode to {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| AuthError::CryptoError(format!("cipher init: {e}")))?;
        Ok(Self { cipher })
    }

    /// Seal `secret` for `context`. Output is base64(nonce || ciphertext).
    pub fn seal(&self, secret: &str, context: &str) -> Result<String, AuthError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let sealed = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: secret.as_bytes(),
                    aad: context.as_bytes(),
                },
            )
            .map_err(|e| AuthError::CryptoError(format!("seal failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(B64.encode(out))
    }

    /// Open a value produced by [`CryptoEngine::seal`] with the same `context`.
    pub fn open(&self, sealed_b64: &str, context: &str) -> Result<String, AuthError> {
        let raw = B64
            .decode(sealed_b64)
            .map_err(|e| AuthError::CryptoError(format!("sealed value is not base64: {e}")))?;
        if raw.len() <= NONCE_LEN {
            return Err(AuthError::CryptoError("sealed value too short".into()));
        }

        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let plain = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: context.as_bytes(),
                },
            )
            .map_err(|_| AuthError::CryptoError(format!("cannot open secret for {context}")))?;

        String::from_utf8(plain)
            .map_err(|e| AuthError::CryptoError(format!("opened secret is not UTF-8: {e}")))
    }
}
