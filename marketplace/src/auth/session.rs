//! Server-issued session tokens.
//!
//! A token is the `bincode` encoding of [`SessionClaims`] sealed with
//! AES-256-GCM under a server key and shipped as
//! `base64url(nonce (12 bytes) || ciphertext)`. Clients cannot read or forge
//! the claims; any bit flip fails authentication on open.
//!
//! Tokens are stateless. Expiry is checked on open, and the HTTP layer
//! additionally checks that the account still exists on every request.

use crate::types::{Account, AccountId, Role};
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// AES-256 key length in bytes
pub const KEY_LEN: usize = 32;

const NONCE_LEN: usize = 12;

/// Session failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The token could not be decoded, decrypted or parsed
    #[error("Invalid session token")]
    Invalid,

    /// The token was valid but its lifetime has passed
    #[error("Session expired")]
    Expired,

    /// The configured key has the wrong length
    #[error("Session key must be {KEY_LEN} bytes, got {0}")]
    InvalidKey(usize),

    /// Encryption or serialization failed while issuing
    #[error("Failed to seal session: {0}")]
    Seal(String),
}

/// Identity carried inside a session token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Authenticated account
    pub account_id: AccountId,
    /// Role at login time
    pub role: Role,
    /// Issue time
    pub issued_at: DateTime<Utc>,
    /// Expiry time
    pub expires_at: DateTime<Utc>,
}

/// Issues and opens session tokens.
///
/// Cloning shares the cipher.
#[derive(Clone)]
pub struct SessionSealer {
    cipher: Arc<Aes256Gcm>,
    ttl: Duration,
}

impl std::fmt::Debug for SessionSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSealer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionSealer {
    /// Create a sealer from a 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidKey`] if the key is not 32 bytes.
    pub fn new(key: &[u8], ttl: Duration) -> Result<Self, SessionError> {
        if key.len() != KEY_LEN {
            return Err(SessionError::InvalidKey(key.len()));
        }
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| SessionError::InvalidKey(key.len()))?;

        Ok(Self {
            cipher: Arc::new(cipher),
            ttl,
        })
    }

    /// Generate a random key
    #[must_use]
    pub fn random_key() -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        key
    }

    /// Session lifetime
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `account`, valid from `now` for the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Seal`] if serialization or encryption fails.
    pub fn issue(&self, account: &Account, now: DateTime<Utc>) -> Result<(String, SessionClaims), SessionError> {
        let claims = SessionClaims {
            account_id: account.id,
            role: account.role,
            issued_at: now,
            expires_at: now + self.ttl,
        };

        let plaintext = bincode::serialize(&claims).map_err(|e| SessionError::Seal(e.to_string()))?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|e| SessionError::Seal(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        Ok((URL_SAFE_NO_PAD.encode(sealed), claims))
    }

    /// Open a token and check it has not expired at `now`.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Invalid`] if the token was not issued under this key
    /// - [`SessionError::Expired`] if `now` is at or past the expiry time
    pub fn open(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, SessionError> {
        let sealed = URL_SAFE_NO_PAD.decode(token).map_err(|_| SessionError::Invalid)?;
        if sealed.len() <= NONCE_LEN {
            return Err(SessionError::Invalid);
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SessionError::Invalid)?;
        let claims: SessionClaims = bincode::deserialize(&plaintext).map_err(|_| SessionError::Invalid)?;

        if now >= claims.expires_at {
            return Err(SessionError::Expired);
        }
        Ok(claims)
    }
}
