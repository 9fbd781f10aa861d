//! Encrypted client-side session storage.
//!
//! Holds the authentication token and a cached user profile, both encrypted
//! at rest, and derives identity claims from the token on demand. Every read
//! path is fail-soft: decryption or decoding problems read as "absent".

pub mod claims;
pub mod crypto;
pub mod storage;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

pub use claims::{GUEST, SessionIdentity, UserClaims};
pub use crypto::SessionCipher;
pub use storage::{FileStore, KeyValueStore, MemoryStore};

use crate::config::ClientConfig;
use crate::models::CachedUserProfile;

/// Storage key of the encrypted token.
pub const TOKEN_KEY: &str = "jwt";
/// Storage key of the encrypted cached profile.
pub const USER_KEY: &str = "user";

/// Session storage errors. Logged and degraded, never returned by reads.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Encryption error: {0}")]
    Encrypt(String),

    #[error("Decryption error: {0}")]
    Decrypt(String),

    #[error("Token decode error: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Encrypted token and profile storage.
///
/// Construct once at startup and share it (`Arc<SessionStore>`) with the
/// API client and anything else that needs identity. Only login, logout and
/// profile-update flows are expected to write.
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    cipher: SessionCipher,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>, secret_key: &str) -> Self {
        Self {
            store,
            cipher: SessionCipher::new(secret_key),
        }
    }

    /// File-backed store at the configured location.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            Arc::new(FileStore::new(config.storage_path.clone())),
            &config.secret_key,
        )
    }

    /// In-memory store, lost at process exit.
    pub fn in_memory(secret_key: &str) -> Self {
        Self::new(Arc::new(MemoryStore::new()), secret_key)
    }

    /// Encrypt and persist `token`. The token's shape is not validated.
    pub fn save_token(&self, token: &str) {
        self.save_encrypted(TOKEN_KEY, token);
    }

    /// The stored token, or `None` if absent or undecryptable.
    pub fn get_token(&self) -> Option<String> {
        self.load_decrypted(TOKEN_KEY)
    }

    /// Claims decoded from the stored token, without signature verification.
    ///
    /// Use for UI gating only; never treat the result as authorization.
    pub fn get_user_from_token(&self) -> Option<UserClaims> {
        let token = self.get_token()?;
        match claims::decode_claims(&token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                debug!("stored token has no readable claims: {e}");
                None
            }
        }
    }

    /// Identity for the notification stream, `guest` when signed out.
    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity::from_claims(self.get_user_from_token().as_ref())
    }

    /// Encrypt and persist the cached profile.
    pub fn save_user(&self, profile: &CachedUserProfile) {
        match serde_json::to_string(profile) {
            Ok(json) => self.save_encrypted(USER_KEY, &json),
            Err(e) => warn!("failed to serialize cached profile: {e}"),
        }
    }

    /// The cached profile, or `None` if absent, undecryptable or unparseable.
    pub fn get_saved_user(&self) -> Option<CachedUserProfile> {
        let json = self.load_decrypted(USER_KEY)?;
        match serde_json::from_str(&json) {
            Ok(profile) => Some(profile),
            Err(e) => {
                debug!("cached profile is unreadable: {e}");
                None
            }
        }
    }

    /// Remove the token (logout).
    ///
    /// The cached profile is intentionally kept so the next order form can
    /// be prefilled. Pending product confirmation.
    pub fn clear_session(&self) {
        self.store.remove(TOKEN_KEY);
    }

    fn save_encrypted(&self, key: &str, plaintext: &str) {
        match self.cipher.seal(plaintext) {
            Ok(encrypted) => self.store.set(key, &encrypted),
            Err(e) => warn!(key, "failed to encrypt session value: {e}"),
        }
    }

    fn load_decrypted(&self, key: &str) -> Option<String> {
        let encrypted = self.store.get(key)?;
        match self.cipher.open(&encrypted) {
            Ok(plaintext) => Some(plaintext),
            Err(e) => {
                debug!(key, "treating stored value as absent: {e}");
                None
            }
        }
    }
}
