//! At-rest encryption of session values.
//!
//! Each value is sealed with AES-256-GCM under a key derived from the
//! configured passphrase (SHA-256) and a fresh random 12-byte nonce. The
//! sealed form is `base64(nonce || ciphertext || tag)`, which keeps it
//! printable for a text key-value store.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::SessionError;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Seals and opens session values under one passphrase.
pub struct SessionCipher {
    aead: Aes256Gcm,
}

impl SessionCipher {
    pub fn new(passphrase: &str) -> Self {
        let key: [u8; 32] = Sha256::digest(passphrase.as_bytes()).into();
        Self {
            aead: Aes256Gcm::new(&Key::<Aes256Gcm>::from(key)),
        }
    }

    pub fn seal(&self, plaintext: &str) -> Result<String, SessionError> {
        let mut sealed = vec![0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut sealed);

        let ciphertext = self
            .aead
            .encrypt(Nonce::from_slice(&sealed), plaintext.as_bytes())
            .map_err(|e| SessionError::Encrypt(e.to_string()))?;
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    /// Fails on anything not produced by [`seal`](Self::seal) with the same
    /// passphrase, including truncated or modified input.
    pub fn open(&self, sealed: &str) -> Result<String, SessionError> {
        let bytes = STANDARD
            .decode(sealed.trim())
            .map_err(|e| SessionError::Decrypt(format!("not base64: {e}")))?;
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(SessionError::Decrypt(format!("{} bytes is too short", bytes.len())));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .aead
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SessionError::Decrypt("authentication failed".into()))?;
        String::from_utf8(plaintext).map_err(|e| SessionError::Decrypt(e.to_string()))
    }
}
