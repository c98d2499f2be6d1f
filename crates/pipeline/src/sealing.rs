//! Client-side payload encryption.
//!
//! Sealed payloads are `nonce (12 bytes) || AES-256-GCM ciphertext`. The root
//! hash of a sealed upload is the hash of the envelope, not of the plaintext.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use alloy_primitives::hex;
use bytes::{BufMut, Bytes, BytesMut};
use rand::RngCore;
use std::path::Path;
use thiserror::Error;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum SealingError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("sealed payload is {0} bytes, shorter than a nonce")]
    Truncated(usize),

    #[error("decryption failed: wrong key or tampered payload")]
    Decrypt,

    #[error("encryption failed")]
    Encrypt,

    #[error("failed to read key file: {0}")]
    Io(#[from] std::io::Error),
}

/// A 256-bit symmetric key.
#[derive(Clone)]
pub struct SealingKey([u8; KEY_LEN]);

impl SealingKey {
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SealingError> {
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            SealingError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", bytes.len()))
        })?;
        Ok(Self(key))
    }

    /// Parse 64 hex characters, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self, SealingError> {
        let bytes = hex::decode(s.trim()).map_err(|e| SealingError::InvalidKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Key files hold the hex form, optionally followed by a newline.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SealingError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_hex(&contents)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

impl std::fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SealingKey(..)")
    }
}

/// Encrypt `plaintext` under a fresh random nonce.
pub fn seal(key: &SealingKey, plaintext: &[u8]) -> Result<Bytes, SealingError> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = key
        .cipher()
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| SealingError::Encrypt)?;

    let mut out = BytesMut::with_capacity(NONCE_LEN + ciphertext.len());
    out.put_slice(&nonce);
    out.put_slice(&ciphertext);
    Ok(out.freeze())
}

pub fn open(key: &SealingKey, envelope: &[u8]) -> Result<Bytes, SealingError> {
    if envelope.len() < NONCE_LEN {
        return Err(SealingError::Truncated(envelope.len()));
    }
    let (nonce, ciphertext) = envelope.split_at(NONCE_LEN);
    let plaintext = key
        .cipher()
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| SealingError::Decrypt)?;
    Ok(Bytes::from(plaintext))
}
