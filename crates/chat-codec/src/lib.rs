//! At-rest encryption for message content.
//!
//! This is deliberately out of scope per spec.md §1 ("symmetric encryption of
//! message payloads at rest") — it exists only as the collaborator the core
//! calls through before persisting or after loading a message body. The core
//! never inspects ciphertext or derives behavior from plaintext content.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use rand::RngCore;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("ciphertext too short")]
    Truncated,
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("decryption failed")]
    Open,
}

const NONCE_LEN: usize = 12;

/// A single symmetric key shared by every node in the cluster, loaded from
/// configuration (spec.md §6.4's `content-codec key`).
#[derive(Clone)]
pub struct ContentCodec {
    cipher: Aes256Gcm,
}

impl ContentCodec {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Encrypt plaintext content for storage/transmission, returning a
    /// base64 string (nonce prefixed to ciphertext).
    pub fn seal(&self, plaintext: &[u8]) -> String {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let mut out = self
            .cipher
            .encrypt(nonce, plaintext)
            .expect("AES-GCM encryption is infallible for valid keys");
        let mut buf = nonce_bytes.to_vec();
        buf.append(&mut out);
        base64::engine::general_purpose::STANDARD.encode(buf)
    }

    /// Decrypt a value produced by `seal`.
    pub fn open(&self, sealed: &str) -> Result<Vec<u8>, CodecError> {
        let raw = base64::engine::general_purpose::STANDARD.decode(sealed)?;
        if raw.len() < NONCE_LEN {
            return Err(CodecError::Truncated);
        }
        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CodecError::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_round_trips() {
        let codec = ContentCodec::new(&[7u8; 32]);
        let sealed = codec.seal(b"hello");
        let opened = codec.open(&sealed).unwrap();
        assert_eq!(opened, b"hello");
    }

    #[test]
    fn distinct_seals_are_not_identical() {
        let codec = ContentCodec::new(&[1u8; 32]);
        assert_ne!(codec.seal(b"hi"), codec.seal(b"hi"));
    }

    #[test]
    fn open_rejects_tampered_ciphertext() {
        let codec = ContentCodec::new(&[3u8; 32]);
        let mut sealed = codec.seal(b"hello").into_bytes();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        let sealed = String::from_utf8(sealed).unwrap();
        assert!(codec.open(&sealed).is_err());
    }
}
