//! Encryption service for the shared remote document.
//!
//! The household shares one secret; the snapshot travels through the remote
//! blob store as an opaque string. The key is derived from the secret with
//! SHA-256 and the payload is sealed with XChaCha20-Poly1305; the opaque
//! form is base64 of nonce followed by ciphertext.

use base64::{engine::general_purpose::STANDARD, Engine};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 24;

/// Errors sealing a payload. Unsealing failures are deliberately not
/// errors: a payload that fails authentication or parsing reads as "no
/// usable remote snapshot".
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to encrypt payload")]
    Seal,
}

/// Symmetric encryption under the household's shared secret.
#[derive(Clone)]
pub struct SecretBox {
    key: [u8; 32],
}

impl std::fmt::Debug for SecretBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        write!(f, "SecretBox(..)")
    }
}

impl SecretBox {
    /// Derives the key from the shared secret.
    pub fn new(shared_secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(shared_secret.as_bytes());
        Self {
            key: hasher.finalize().into(),
        }
    }

    /// Serializes and seals a value into an opaque string.
    pub fn encrypt<T: Serialize>(&self, value: &T) -> Result<String, CryptoError> {
        let plain = serde_json::to_vec(value).map_err(CryptoError::Serialize)?;

        let cipher =
            XChaCha20Poly1305::new_from_slice(&self.key).map_err(|_| CryptoError::Seal)?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill(&mut nonce_bytes);

        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce_bytes), plain.as_ref())
            .map_err(|_| CryptoError::Seal)?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(payload))
    }

    /// Unseals and parses an opaque string.
    ///
    /// Returns `None` when the string is malformed, the ciphertext fails
    /// authentication (wrong secret or tampering), or the plaintext does
    /// not parse.
    pub fn decrypt<T: DeserializeOwned>(&self, opaque: &str) -> Option<T> {
        let payload = STANDARD.decode(opaque).ok()?;
        if payload.len() < NONCE_LEN {
            return None;
        }
        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);

        let cipher = XChaCha20Poly1305::new_from_slice(&self.key).ok()?;
        let plain = cipher
            .decrypt(XNonce::from_slice(nonce_bytes), ciphertext)
            .ok()?;

        serde_json::from_slice(&plain).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let secret = SecretBox::new("family-passphrase");
        let value = json!({ "amount_cents": 1250, "payee": "bakery" });

        let opaque = secret.encrypt(&value).unwrap();
        let back: serde_json::Value = secret.decrypt(&opaque).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_decrypt_with_wrong_secret_is_none() {
        let secret = SecretBox::new("family-passphrase");
        let other = SecretBox::new("not-the-passphrase");

        let opaque = secret.encrypt(&json!({ "x": 1 })).unwrap();
        assert!(other.decrypt::<serde_json::Value>(&opaque).is_none());
    }

    #[test]
    fn test_decrypt_garbage_is_none() {
        let secret = SecretBox::new("family-passphrase");
        assert!(secret.decrypt::<serde_json::Value>("not base64 at all").is_none());
        assert!(secret.decrypt::<serde_json::Value>("AAAA").is_none());
    }

    #[test]
    fn test_tampered_ciphertext_is_none() {
        let secret = SecretBox::new("family-passphrase");
        let opaque = secret.encrypt(&json!({ "x": 1 })).unwrap();

        let mut bytes = STANDARD.decode(&opaque).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let tampered = STANDARD.encode(bytes);

        assert!(secret.decrypt::<serde_json::Value>(&tampered).is_none());
    }

    #[test]
    fn test_nonces_differ_between_calls() {
        let secret = SecretBox::new("family-passphrase");
        let a = secret.encrypt(&json!({ "x": 1 })).unwrap();
        let b = secret.encrypt(&json!({ "x": 1 })).unwrap();
        assert_ne!(a, b);
    }
}
