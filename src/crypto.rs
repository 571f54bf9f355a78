//! Whole-file encryption at rest using AES-256-GCM.
//!
//! Encrypted files hold `base64(nonce || ciphertext)` so they stay plain
//! UTF-8 text on disk. A fresh random nonce is drawn for every write.

use crate::error::PrefsError;
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine as _, engine::general_purpose};
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum CipherError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid encrypted data format: {0}")]
    InvalidFormat(String),
}

impl From<CipherError> for PrefsError {
    fn from(err: CipherError) -> Self {
        match err {
            CipherError::EncryptionFailed(_) => PrefsError::encryption(err),
            CipherError::InvalidKey(ref reason) => {
                PrefsError::invalid_argument("encryption key", reason)
            }
            CipherError::DecryptionFailed(_) | CipherError::InvalidFormat(_) => {
                PrefsError::decryption(err)
            }
        }
    }
}

/// Symmetric cipher for preference files.
#[derive(Clone)]
pub struct Cipher {
    cipher: Aes256Gcm,
}

impl Cipher {
    /// Use a raw 256-bit key.
    pub fn from_key(key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != 32 {
            return Err(CipherError::InvalidKey(
                "Key must be 32 bytes (256 bits)".to_string(),
            ));
        }
        let cipher =
            Aes256Gcm::new_from_slice(key).map_err(|e| CipherError::InvalidKey(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Derive the key as SHA-256 of `secret`.
    pub fn from_secret(secret: &str) -> Self {
        let key = Sha256::digest(secret.as_bytes());
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    /// Encrypt `plaintext` into the on-disk text form.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, CipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(nonce.as_slice());
        payload.extend_from_slice(&ciphertext);
        Ok(general_purpose::STANDARD.encode(payload))
    }

    /// Decrypt the on-disk text form.
    pub fn decrypt(&self, encoded: &str) -> Result<Vec<u8>, CipherError> {
        let payload = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| CipherError::InvalidFormat(e.to_string()))?;
        if payload.len() < NONCE_LEN {
            return Err(CipherError::InvalidFormat(format!(
                "payload is {} bytes, shorter than the nonce",
                payload.len()
            )));
        }

        let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::DecryptionFailed("wrong key or corrupted data".to_string()))
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Cipher(AES-256-GCM)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = Cipher::from_secret("s3cret");
        let encoded = cipher.encrypt(br#"{"a":1}"#).unwrap();
        assert!(!encoded.contains("\"a\""));
        assert_eq!(cipher.decrypt(&encoded).unwrap(), br#"{"a":1}"#);
    }

    #[test]
    fn test_nonce_differs_per_write() {
        let cipher = Cipher::from_secret("s3cret");
        let a = cipher.encrypt(b"same").unwrap();
        let b = cipher.encrypt(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let encoded = Cipher::from_secret("one").encrypt(b"data").unwrap();
        let err = Cipher::from_secret("two").decrypt(&encoded).unwrap_err();
        assert!(matches!(err, CipherError::DecryptionFailed(_)));
    }

    #[test]
    fn test_garbage_input() {
        let cipher = Cipher::from_secret("k");
        assert!(matches!(
            cipher.decrypt("{not base64}"),
            Err(CipherError::InvalidFormat(_))
        ));
        assert!(matches!(
            cipher.decrypt("AAAA"),
            Err(CipherError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_raw_key_length() {
        assert!(Cipher::from_key(&[7u8; 32]).is_ok());
        assert!(matches!(
            Cipher::from_key(&[7u8; 16]),
            Err(CipherError::InvalidKey(_))
        ));
    }
}
