//! Symmetric encryption for payloads stored at rest.

use crate::Result;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use core::fmt::{Debug, Formatter};
use ohno::{IntoAppError, app_err, bail};

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Encrypts and decrypts string payloads into printable ciphertext.
pub trait PayloadCipher: Send + Sync + Debug {
    fn encrypt(&self, plaintext: &str) -> Result<String>;
    fn decrypt(&self, ciphertext: &str) -> Result<String>;
}

/// AES-256-GCM with a random nonce per payload.
///
/// Output is base64 of `nonce || ciphertext || tag`.
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl AesGcmCipher {
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_LEN {
            bail!("encryption key must be {KEY_LEN} bytes, got {}", key.len());
        }

        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| app_err!("invalid encryption key"))?;
        Ok(Self { cipher })
    }

    /// Build a cipher from a base64-encoded 32-byte key.
    pub fn from_base64(key: &str) -> Result<Self> {
        let key = STANDARD.decode(key.trim()).into_app_err("decoding base64 encryption key")?;
        Self::new(&key)
    }

    /// A fresh random key, base64 encoded.
    #[must_use]
    pub fn generate_key() -> String {
        STANDARD.encode(Aes256Gcm::generate_key(OsRng))
    }
}

impl Debug for AesGcmCipher {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AesGcmCipher").finish_non_exhaustive()
    }
}

impl PayloadCipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| app_err!("encrypting payload"))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(STANDARD.encode(out))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let bytes = STANDARD.decode(ciphertext).into_app_err("decoding ciphertext")?;
        if bytes.len() <= NONCE_LEN {
            bail!("ciphertext too short ({} bytes)", bytes.len());
        }

        let (nonce, sealed) = bytes.split_at(NONCE_LEN);
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| app_err!("decrypting payload: authentication failed"))?;

        String::from_utf8(plain).into_app_err("decrypted payload is not UTF-8")
    }
}
