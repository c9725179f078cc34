//! AES-256-GCM encryption of configuration values.
//!
//! An encrypted value is the base64 encoding of `nonce(12) || ciphertext`.

use crate::error::{ConfigError, ConfigResult};
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Base64 master key, inline.
pub const MASTER_KEY_ENV: &str = "CONFTREE_MASTER_KEY";

/// File holding the base64 master key.
pub const MASTER_KEY_PATH_ENV: &str = "CONFTREE_MASTER_KEY_PATH";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// 256-bit key used by `decrypt()`.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(******)")
    }
}

impl MasterKey {
    /// A fresh random key.
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(key.as_slice());
        Self { bytes }
    }

    pub fn from_base64_key(encoded: &str) -> ConfigResult<Self> {
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ConfigError::evaluation("master key", format!("invalid base64: {}", e)))?;
        let bytes: [u8; KEY_LEN] = decoded.try_into().map_err(|raw: Vec<u8>| {
            ConfigError::evaluation(
                "master key",
                format!("expected {} bytes, got {}", KEY_LEN, raw.len()),
            )
        })?;
        Ok(Self { bytes })
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::io(path.display().to_string(), e))?;
        Self::from_base64_key(&content)
    }

    /// Load from an environment snapshot: the inline variable wins over the
    /// key file.
    pub fn from_env(env: &BTreeMap<String, String>) -> ConfigResult<Self> {
        if let Some(encoded) = env.get(MASTER_KEY_ENV).filter(|v| !v.trim().is_empty()) {
            debug!(source = MASTER_KEY_ENV, "Loaded master key");
            return Self::from_base64_key(encoded);
        }
        if let Some(path) = env.get(MASTER_KEY_PATH_ENV).filter(|v| !v.trim().is_empty()) {
            debug!(source = MASTER_KEY_PATH_ENV, path = %path, "Loaded master key");
            return Self::from_file(Path::new(path));
        }
        Err(ConfigError::MissingDependency {
            dependency: "master key".to_string(),
            env_vars: vec![MASTER_KEY_ENV, MASTER_KEY_PATH_ENV],
        })
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.bytes)
    }

    fn cipher(&self) -> ConfigResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.bytes)
            .map_err(|e| ConfigError::evaluation("master key", e.to_string()))
    }
}

/// Encrypt a plain value into the form accepted by `decrypt()`.
pub fn encrypt(key: &MasterKey, plaintext: &str) -> ConfigResult<String> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = key
        .cipher()?
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| ConfigError::evaluation("encrypt(...)", e.to_string()))?;
    let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    payload.extend_from_slice(nonce.as_slice());
    payload.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(payload))
}

/// Decrypt a value produced by [`encrypt`].
pub fn decrypt(key: &MasterKey, encoded: &str) -> ConfigResult<String> {
    let expression = || format!("decrypt({})", encoded);
    let payload = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ConfigError::evaluation(expression(), format!("invalid base64: {}", e)))?;
    if payload.len() <= NONCE_LEN {
        return Err(ConfigError::evaluation(expression(), "payload too short"));
    }
    let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
    let plaintext = key
        .cipher()?
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| ConfigError::evaluation(expression(), "decryption failed (wrong key or corrupted value)"))?;
    String::from_utf8(plaintext)
        .map_err(|e| ConfigError::evaluation(expression(), format!("not UTF-8: {}", e)))
}
