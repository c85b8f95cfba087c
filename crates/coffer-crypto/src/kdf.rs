//! Key derivation: PBKDF2-SHA256 password → session key

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::{KDF_ITERATIONS, KEY_SIZE, SALT_SIZE};

/// A 256-bit AES-GCM session key.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct SessionKey {
    bytes: [u8; KEY_SIZE],
}

impl SessionKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Generate a random key (for vault keys that are wrapped, not derived).
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Portable serialized form: base64 of the raw key bytes.
    pub fn export_base64(&self) -> String {
        base64_encode(&self.bytes)
    }

    /// Re-import a key from its serialized form.
    ///
    /// Returns `None` if the input is not base64 or not exactly 32 bytes —
    /// callers treat that as "this was never a key".
    pub fn import_base64(encoded: &str) -> Option<Self> {
        let mut raw = base64_decode(encoded)?;
        if raw.len() != KEY_SIZE {
            raw.zeroize();
            return None;
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&raw);
        raw.zeroize();
        Some(Self { bytes })
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a fresh salt: 16 random bytes, hex-encoded.
///
/// Salts are not secret; one is generated per vault and stored next to the
/// encrypted data.
pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Derive a session key from a password and a hex-encoded salt.
///
/// PBKDF2-HMAC-SHA256, 100,000 iterations. Deterministic: the same password
/// and salt always produce the same key, which is what lets the recovery
/// flow re-derive it later. The iteration count and hash are part of the
/// vault format and not tunable per call.
pub fn derive_password_key(password: &SecretString, salt_hex: &str) -> CryptoResult<SessionKey> {
    derive_key(password.expose_secret().as_bytes(), salt_hex)
}

/// Shared PBKDF2 core for password and recovery-seed derivation.
pub(crate) fn derive_key(secret: &[u8], salt_hex: &str) -> CryptoResult<SessionKey> {
    let salt = hex::decode(salt_hex)
        .map_err(|_| CryptoError::InvalidSalt("salt is not valid hex".into()))?;

    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(secret, &salt, KDF_ITERATIONS, &mut key);
    Ok(SessionKey::from_bytes(key))
}

fn base64_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.encode(data)
}

fn base64_decode(s: &str) -> Option<Vec<u8>> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.decode(s).ok()
}
