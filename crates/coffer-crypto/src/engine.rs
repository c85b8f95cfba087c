//! Authenticated encryption engine: AES-256-GCM over serialized values
//!
//! Blob format: `base64( [12-byte nonce][ciphertext + 16-byte tag] )`.
//! There is no plaintext header; the storage layer marks blob versions with
//! its own key prefix.
//!
//! A [`KeyContext`] owns the active session key and the nonce sequence for
//! one vault. The application shell holds a single context and threads it
//! through every call, so there is no global key state and the `&mut`
//! receiver on encryption serializes the counter increment-and-persist step.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::SessionKey;
use crate::nonce::{CounterStore, NonceSequence};
use crate::{NONCE_SIZE, TAG_SIZE};

pub struct KeyContext {
    session: Option<SessionKey>,
    nonces: NonceSequence,
}

impl KeyContext {
    pub fn new(store: Box<dyn CounterStore>) -> CryptoResult<Self> {
        Ok(Self {
            session: None,
            nonces: NonceSequence::new(store)?,
        })
    }

    pub fn set_session_key(&mut self, key: SessionKey) {
        self.session = Some(key);
    }

    /// Drop the session key; zeroization happens in the key's `Drop`.
    pub fn clear_session_key(&mut self) {
        self.session = None;
    }

    pub fn has_session_key(&self) -> bool {
        self.session.is_some()
    }

    pub fn session_key(&self) -> Option<&SessionKey> {
        self.session.as_ref()
    }

    /// Encrypt a serializable value under the session key.
    pub fn encrypt<T: Serialize>(&mut self, value: &T) -> CryptoResult<String> {
        let key = self.session.clone().ok_or(CryptoError::KeyUnavailable)?;
        self.encrypt_with(value, &key)
    }

    /// Encrypt under an explicit key, bypassing the session key.
    pub fn encrypt_with<T: Serialize>(
        &mut self,
        value: &T,
        key: &SessionKey,
    ) -> CryptoResult<String> {
        let nonce = self.nonces.next()?;
        seal(value, key, &nonce)
    }

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt) with the
    /// session key.
    pub fn decrypt<T: DeserializeOwned>(&self, blob: &str) -> CryptoResult<T> {
        let key = self.session.as_ref().ok_or(CryptoError::KeyUnavailable)?;
        open(blob, key)
    }

    /// Decrypt under an explicit key, bypassing the session key.
    pub fn decrypt_with<T: DeserializeOwned>(
        &self,
        blob: &str,
        key: &SessionKey,
    ) -> CryptoResult<T> {
        open(blob, key)
    }

    /// Export `key` to its serialized form and encrypt that under
    /// `phrase_key`, producing the recovery blob stored next to the vault.
    pub fn wrap_key(&mut self, key: &SessionKey, phrase_key: &SessionKey) -> CryptoResult<String> {
        let mut exported = key.export_base64();
        let wrapped = self.encrypt_with(&exported, phrase_key);
        exported.zeroize();
        wrapped
    }

    /// Decrypt a wrapped key.
    ///
    /// Returns `Ok(None)` when the phrase key is wrong or the payload is not
    /// a serialized key: an incorrect recovery phrase is an expected user
    /// condition, not a fault. Hard errors are reserved for everything else.
    pub fn unwrap_key(
        &self,
        wrapped: &str,
        phrase_key: &SessionKey,
    ) -> CryptoResult<Option<SessionKey>> {
        let mut exported: String = match self.decrypt_with(wrapped, phrase_key) {
            Ok(text) => text,
            Err(CryptoError::DecryptionFailed) => return Ok(None),
            Err(e) => return Err(e),
        };
        let key = SessionKey::import_base64(&exported);
        exported.zeroize();
        Ok(key)
    }
}

impl std::fmt::Debug for KeyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyContext")
            .field("session", &self.session.is_some())
            .field("nonces_issued", &self.nonces.issued_len())
            .finish()
    }
}

fn seal<T: Serialize>(
    value: &T,
    key: &SessionKey,
    nonce_bytes: &[u8; NONCE_SIZE],
) -> CryptoResult<String> {
    let mut plaintext = serde_json::to_vec(value).context("serializing plaintext")?;

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Nonce::from_slice(nonce_bytes);
    let encrypted = cipher.encrypt(nonce, plaintext.as_slice());
    plaintext.zeroize();
    let ciphertext = encrypted.map_err(|e| anyhow::anyhow!("encryption failed: {e}"))?;

    let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(base64_encode(&blob))
}

fn open<T: DeserializeOwned>(blob: &str, key: &SessionKey) -> CryptoResult<T> {
    let raw = base64_decode(blob).ok_or(CryptoError::DecryptionFailed)?;
    if raw.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Nonce::from_slice(nonce_bytes);

    let mut plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    let value = serde_json::from_slice(&plaintext).map_err(|_| CryptoError::DecryptionFailed);
    plaintext.zeroize();
    value
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nonce::MemoryCounterStore;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        label: String,
        amount: f64,
        tags: Vec<String>,
    }

    fn sample_record() -> Record {
        Record {
            label: "groceries".into(),
            amount: 118.42,
            tags: vec!["food".into(), "weekly".into()],
        }
    }

    fn unlocked_context() -> (KeyContext, SessionKey) {
        let mut ctx = KeyContext::new(Box::new(MemoryCounterStore::new())).unwrap();
        let key = SessionKey::generate();
        ctx.set_session_key(key.clone());
        (ctx, key)
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let (mut ctx, _) = unlocked_context();
        let record = sample_record();

        let blob = ctx.encrypt(&record).unwrap();
        let decrypted: Record = ctx.decrypt(&blob).unwrap();

        assert_eq!(decrypted, record);
    }

    #[test]
    fn test_encrypt_without_key() {
        let mut ctx = KeyContext::new(Box::new(MemoryCounterStore::new())).unwrap();
        let result = ctx.encrypt(&sample_record());

        assert!(matches!(result, Err(CryptoError::KeyUnavailable)));
    }

    #[test]
    fn test_decrypt_without_key() {
        let (mut ctx, _) = unlocked_context();
        let blob = ctx.encrypt(&sample_record()).unwrap();

        ctx.clear_session_key();
        let result: CryptoResult<Record> = ctx.decrypt(&blob);

        assert!(matches!(result, Err(CryptoError::KeyUnavailable)));
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let (mut ctx, _) = unlocked_context();
        let blob = ctx.encrypt(&sample_record()).unwrap();

        let other = SessionKey::generate();
        let result: CryptoResult<Record> = ctx.decrypt_with(&blob, &other);

        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_tampered_blob() {
        let (mut ctx, _) = unlocked_context();
        let blob = ctx.encrypt(&sample_record()).unwrap();

        let mut raw = base64_decode(&blob).unwrap();
        raw[NONCE_SIZE + 1] ^= 0xFF;
        let tampered = base64_encode(&raw);

        let result: CryptoResult<Record> = ctx.decrypt(&tampered);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_malformed_base64() {
        let (ctx, _) = unlocked_context();
        let result: CryptoResult<Record> = ctx.decrypt("@@@ not base64 @@@");

        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_truncated_blob() {
        let (ctx, _) = unlocked_context();
        // shorter than nonce + tag
        let result: CryptoResult<Record> = ctx.decrypt(&base64_encode(&[0u8; 10]));

        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_blob_layout() {
        let (mut ctx, _) = unlocked_context();
        let value = "hello".to_string();
        let blob = ctx.encrypt(&value).unwrap();

        let raw = base64_decode(&blob).unwrap();
        let plaintext_len = serde_json::to_vec(&value).unwrap().len();
        assert_eq!(raw.len(), NONCE_SIZE + plaintext_len + TAG_SIZE);
    }

    #[test]
    fn test_nonce_differs_per_encryption() {
        let (mut ctx, _) = unlocked_context();
        let blob1 = ctx.encrypt(&sample_record()).unwrap();
        let blob2 = ctx.encrypt(&sample_record()).unwrap();

        let raw1 = base64_decode(&blob1).unwrap();
        let raw2 = base64_decode(&blob2).unwrap();
        assert_ne!(raw1[..NONCE_SIZE], raw2[..NONCE_SIZE]);
    }

    #[test]
    fn test_explicit_key_overrides_session() {
        let (mut ctx, session) = unlocked_context();
        let other = SessionKey::generate();

        let blob = ctx.encrypt_with(&sample_record(), &other).unwrap();

        let with_session: CryptoResult<Record> = ctx.decrypt(&blob);
        assert!(matches!(with_session, Err(CryptoError::DecryptionFailed)));

        let decrypted: Record = ctx.decrypt_with(&blob, &other).unwrap();
        assert_eq!(decrypted, sample_record());
        assert_eq!(ctx.session_key().unwrap().as_bytes(), session.as_bytes());
    }

    #[test]
    fn test_session_lifecycle() {
        let mut ctx = KeyContext::new(Box::new(MemoryCounterStore::new())).unwrap();
        assert!(!ctx.has_session_key());
        assert!(ctx.session_key().is_none());

        let key = SessionKey::generate();
        ctx.set_session_key(key.clone());
        assert!(ctx.has_session_key());
        assert_eq!(ctx.session_key().unwrap().as_bytes(), key.as_bytes());

        ctx.clear_session_key();
        assert!(!ctx.has_session_key());
    }

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let (mut ctx, _) = unlocked_context();
        let vault_key = SessionKey::generate();
        let phrase_key = SessionKey::generate();

        let wrapped = ctx.wrap_key(&vault_key, &phrase_key).unwrap();
        let unwrapped = ctx.unwrap_key(&wrapped, &phrase_key).unwrap().unwrap();

        assert_eq!(vault_key.as_bytes(), unwrapped.as_bytes());
    }

    #[test]
    fn test_unwrap_wrong_phrase_is_soft_miss() {
        let (mut ctx, _) = unlocked_context();
        let vault_key = SessionKey::generate();
        let phrase_key = SessionKey::generate();
        let wrong_key = SessionKey::generate();

        let wrapped = ctx.wrap_key(&vault_key, &phrase_key).unwrap();
        let result = ctx.unwrap_key(&wrapped, &wrong_key).unwrap();

        assert!(result.is_none(), "wrong phrase must be a miss, not an error");
    }

    #[test]
    fn test_unwrap_non_key_payload_is_soft_miss() {
        let (mut ctx, _) = unlocked_context();
        let phrase_key = SessionKey::generate();

        // Valid encryption, but the payload is not a serialized key.
        let not_a_key = ctx.encrypt_with(&vec![1, 2, 3], &phrase_key).unwrap();
        let result = ctx.unwrap_key(&not_a_key, &phrase_key).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_unwrap_short_string_payload_is_soft_miss() {
        let (mut ctx, _) = unlocked_context();
        let phrase_key = SessionKey::generate();

        // A string payload that decodes to fewer than 32 bytes.
        let short = ctx
            .encrypt_with(&"c2hvcnQ=".to_string(), &phrase_key)
            .unwrap();
        let result = ctx.unwrap_key(&short, &phrase_key).unwrap();

        assert!(result.is_none());
    }
}

#[cfg(test)]
mod proptest_suite {
    use super::*;
    use crate::nonce::MemoryCounterStore;
    use proptest::prelude::*;

    fn fresh_context() -> KeyContext {
        let mut ctx = KeyContext::new(Box::new(MemoryCounterStore::new())).unwrap();
        ctx.set_session_key(SessionKey::generate());
        ctx
    }

    proptest! {
        #[test]
        fn roundtrip_preserves_value(label in ".*", amount in -1e12f64..1e12) {
            let mut ctx = fresh_context();
            let value = (label, amount);

            let blob = ctx.encrypt(&value).unwrap();
            let back: (String, f64) = ctx.decrypt(&blob).unwrap();
            prop_assert_eq!(back, value);
        }

        #[test]
        fn decrypt_never_accepts_foreign_input(blob in "[A-Za-z0-9+/=]{0,120}") {
            let ctx = fresh_context();
            let result: CryptoResult<String> = ctx.decrypt(&blob);
            prop_assert!(result.is_err());
        }
    }
}
