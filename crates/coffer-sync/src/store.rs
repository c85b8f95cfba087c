//! Encrypted key-value store — the vault's at-rest format.
//!
//! A single JSON file maps string keys to string values. Values written
//! through [`SecureStore::set`] are AES-GCM blobs carrying the `enc_v1:`
//! prefix; values without the prefix are legacy plaintext JSON from before
//! encryption was enabled and stay readable until their next write. The
//! whole file loads into memory on open and is flushed atomically via
//! temp+rename, so a crash mid-write never leaves a half-written vault.
//!
//! The store itself never touches key material: every operation that needs
//! a key borrows the caller's [`KeyContext`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use coffer_crypto::KeyContext;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};

/// Marks a value as an encrypted blob. Part of the on-disk format.
pub const ENCRYPTED_PREFIX: &str = "enc_v1:";

/// In-memory view of the vault file, persisted as JSON.
pub struct SecureStore {
    path: PathBuf,
    /// Key → prefixed blob (or legacy plaintext JSON).
    entries: BTreeMap<String, String>,
    dirty: bool,
}

impl SecureStore {
    /// Load or create a store at the given path.
    /// A missing file starts an empty store; a present-but-unparseable
    /// file is an error, never silently discarded.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| {
                StoreError::Corrupt(format!("parsing {}: {e}", path.display()))
            })?
        } else {
            BTreeMap::new()
        };

        Ok(SecureStore {
            path: path.to_path_buf(),
            entries,
            dirty: false,
        })
    }

    /// Encrypt `value` under the context's session key and stage it.
    pub fn set<T: Serialize>(
        &mut self,
        ctx: &mut KeyContext,
        key: &str,
        value: &T,
    ) -> StoreResult<()> {
        let blob = ctx.encrypt(value)?;
        self.entries
            .insert(key.to_string(), format!("{ENCRYPTED_PREFIX}{blob}"));
        self.dirty = true;
        Ok(())
    }

    /// Stage a plaintext entry, readable without any key.
    ///
    /// Reserved for key-recovery material (salt, wrapped key) that a new
    /// device must read from a synced image before it can unlock anything.
    /// Everything else goes through [`set`](Self::set).
    pub fn set_plain<T: Serialize>(&mut self, key: &str, value: &T) -> StoreResult<()> {
        let raw = serde_json::to_string(value)
            .map_err(|e| StoreError::Corrupt(format!("serializing entry {key:?}: {e}")))?;
        self.entries.insert(key.to_string(), raw);
        self.dirty = true;
        Ok(())
    }

    /// Decrypt and deserialize the value stored under `key`.
    ///
    /// `Ok(None)` means the key is absent, or holds a legacy plaintext
    /// entry that no longer parses. A present encrypted entry that cannot
    /// be decrypted is an error: with no key it is `KeyUnavailable`, with
    /// the wrong key `DecryptionFailed`.
    pub fn get<T: DeserializeOwned>(&self, ctx: &KeyContext, key: &str) -> StoreResult<Option<T>> {
        let Some(raw) = self.entries.get(key) else {
            return Ok(None);
        };

        if let Some(blob) = raw.strip_prefix(ENCRYPTED_PREFIX) {
            return Ok(Some(ctx.decrypt(blob)?));
        }

        // Legacy plaintext entry from before encryption was enabled.
        match serde_json::from_str(raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!("discarding unreadable legacy entry {key:?}: {e}");
                Ok(None)
            }
        }
    }

    /// Remove an entry. Returns whether it existed.
    pub fn remove(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.dirty = true;
        }
        removed
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize the raw entry map for sync upload.
    ///
    /// The result is already ciphertext wherever it matters; the remote
    /// only ever sees this opaque image.
    pub fn export_raw(&self) -> StoreResult<String> {
        serde_json::to_string(&self.entries)
            .map_err(|e| StoreError::Corrupt(format!("serializing store image: {e}")))
    }

    /// Replace every entry with a synced store image.
    pub fn import_raw(&mut self, raw: &str) -> StoreResult<()> {
        let entries: BTreeMap<String, String> = serde_json::from_str(raw)
            .map_err(|e| StoreError::Corrupt(format!("parsing synced store image: {e}")))?;
        self.entries = entries;
        self.dirty = true;
        Ok(())
    }

    /// Flush staged changes to disk using an atomic write (temp + rename).
    pub fn flush(&mut self) -> StoreResult<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| StoreError::Corrupt(format!("serializing store: {e}")))?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, &json)?;
        std::fs::rename(&tmp_path, &self.path)?;

        self.dirty = false;
        Ok(())
    }
}

impl Drop for SecureStore {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.flush() {
                tracing::warn!("failed to flush secure store on drop: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use coffer_crypto::{CryptoError, MemoryCounterStore, SessionKey};
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        body: String,
        pinned: bool,
    }

    fn unlocked_ctx() -> KeyContext {
        let mut ctx = KeyContext::new(Box::new(MemoryCounterStore::new())).unwrap();
        ctx.set_session_key(SessionKey::generate());
        ctx
    }

    fn sample_note() -> Note {
        Note {
            body: "rent due on the 1st".into(),
            pinned: true,
        }
    }

    #[test]
    fn test_open_nonexistent_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SecureStore::open(&dir.path().join("store.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_get_flush_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut ctx = unlocked_ctx();

        let mut store = SecureStore::open(&path).unwrap();
        store.set(&mut ctx, "note", &sample_note()).unwrap();
        store.flush().unwrap();

        let store2 = SecureStore::open(&path).unwrap();
        let note: Note = store2.get(&ctx, "note").unwrap().unwrap();
        assert_eq!(note, sample_note());
    }

    #[test]
    fn test_plaintext_never_reaches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut ctx = unlocked_ctx();

        let mut store = SecureStore::open(&path).unwrap();
        store.set(&mut ctx, "note", &sample_note()).unwrap();
        store.flush().unwrap();

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(on_disk.contains(ENCRYPTED_PREFIX));
        assert!(!on_disk.contains("rent due"));
    }

    #[test]
    fn test_locked_context_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut ctx = unlocked_ctx();
        let mut store = SecureStore::open(&path).unwrap();
        store.set(&mut ctx, "note", &sample_note()).unwrap();

        ctx.clear_session_key();
        assert!(matches!(
            store.set(&mut ctx, "note", &sample_note()),
            Err(StoreError::Crypto(CryptoError::KeyUnavailable))
        ));
        assert!(matches!(
            store.get::<Note>(&ctx, "note"),
            Err(StoreError::Crypto(CryptoError::KeyUnavailable))
        ));
    }

    #[test]
    fn test_wrong_key_fails_to_decrypt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut ctx = unlocked_ctx();
        let mut store = SecureStore::open(&path).unwrap();
        store.set(&mut ctx, "note", &sample_note()).unwrap();

        ctx.set_session_key(SessionKey::generate());
        assert!(matches!(
            store.get::<Note>(&ctx, "note"),
            Err(StoreError::Crypto(CryptoError::DecryptionFailed))
        ));
    }

    #[test]
    fn test_legacy_plaintext_entry_still_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(
            &path,
            r#"{"note": "{\"body\":\"old data\",\"pinned\":false}", "junk": "not json"}"#,
        )
        .unwrap();

        let store = SecureStore::open(&path).unwrap();
        let ctx = unlocked_ctx();

        let note: Option<Note> = store.get(&ctx, "note").unwrap();
        assert_eq!(note.map(|n| n.body).as_deref(), Some("old data"));
        // Unparseable legacy entries read as absent, not as an error.
        assert_eq!(store.get::<Note>(&ctx, "junk").unwrap(), None);
    }

    #[test]
    fn test_plain_entry_readable_without_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SecureStore::open(&dir.path().join("store.json")).unwrap();
        store.set_plain("salt", &"00ff00ff".to_string()).unwrap();

        // A locked context can still read it.
        let locked = KeyContext::new(Box::new(MemoryCounterStore::new())).unwrap();
        let salt: String = store.get(&locked, "salt").unwrap().unwrap();
        assert_eq!(salt, "00ff00ff");
    }

    #[test]
    fn test_corrupt_store_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json at all").unwrap();

        assert!(matches!(
            SecureStore::open(&path),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_remove_and_contains() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = unlocked_ctx();
        let mut store = SecureStore::open(&dir.path().join("store.json")).unwrap();

        store.set(&mut ctx, "note", &sample_note()).unwrap();
        assert!(store.contains("note"));
        assert_eq!(store.len(), 1);

        assert!(store.remove("note"));
        assert!(!store.remove("note"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_flush_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SecureStore::open(&dir.path().join("store.json")).unwrap();

        store.flush().unwrap();
        store.flush().unwrap();
    }

    #[test]
    fn test_export_import_raw_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = unlocked_ctx();

        let mut source = SecureStore::open(&dir.path().join("a.json")).unwrap();
        source.set(&mut ctx, "note", &sample_note()).unwrap();
        let image = source.export_raw().unwrap();

        let mut target = SecureStore::open(&dir.path().join("b.json")).unwrap();
        target.import_raw(&image).unwrap();

        let note: Note = target.get(&ctx, "note").unwrap().unwrap();
        assert_eq!(note, sample_note());
        assert!(target.import_raw("[1, 2, 3]").is_err());
    }
}
