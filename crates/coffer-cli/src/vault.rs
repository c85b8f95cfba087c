//! Vault metadata: the plain-JSON sidecar next to the encrypted store.
//!
//! Everything in here is safe to leave readable: the salt and wrapped key
//! are useless without the password or recovery phrase, and the phrase
//! hash only confirms a phrase, it cannot reproduce one.

use std::path::Path;

use anyhow::{Context, Result};
use coffer_sync::SyncManifest;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultMeta {
    /// KDF salt, hex. Shared by the password and recovery derivations.
    pub salt: String,
    /// Session key encrypted under the recovery key.
    pub wrapped_key: String,
    /// SHA-256 of the normalized recovery phrase, for fast mismatch
    /// feedback before running the KDF.
    pub phrase_hash: String,
    /// UUID v4 identifying this device in sync manifests.
    pub device_id: String,
    /// Vault creation time, Unix milliseconds.
    pub created_at: i64,
    /// Last successful push or pull from this device.
    #[serde(default)]
    pub last_sync: Option<SyncManifest>,
}

/// Key-recovery material embedded as a plaintext entry in the synced
/// store, so a brand-new device can bootstrap itself from a pull alone.
/// None of it is secret: it only becomes a key together with the password
/// or recovery phrase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryRecord {
    pub salt: String,
    pub wrapped_key: String,
    pub phrase_hash: String,
}

impl From<&VaultMeta> for RecoveryRecord {
    fn from(meta: &VaultMeta) -> Self {
        RecoveryRecord {
            salt: meta.salt.clone(),
            wrapped_key: meta.wrapped_key.clone(),
            phrase_hash: meta.phrase_hash.clone(),
        }
    }
}

impl VaultMeta {
    /// Mint this device's metadata around a recovery record, either fresh
    /// from `init` or pulled from a synced image.
    pub fn create(record: RecoveryRecord) -> Self {
        VaultMeta {
            salt: record.salt,
            wrapped_key: record.wrapped_key,
            phrase_hash: record.phrase_hash,
            device_id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
            last_sync: None,
        }
    }

    /// Load vault metadata; `Ok(None)` when no vault has been initialized.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading vault metadata: {}", path.display()))?;
        let meta = serde_json::from_str(&content)
            .with_context(|| format!("parsing vault metadata: {}", path.display()))?;
        Ok(Some(meta))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating dir: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("serializing vault metadata")?;
        std::fs::write(path, json)
            .with_context(|| format!("writing vault metadata: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meta() -> VaultMeta {
        VaultMeta {
            salt: "00ff00ff00ff00ff00ff00ff00ff00ff".into(),
            wrapped_key: "enc_v1-ish blob".into(),
            phrase_hash: "deadbeef".into(),
            device_id: "uuid-abc".into(),
            created_at: 1_710_000_000_000,
            last_sync: None,
        }
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = VaultMeta::load(&dir.path().join("vault.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/vault.json");

        let mut meta = sample_meta();
        meta.last_sync = Some(SyncManifest {
            last_modified: 1_710_000_123_456,
            device_id: meta.device_id.clone(),
            version: coffer_sync::SYNC_VERSION.into(),
        });
        meta.save(&path).unwrap();

        let loaded = VaultMeta::load(&path).unwrap().unwrap();
        assert_eq!(loaded.salt, meta.salt);
        assert_eq!(loaded.device_id, "uuid-abc");
        assert_eq!(loaded.last_sync.unwrap().last_modified, 1_710_000_123_456);
    }

    #[test]
    fn test_older_meta_without_sync_field_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        std::fs::write(
            &path,
            r#"{
                "salt": "aa",
                "wrapped_key": "bb",
                "phrase_hash": "cc",
                "device_id": "dd",
                "created_at": 1
            }"#,
        )
        .unwrap();

        let loaded = VaultMeta::load(&path).unwrap().unwrap();
        assert!(loaded.last_sync.is_none());
    }

    #[test]
    fn test_create_mints_device_identity() {
        let meta = VaultMeta::create(RecoveryRecord::from(&sample_meta()));

        assert_eq!(meta.salt, sample_meta().salt);
        assert_ne!(meta.device_id, sample_meta().device_id);
        assert!(!meta.device_id.is_empty());
        assert!(meta.last_sync.is_none());
    }

    #[test]
    fn test_recovery_record_wire_format() {
        let record = RecoveryRecord::from(&sample_meta());
        let json = serde_json::to_string(&record).unwrap();

        assert!(json.contains(r#""wrappedKey""#));
        assert!(json.contains(r#""phraseHash""#));
        assert!(!json.contains("device_id"), "device identity stays local");
    }

    #[test]
    fn test_corrupt_meta_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        std::fs::write(&path, "{").unwrap();

        assert!(VaultMeta::load(&path).is_err());
    }
}
