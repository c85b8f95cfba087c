//! Persisted session key for the `unlock --remember` flow
//!
//! Anyone who can read the key file can open the vault; that is the
//! tradeoff the flag opts into. The file is owner-only on unix.

use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::kdf::SessionKey;

pub fn persist_session_key(path: &Path, key: &SessionKey) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating key dir: {}", parent.display()))?;
    }

    fs::write(path, key.export_base64())
        .with_context(|| format!("writing session key: {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("restricting session key perms: {}", path.display()))?;
    }

    Ok(())
}

/// `None` when no key file exists or its contents are not a valid key.
pub fn restore_session_key(path: &Path) -> anyhow::Result<Option<SessionKey>> {
    if !path.exists() {
        return Ok(None);
    }

    let encoded = fs::read_to_string(path)
        .with_context(|| format!("reading session key: {}", path.display()))?;

    let key = SessionKey::import_base64(encoded.trim());
    if key.is_none() {
        tracing::warn!("ignoring session key file {}: not a valid key", path.display());
    }
    Ok(key)
}

pub fn clear_persisted_key(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        fs::remove_file(path)
            .with_context(|| format!("removing session key: {}", path.display()))?;
    }
    Ok(())
}
