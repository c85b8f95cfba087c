//! Configuration (loaded from coffer.toml) and vault file layout.

use std::path::{Path, PathBuf};

use coffer_sync::SyncConfig;
use serde::{Deserialize, Serialize};

/// Top-level CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CofferConfig {
    pub vault: VaultConfig,
    pub ai: AiConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Directory holding the vault files (default: platform data dir).
    pub data_dir: PathBuf,
}

impl Default for VaultConfig {
    fn default() -> Self {
        VaultConfig {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Currency symbol used when rendering the AI context (default: $).
    pub currency_symbol: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig {
            currency_symbol: "$".to_string(),
        }
    }
}

impl CofferConfig {
    /// Resolve the data directory: CLI flag > config > platform default.
    pub fn resolve_data_dir(&self, override_dir: Option<&Path>) -> PathBuf {
        expand_tilde(override_dir.unwrap_or(&self.vault.data_dir))
    }
}

/// Default config file location (`~/.config/coffer/coffer.toml` on Linux).
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coffer")
        .join("coffer.toml")
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coffer")
}

/// Expand `~` in a path to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s.starts_with("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(format!("{}/{}", home, &s[2..]))
    } else {
        path.to_path_buf()
    }
}

/// The fixed file layout inside the data directory.
pub struct VaultPaths {
    root: PathBuf,
}

impl VaultPaths {
    pub fn new(root: PathBuf) -> Self {
        VaultPaths { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Vault metadata: salt, wrapped key, phrase hash (plain JSON).
    pub fn meta(&self) -> PathBuf {
        self.root.join("vault.json")
    }

    /// The encrypted key-value store.
    pub fn store(&self) -> PathBuf {
        self.root.join("store.json")
    }

    /// Nonce counter backing file.
    pub fn nonce_counter(&self) -> PathBuf {
        self.root.join("nonce.counter")
    }

    /// Remembered session key (`unlock --remember`).
    pub fn session_key(&self) -> PathBuf {
        self.root.join("session.key")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: CofferConfig = toml::from_str("").unwrap();

        assert_eq!(config.ai.currency_symbol, "$");
        assert!(!config.sync.enabled);
        assert!(config.sync.endpoint_url.is_none());
        assert!(config.vault.data_dir.ends_with("coffer"));
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [vault]
            data_dir = "/tmp/coffer-test"

            [ai]
            currency_symbol = "€"

            [sync]
            enabled = true
            endpoint_url = "https://api.jsonbin.io/v3/b/abc123"
            api_key = "X-Master-Key: k3y"
        "#;

        let config: CofferConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.vault.data_dir, PathBuf::from("/tmp/coffer-test"));
        assert_eq!(config.ai.currency_symbol, "€");
        assert!(config.sync.enabled);
        assert_eq!(config.sync.api_key.as_deref(), Some("X-Master-Key: k3y"));
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: CofferConfig = toml::from_str("[sync]\nenabled = true\n").unwrap();

        assert!(config.sync.enabled);
        assert!(config.sync.endpoint_url.is_none());
        assert_eq!(config.ai.currency_symbol, "$");
    }

    #[test]
    fn test_resolve_data_dir_prefers_override() {
        let config = CofferConfig::default();
        let resolved = config.resolve_data_dir(Some(Path::new("/x/y")));
        assert_eq!(resolved, PathBuf::from("/x/y"));
    }

    #[test]
    fn test_expand_tilde() {
        std::env::set_var("HOME", "/home/tester");
        assert_eq!(
            expand_tilde(Path::new("~/.coffer")),
            PathBuf::from("/home/tester/.coffer")
        );
        assert_eq!(expand_tilde(Path::new("/abs")), PathBuf::from("/abs"));
    }

    #[test]
    fn test_vault_paths_layout() {
        let paths = VaultPaths::new(PathBuf::from("/data"));
        assert_eq!(paths.meta(), PathBuf::from("/data/vault.json"));
        assert_eq!(paths.store(), PathBuf::from("/data/store.json"));
        assert_eq!(paths.nonce_counter(), PathBuf::from("/data/nonce.counter"));
        assert_eq!(paths.session_key(), PathBuf::from("/data/session.key"));
    }
}
