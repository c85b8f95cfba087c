//! coffer: local-first encrypted vault for financial data
//!
//! Commands:
//!   init                 - create a vault: password, salt, recovery phrase
//!   unlock [--remember]  - verify the password (optionally stay unlocked)
//!   lock                 - clear a remembered session
//!   recover [--remember] - regain access with the recovery phrase
//!   import <file>        - encrypt a JSON ledger file into the vault
//!   context [--format]   - render the sanitized AI context from the vault
//!   push / pull          - sync the encrypted store with a remote endpoint
//!   status               - show vault, session and sync state

mod config;
mod vault;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;

use coffer_crypto::keystore::{clear_persisted_key, persist_session_key, restore_session_key};
use coffer_crypto::{
    derive_password_key, derive_recovery_key, generate_recovery_phrase, generate_salt,
    hash_recovery_phrase, validate_recovery_phrase, verification_indices, CryptoError,
    FileCounterStore, KeyContext,
};
use coffer_privacy::{format_context, sanitize_prompt_context, validate_context, Ledger};
use coffer_sync::{RemoteVault, SecureStore, StoreError, SyncManifest, SyncPayload};

use config::{default_config_path, CofferConfig, VaultPaths};
use vault::{RecoveryRecord, VaultMeta};

/// Store entry holding the encrypted ledger.
const LEDGER_KEY: &str = "ledger";
/// Store entry holding the plaintext recovery record.
const RECOVERY_KEY: &str = "vault.recovery";

// ── CLI structure ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "coffer",
    version,
    about = "Local-first encrypted vault for financial data",
    long_about = "coffer keeps a financial ledger encrypted at rest, syncs the ciphertext \
                  to a remote of your choosing, and renders a privacy-sanitized context \
                  for AI assistants."
)]
struct Cli {
    /// Path to coffer.toml configuration file
    #[arg(long, short = 'c', env = "COFFER_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory override (vault metadata, store, nonce counter)
    #[arg(long, env = "COFFER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "COFFER_LOG", default_value = "warn")]
    log: String,

    /// Log format (json, text)
    #[arg(long, env = "COFFER_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Clone, Debug, ValueEnum)]
enum ContextFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new vault: password, salt, recovery phrase
    Init,

    /// Unlock the vault with the password
    Unlock {
        /// Remember the session key so later commands skip the prompt
        #[arg(long)]
        remember: bool,
    },

    /// Clear a remembered session
    Lock,

    /// Regain access with the recovery phrase
    Recover {
        /// Remember the recovered session key
        #[arg(long)]
        remember: bool,
    },

    /// Encrypt a JSON ledger file into the vault
    Import {
        /// Ledger file (transactions, budgets, goals, debts)
        file: PathBuf,
    },

    /// Render the sanitized AI context from the vault
    Context {
        /// Output format
        #[arg(long, default_value = "text")]
        format: ContextFormat,
    },

    /// Upload the encrypted store to the configured endpoint
    Push,

    /// Download the encrypted store from the configured endpoint
    Pull {
        /// Accept a remote image older than this device's last sync
        #[arg(long)]
        force: bool,
    },

    /// Show vault, session and sync state
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log, &cli.log_format);

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = load_config(&config_path, cli.config.is_some()).await?;
    let paths = VaultPaths::new(config.resolve_data_dir(cli.data_dir.as_deref()));

    match cli.command {
        Commands::Init => cmd_init(&paths),
        Commands::Unlock { remember } => cmd_unlock(&paths, remember),
        Commands::Lock => cmd_lock(&paths),
        Commands::Recover { remember } => cmd_recover(&paths, remember),
        Commands::Import { file } => cmd_import(&paths, &file),
        Commands::Context { format } => cmd_context(&paths, &config, &format),
        Commands::Push => cmd_push(&paths, &config).await,
        Commands::Pull { force } => cmd_pull(&paths, &config, force).await,
        Commands::Status => cmd_status(&paths, &config),
    }
}

// ── Logging and config ───────────────────────────────────────────────────────

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}

async fn load_config(path: &Path, explicit: bool) -> Result<CofferConfig> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
    } else {
        if explicit {
            tracing::warn!(
                "config file not found: {}  (using defaults)",
                path.display()
            );
        }
        Ok(CofferConfig::default())
    }
}

// ── Vault session plumbing ───────────────────────────────────────────────────

fn open_context(paths: &VaultPaths) -> Result<KeyContext> {
    let counter = FileCounterStore::new(paths.nonce_counter());
    Ok(KeyContext::new(Box::new(counter))?)
}

fn require_meta(paths: &VaultPaths) -> Result<VaultMeta> {
    VaultMeta::load(&paths.meta())?.ok_or_else(|| {
        anyhow::anyhow!(
            "no vault at {} (run `coffer init` first)",
            paths.root().display()
        )
    })
}

fn prompt_password(prompt: &str) -> Result<SecretString> {
    let password = rpassword::prompt_password(prompt).context("reading password")?;
    if password.is_empty() {
        anyhow::bail!("password must not be empty");
    }
    Ok(SecretString::from(password))
}

fn prompt_new_password() -> Result<SecretString> {
    use secrecy::ExposeSecret;

    let first = prompt_password("New password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ").context("reading password")?;
    if confirm != first.expose_secret() {
        anyhow::bail!("passwords do not match");
    }
    Ok(first)
}

/// Prove the context key is the vault key by reading the ledger entry.
fn verify_key(ctx: &KeyContext, store: &SecureStore, bad_key_msg: &str) -> Result<()> {
    match store.get::<Ledger>(ctx, LEDGER_KEY) {
        Ok(_) => Ok(()),
        Err(StoreError::Crypto(CryptoError::DecryptionFailed)) => anyhow::bail!("{bad_key_msg}"),
        Err(e) => Err(e.into()),
    }
}

/// Open the store with an unlocked context: remembered session key first,
/// password prompt otherwise.
fn unlock_session(paths: &VaultPaths, meta: &VaultMeta) -> Result<(KeyContext, SecureStore)> {
    let mut ctx = open_context(paths)?;
    let store = SecureStore::open(&paths.store())?;

    if let Some(key) = restore_session_key(&paths.session_key())? {
        ctx.set_session_key(key);
        match store.get::<Ledger>(&ctx, LEDGER_KEY) {
            Ok(_) => return Ok((ctx, store)),
            Err(StoreError::Crypto(CryptoError::DecryptionFailed)) => {
                tracing::warn!("remembered session key no longer opens the vault; asking for the password");
                ctx.clear_session_key();
            }
            Err(e) => return Err(e.into()),
        }
    }

    let password = prompt_password("Password: ")?;
    ctx.set_session_key(derive_password_key(&password, &meta.salt)?);
    verify_key(&ctx, &store, "invalid password or corrupted vault")?;
    Ok((ctx, store))
}

// ── Commands ─────────────────────────────────────────────────────────────────

fn cmd_init(paths: &VaultPaths) -> Result<()> {
    if paths.meta().exists() {
        anyhow::bail!(
            "vault already initialized at {} (delete it first to start over)",
            paths.root().display()
        );
    }

    let password = prompt_new_password()?;
    let salt = generate_salt();
    let session_key = derive_password_key(&password, &salt)?;

    let phrase = generate_recovery_phrase()?;
    let recovery_key = derive_recovery_key(&phrase, &salt)?;

    let mut ctx = open_context(paths)?;
    let wrapped_key = ctx.wrap_key(&session_key, &recovery_key)?;

    let record = RecoveryRecord {
        salt,
        wrapped_key,
        phrase_hash: hash_recovery_phrase(&phrase),
    };
    let meta = VaultMeta::create(record.clone());
    meta.save(&paths.meta())?;

    // Seed the store: the recovery record travels with every sync, and the
    // empty ledger entry gives unlock something to verify the key against.
    ctx.set_session_key(session_key);
    let mut store = SecureStore::open(&paths.store())?;
    store.set_plain(RECOVERY_KEY, &record)?;
    store.set(&mut ctx, LEDGER_KEY, &Ledger::default())?;
    store.flush()?;

    println!("Vault created at {}\n", paths.root().display());
    println!("Your recovery phrase (write it down, in order):\n");
    for (i, word) in phrase.split_whitespace().enumerate() {
        println!("  {:>2}. {word}", i + 1);
    }
    let spots: Vec<String> = verification_indices()
        .iter()
        .map(|i| format!("#{}", i + 1))
        .collect();
    println!(
        "\nSpot-check words {} against your written copy before clearing\n\
         this terminal. The phrase is the only way back in if you forget\n\
         the password.",
        spots.join(", ")
    );
    Ok(())
}

fn cmd_unlock(paths: &VaultPaths, remember: bool) -> Result<()> {
    let meta = require_meta(paths)?;
    let mut ctx = open_context(paths)?;
    let store = SecureStore::open(&paths.store())?;

    let password = prompt_password("Password: ")?;
    let key = derive_password_key(&password, &meta.salt)?;
    ctx.set_session_key(key.clone());
    verify_key(&ctx, &store, "invalid password or corrupted vault")?;

    if remember {
        persist_session_key(&paths.session_key(), &key)?;
        println!("Vault unlocked; session remembered (clear it with `coffer lock`).");
    } else {
        println!("Password verified. Use --remember to stay unlocked for later commands.");
    }
    Ok(())
}

fn cmd_lock(paths: &VaultPaths) -> Result<()> {
    clear_persisted_key(&paths.session_key())?;
    println!("Session cleared.");
    Ok(())
}

fn cmd_recover(paths: &VaultPaths, remember: bool) -> Result<()> {
    let meta = require_meta(paths)?;

    let phrase = rpassword::prompt_password("Recovery phrase: ").context("reading phrase")?;
    if !validate_recovery_phrase(&phrase) {
        anyhow::bail!("that is not a valid recovery phrase (expected 12 known words)");
    }
    if hash_recovery_phrase(&phrase) != meta.phrase_hash {
        anyhow::bail!("recovery phrase does not match this vault");
    }

    let recovery_key = derive_recovery_key(&phrase, &meta.salt)?;
    let mut ctx = open_context(paths)?;
    let session_key = ctx
        .unwrap_key(&meta.wrapped_key, &recovery_key)?
        .context("could not unwrap the vault key; the vault metadata may be corrupt")?;

    ctx.set_session_key(session_key.clone());
    let store = SecureStore::open(&paths.store())?;
    verify_key(
        &ctx,
        &store,
        "recovered key does not open this store (was it pulled from a different vault?)",
    )?;

    if remember {
        persist_session_key(&paths.session_key(), &session_key)?;
        println!("Vault key recovered; session remembered (clear it with `coffer lock`).");
    } else {
        println!("Vault key recovered. Use --remember to stay unlocked for later commands.");
    }
    Ok(())
}

fn cmd_import(paths: &VaultPaths, file: &Path) -> Result<()> {
    let meta = require_meta(paths)?;
    let (mut ctx, mut store) = unlock_session(paths, &meta)?;

    let content = std::fs::read_to_string(file)
        .with_context(|| format!("reading ledger file: {}", file.display()))?;
    let ledger: Ledger = serde_json::from_str(&content)
        .with_context(|| format!("parsing ledger file: {}", file.display()))?;

    store.set(&mut ctx, LEDGER_KEY, &ledger)?;
    store.flush()?;

    println!(
        "Imported {} transactions, {} budgets, {} goals, {} debts.",
        ledger.transactions.len(),
        ledger.budgets.len(),
        ledger.goals.len(),
        ledger.debts.len()
    );
    Ok(())
}

fn cmd_context(paths: &VaultPaths, config: &CofferConfig, format: &ContextFormat) -> Result<()> {
    let meta = require_meta(paths)?;
    let (ctx, store) = unlock_session(paths, &meta)?;

    let ledger: Ledger = store.get(&ctx, LEDGER_KEY)?.unwrap_or_default();
    let today = Local::now().date_naive();
    let context = sanitize_prompt_context(&ledger, &config.ai.currency_symbol, today);

    // Mandatory gate: nothing leaves the vault unchecked.
    validate_context(&context)?;

    match format {
        ContextFormat::Text => println!("{}", format_context(&context)),
        ContextFormat::Json => println!("{}", serde_json::to_string_pretty(&context)?),
    }
    Ok(())
}

async fn cmd_push(paths: &VaultPaths, config: &CofferConfig) -> Result<()> {
    let mut meta = require_meta(paths)?;
    require_sync_enabled(config)?;
    let remote = RemoteVault::new(&config.sync)?;

    let store = SecureStore::open(&paths.store())?;
    let payload = SyncPayload::new(store.export_raw()?);
    remote.push(&payload).await?;

    meta.last_sync = Some(SyncManifest {
        last_modified: payload.timestamp,
        device_id: meta.device_id.clone(),
        version: payload.version.clone(),
    });
    meta.save(&paths.meta())?;

    println!(
        "Pushed {} entries ({} bytes of ciphertext).",
        store.len(),
        payload.data.len()
    );
    Ok(())
}

async fn cmd_pull(paths: &VaultPaths, config: &CofferConfig, force: bool) -> Result<()> {
    require_sync_enabled(config)?;
    let remote = RemoteVault::new(&config.sync)?;

    let Some(payload) = remote.pull().await? else {
        println!("Remote has no vault image yet.");
        return Ok(());
    };

    let meta = VaultMeta::load(&paths.meta())?;
    if let Some(last) = meta.as_ref().and_then(|m| m.last_sync.as_ref()) {
        if payload.timestamp < last.last_modified && !force {
            anyhow::bail!(
                "remote image ({}) is older than this device's last sync ({}); \
                 pass --force to take it anyway",
                format_millis(payload.timestamp),
                format_millis(last.last_modified)
            );
        }
    }

    let mut store = SecureStore::open(&paths.store())?;
    store.import_raw(&payload.data)?;
    store.flush()?;

    let manifest_for = |device_id: &str| SyncManifest {
        last_modified: payload.timestamp,
        device_id: device_id.to_string(),
        version: payload.version.clone(),
    };

    match meta {
        Some(mut meta) => {
            // The image's key material is authoritative: a vault re-keyed on
            // another device carries its new salt and wrapped key with it.
            if let Some(record) = read_recovery_record(&store, paths)? {
                if record.salt != meta.salt {
                    tracing::info!("pulled image was re-keyed; adopting its key material");
                }
                meta.salt = record.salt;
                meta.wrapped_key = record.wrapped_key;
                meta.phrase_hash = record.phrase_hash;
            }
            meta.last_sync = Some(manifest_for(&meta.device_id));
            meta.save(&paths.meta())?;
        }
        // First pull on a fresh device: bootstrap the local vault from the
        // recovery record embedded in the image.
        None => match read_recovery_record(&store, paths)? {
            Some(record) => {
                let mut fresh = VaultMeta::create(record);
                fresh.last_sync = Some(manifest_for(&fresh.device_id));
                fresh.save(&paths.meta())?;
                println!(
                    "New device initialized from the pulled vault. Run `coffer unlock` \
                     (password) or `coffer recover` (recovery phrase) to open it."
                );
            }
            None => {
                tracing::warn!(
                    "pulled image carries no recovery record; this device cannot \
                     unlock it without an existing vault"
                );
            }
        },
    }

    println!("Pulled {} entries.", store.len());
    Ok(())
}

fn cmd_status(paths: &VaultPaths, config: &CofferConfig) -> Result<()> {
    let Some(meta) = VaultMeta::load(&paths.meta())? else {
        println!(
            "No vault at {} (run `coffer init` first).",
            paths.root().display()
        );
        return Ok(());
    };

    println!("Vault:     {}", paths.root().display());
    println!(
        "Created:   {} (device {})",
        format_millis(meta.created_at),
        meta.device_id
    );

    let session = match restore_session_key(&paths.session_key()) {
        Ok(Some(_)) => "unlocked (remembered)".to_string(),
        Ok(None) => "locked".to_string(),
        Err(e) => format!("locked (session file unreadable: {e})"),
    };
    println!("Session:   {session}");

    match SecureStore::open(&paths.store()) {
        Ok(store) => println!("Store:     {} entries", store.len()),
        Err(e) => println!("Store:     unreadable ({e})"),
    }

    if config.sync.enabled {
        let endpoint = config.sync.endpoint_url.as_deref().unwrap_or("(not set)");
        println!("Sync:      enabled, endpoint {endpoint}");
        match &meta.last_sync {
            Some(manifest) => println!(
                "Last sync: {} (payload version {})",
                format_millis(manifest.last_modified),
                manifest.version
            ),
            None => println!("Last sync: never"),
        }
    } else {
        println!("Sync:      disabled");
    }
    Ok(())
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn require_sync_enabled(config: &CofferConfig) -> Result<()> {
    if !config.sync.enabled {
        anyhow::bail!("sync is disabled (set sync.enabled = true in coffer.toml)");
    }
    Ok(())
}

/// Read the plaintext recovery record out of a (possibly locked) store.
fn read_recovery_record(store: &SecureStore, paths: &VaultPaths) -> Result<Option<RecoveryRecord>> {
    let locked = open_context(paths)?;
    Ok(store.get(&locked, RECOVERY_KEY)?)
}

fn format_millis(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("t+{ms}ms"))
}
