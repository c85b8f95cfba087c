//! Nonce generation: 8 random bytes + a persisted 32-bit counter
//!
//! Pure randomness in a 96-bit space is already safe at vault volumes, but
//! the counter suffix guarantees uniqueness even if the randomness source
//! degrades. The counter survives restarts through an injected store; the
//! dedup set is per-process only and catches a same-process collision
//! before it reaches the cipher.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};
use crate::NONCE_SIZE;

/// Bounded retries before giving up on finding an unused nonce.
const MAX_ATTEMPTS: u32 = 10;

/// Durable storage for the nonce counter.
///
/// Persistence is a correctness requirement, not an optimization: a counter
/// that rewinds on restart could re-issue a nonce under the same key.
pub trait CounterStore: Send {
    fn load(&self) -> anyhow::Result<Option<u64>>;
    fn save(&self, value: u64) -> anyhow::Result<()>;
}

/// Counter persisted as a decimal string, written atomically via temp+rename.
pub struct FileCounterStore {
    path: PathBuf,
}

impl FileCounterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CounterStore for FileCounterStore {
    fn load(&self) -> anyhow::Result<Option<u64>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading nonce counter: {}", self.path.display()))?;
        let value = text
            .trim()
            .parse::<u64>()
            .with_context(|| format!("parsing nonce counter: {}", self.path.display()))?;
        Ok(Some(value))
    }

    fn save(&self, value: u64) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating counter dir: {}", parent.display()))?;
        }
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, value.to_string())
            .with_context(|| format!("writing nonce counter temp: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("renaming nonce counter: {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory counter store.
///
/// Cloning shares the backing cell, so a test can hand the same cell to a
/// second [`NonceSequence`] and simulate a restart.
#[derive(Clone, Default)]
pub struct MemoryCounterStore {
    cell: Arc<Mutex<Option<u64>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current persisted value, if any.
    pub fn value(&self) -> Option<u64> {
        *self.cell.lock().unwrap()
    }
}

impl CounterStore for MemoryCounterStore {
    fn load(&self) -> anyhow::Result<Option<u64>> {
        Ok(*self.cell.lock().unwrap())
    }

    fn save(&self, value: u64) -> anyhow::Result<()> {
        *self.cell.lock().unwrap() = Some(value);
        Ok(())
    }
}

/// Stateful nonce source: composes 8 random bytes with a 4-byte big-endian
/// counter and remembers every value issued by this process.
pub struct NonceSequence {
    counter: u64,
    issued: HashSet<[u8; NONCE_SIZE]>,
    store: Box<dyn CounterStore>,
}

impl NonceSequence {
    /// Restore the counter from the store, or seed it from the wall clock
    /// so a brand-new vault starts far from any previously issued value.
    pub fn new(store: Box<dyn CounterStore>) -> CryptoResult<Self> {
        let counter = store
            .load()
            .map_err(|e| CryptoError::CounterStore(e.to_string()))?
            .unwrap_or_else(unix_millis);

        Ok(Self {
            counter,
            issued: HashSet::new(),
            store,
        })
    }

    /// Issue the next nonce: `[8 random bytes][counter % (2^32 - 1), BE]`.
    ///
    /// The counter advances and is persisted on every attempt, so a crash
    /// between calls can only skip values, never repeat them. The modulus
    /// deliberately skips the all-ones suffix.
    pub fn next(&mut self) -> CryptoResult<[u8; NONCE_SIZE]> {
        for _ in 0..MAX_ATTEMPTS {
            let mut nonce = [0u8; NONCE_SIZE];
            rand::thread_rng().fill_bytes(&mut nonce[..8]);
            let suffix = (self.counter % 0xFFFF_FFFF) as u32;
            nonce[8..].copy_from_slice(&suffix.to_be_bytes());

            self.counter = self.counter.wrapping_add(1);
            self.store
                .save(self.counter)
                .map_err(|e| CryptoError::CounterStore(e.to_string()))?;

            if self.issued.insert(nonce) {
                return Ok(nonce);
            }
        }
        Err(CryptoError::NonceExhausted(MAX_ATTEMPTS))
    }

    /// Number of nonces issued by this instance.
    pub fn issued_len(&self) -> usize {
        self.issued.len()
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
