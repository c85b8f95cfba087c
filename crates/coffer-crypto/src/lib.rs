//! coffer-crypto: vault encryption for Coffer
//!
//! Everything the vault needs to keep a ledger unreadable at rest:
//! PBKDF2-SHA256 key derivation, AES-256-GCM authenticated encryption with
//! counter-backed nonces, and a BIP-39 recovery path that can unwrap the
//! vault key when the password is lost.
//!
//! Key hierarchy:
//! ```text
//! Session Key (256-bit, PBKDF2-SHA256 from password + salt)
//!   ├── Vault data: AES-256-GCM, nonce = 8 random bytes || 4-byte counter
//!   └── Wrapped copy: AES-256-GCM under the recovery key
//! Recovery Key (256-bit, PBKDF2-SHA256 from BIP-39 seed + same salt)
//! ```
//!
//! There is no ambient key state: callers hold a [`KeyContext`] and pass it
//! to every operation that needs a key.

pub mod engine;
pub mod error;
pub mod kdf;
pub mod keystore;
pub mod nonce;
pub mod recovery;

pub use engine::KeyContext;
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_password_key, generate_salt, SessionKey};
pub use nonce::{CounterStore, FileCounterStore, MemoryCounterStore, NonceSequence};
pub use recovery::{
    derive_recovery_key, generate_recovery_phrase, hash_recovery_phrase,
    validate_recovery_phrase, verification_indices,
};

/// Size of a session key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// PBKDF2 iteration count. Part of the vault format: changing it would make
/// every existing vault underivable.
pub const KDF_ITERATIONS: u32 = 100_000;

/// Salt length in bytes (stored hex-encoded)
pub const SALT_SIZE: usize = 16;
