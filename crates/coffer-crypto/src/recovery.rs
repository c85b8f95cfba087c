//! BIP-39 recovery phrases
//!
//! At vault init a 12-word English mnemonic is generated and shown once;
//! the user writes it down. Its seed feeds the same PBKDF2 parameters as
//! password derivation, so phrase + salt can always re-create the recovery
//! key that the wrapped vault key was encrypted under.

use bip39::Mnemonic;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_key, SessionKey};

/// Words in a recovery phrase (128 bits of entropy).
pub const PHRASE_WORDS: usize = 12;

/// How many words the user re-enters when confirming a fresh phrase.
pub const VERIFICATION_WORDS: usize = 3;

/// Generate a new 12-word BIP-39 recovery phrase.
///
/// Displayed once and never stored digitally; only its hash (see
/// [`hash_recovery_phrase`]) is kept for later verification.
pub fn generate_recovery_phrase() -> CryptoResult<String> {
    let mut entropy = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut entropy);

    let mnemonic = Mnemonic::from_entropy(&entropy)
        .map_err(|e| anyhow::anyhow!("mnemonic generation failed: {e}"))?;
    entropy.zeroize();

    Ok(mnemonic.to_string())
}

/// True when the phrase parses as valid BIP-39 English.
pub fn validate_recovery_phrase(phrase: &str) -> bool {
    phrase.parse::<Mnemonic>().is_ok()
}

/// Derive the recovery key from a phrase and the vault salt.
///
/// The phrase is validated, expanded to its BIP-39 seed (empty passphrase),
/// and the seed run through PBKDF2 exactly like a password.
pub fn derive_recovery_key(phrase: &str, salt_hex: &str) -> CryptoResult<SessionKey> {
    let mnemonic: Mnemonic = phrase
        .parse()
        .map_err(|_| CryptoError::InvalidSecret("invalid recovery phrase".into()))?;

    let mut seed = mnemonic.to_seed("");
    let key = derive_key(&seed, salt_hex);
    seed.zeroize();
    key
}

/// SHA-256 hex digest of a trimmed phrase.
///
/// Stored so a typed phrase can be checked without a derivation pass.
pub fn hash_recovery_phrase(phrase: &str) -> String {
    let digest = Sha256::digest(phrase.trim().as_bytes());
    hex::encode(digest)
}

/// Three distinct random word positions, ascending, for a phrase spot-check
/// ("enter words 2, 7 and 11").
pub fn verification_indices() -> [usize; VERIFICATION_WORDS] {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let mut picked = std::collections::BTreeSet::new();
    while picked.len() < VERIFICATION_WORDS {
        picked.insert(rng.gen_range(0..PHRASE_WORDS));
    }

    let mut indices = [0usize; VERIFICATION_WORDS];
    for (slot, index) in indices.iter_mut().zip(picked) {
        *slot = index;
    }
    indices
}
