use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// No session key is set and the caller supplied none.
    #[error("no encryption key available")]
    KeyUnavailable,

    /// Any decrypt-path failure: bad base64, truncated blob, tag mismatch,
    /// or unreadable plaintext. Deliberately undifferentiated so callers
    /// cannot tell which check rejected the input.
    #[error("invalid key or corrupted data")]
    DecryptionFailed,

    #[error("invalid secret: {0}")]
    InvalidSecret(String),

    #[error("invalid salt: {0}")]
    InvalidSalt(String),

    #[error("could not generate a unique nonce after {0} attempts")]
    NonceExhausted(u32),

    #[error("nonce counter persistence failed: {0}")]
    CounterStore(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
