use coffer_crypto::CryptoError;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Crypto failures pass through unchanged so callers can tell a locked
    /// vault (`KeyUnavailable`) from a wrong key (`DecryptionFailed`).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store data corrupt: {0}")]
    Corrupt(String),
}

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no sync endpoint configured")]
    NoEndpoint,

    #[error("no sync API key configured")]
    MissingApiKey,

    #[error("sync failed with status {status}")]
    Rejected { status: u16 },

    #[error("sync request failed: {0}")]
    Http(#[from] reqwest::Error),
}
