//! coffer-sync: the encrypted store and its remote replication
//!
//! [`store::SecureStore`] is the vault's at-rest format: a JSON map whose
//! values are `enc_v1:`-prefixed AES-GCM blobs. [`remote::RemoteVault`]
//! moves that map, still encrypted, to and from a user-configured HTTP
//! endpoint. Neither half ever sees plaintext keys or ledger data.

pub mod error;
pub mod remote;
pub mod store;

pub use error::{StoreError, StoreResult, SyncError, SyncResult};
pub use remote::{RemoteVault, SyncConfig, SyncManifest, SyncPayload, SYNC_VERSION};
pub use store::{SecureStore, ENCRYPTED_PREFIX};
