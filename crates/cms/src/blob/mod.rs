//! Blob storage for uploaded files.
//!
//! Blobs are addressed by [`AssetRef`], a generated flat filename. The
//! [`crate::services::assets`] manager is the only caller that writes or
//! deletes blobs.

mod local;
#[cfg(any(test, feature = "memory"))]
mod memory;

use async_trait::async_trait;
use thiserror::Error;

use folio_core::AssetRef;

pub use local::LocalBlobStore;
#[cfg(any(test, feature = "memory"))]
pub use memory::MemoryBlobStore;

/// Errors from a blob store.
#[derive(Debug, Error)]
pub enum BlobError {
    /// Filesystem error.
    #[error("blob I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The name would resolve outside the storage directory.
    #[error("invalid blob name: {0}")]
    InvalidName(String),

    /// The backend refused the operation.
    #[error("blob store unavailable: {0}")]
    Unavailable(String),
}

/// Storage backend for asset bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write a blob, replacing any existing blob with the same name.
    ///
    /// A failed write leaves no blob under `name`.
    async fn write(&self, name: &AssetRef, bytes: &[u8]) -> Result<(), BlobError>;

    /// Delete a blob. Deleting a missing blob succeeds.
    async fn delete(&self, name: &AssetRef) -> Result<(), BlobError>;

    /// Whether a blob exists.
    async fn exists(&self, name: &AssetRef) -> Result<bool, BlobError>;

    /// Every stored blob, in name order. Entries that are not valid asset
    /// names (such as in-progress temporary files) are skipped.
    async fn list(&self) -> Result<Vec<AssetRef>, BlobError>;
}
