//! In-process blob store with fault injection.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use folio_core::AssetRef;

use super::{BlobError, BlobStore};
use crate::journal::{Journal, JournalEntry};

/// Blob store held in memory.
///
/// Cheap to clone; all clones share the same blobs and switches.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<BTreeMap<AssetRef, Vec<u8>>>>,
    fail_writes: Arc<AtomicBool>,
    fail_deletes: Arc<AtomicBool>,
    journal: Journal,
}

impl MemoryBlobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that records writes and deletes in `journal`.
    #[must_use]
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    /// Make every write fail until switched off.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every delete fail until switched off.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.lock().await.len()
    }

    /// Whether no blobs are stored.
    pub async fn is_empty(&self) -> bool {
        self.blobs.lock().await.is_empty()
    }

    /// Insert a blob without going through the asset manager.
    pub async fn put(&self, name: AssetRef, bytes: Vec<u8>) {
        self.blobs.lock().await.insert(name, bytes);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn write(&self, name: &AssetRef, bytes: &[u8]) -> Result<(), BlobError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable("writes disabled".to_owned()));
        }
        self.blobs.lock().await.insert(name.clone(), bytes.to_vec());
        self.journal.record(JournalEntry::BlobWritten(name.clone()));
        Ok(())
    }

    async fn delete(&self, name: &AssetRef) -> Result<(), BlobError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable("deletes disabled".to_owned()));
        }
        self.blobs.lock().await.remove(name);
        self.journal.record(JournalEntry::BlobDeleted(name.clone()));
        Ok(())
    }

    async fn exists(&self, name: &AssetRef) -> Result<bool, BlobError> {
        Ok(self.blobs.lock().await.contains_key(name))
    }

    async fn list(&self) -> Result<Vec<AssetRef>, BlobError> {
        Ok(self.blobs.lock().await.keys().cloned().collect())
    }
}
