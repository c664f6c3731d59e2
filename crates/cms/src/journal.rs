//! Shared event log for the in-memory stores.
//!
//! Lets tests assert the relative order of record commits and blob
//! operations across both stores.

use std::sync::{Arc, Mutex, PoisonError};

use folio_core::AssetRef;

/// One observable side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    /// A record write or deletion plan was committed. Carries a label such
    /// as `insert_content` or `delete:account`.
    Committed(String),
    /// A blob was written.
    BlobWritten(AssetRef),
    /// A blob was deleted (or was already absent).
    BlobDeleted(AssetRef),
}

/// Append-only, cloneable event log.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
}

impl Journal {
    /// Create an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, entry: JournalEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    /// Snapshot of all entries so far.
    #[must_use]
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Position of the first entry matching `pred`.
    #[must_use]
    pub fn position(&self, pred: impl Fn(&JournalEntry) -> bool) -> Option<usize> {
        self.entries().iter().position(pred)
    }
}
