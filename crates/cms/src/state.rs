//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::blob::LocalBlobStore;
use crate::config::FolioConfig;
use crate::db::PgStore;
use crate::services::{Lifecycle, LifecycleSettings};

/// The production lifecycle: Postgres records, files on local disk.
pub type PgLifecycle = Lifecycle<PgStore, LocalBlobStore>;

/// Application state shared across all handlers.
///
/// Cheap to clone; handlers receive it through `axum::extract::State`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: FolioConfig,
    lifecycle: PgLifecycle,
}

impl AppState {
    /// Build the state from a connected pool and an opened upload directory.
    #[must_use]
    pub fn new(config: FolioConfig, pool: PgPool, blobs: LocalBlobStore) -> Self {
        let settings = LifecycleSettings::from(&config);
        Self {
            inner: Arc::new(AppStateInner {
                lifecycle: Lifecycle::new(PgStore::new(pool), blobs, settings),
                config,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &FolioConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn lifecycle(&self) -> &PgLifecycle {
        &self.inner.lifecycle
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        self.inner.lifecycle.store().pool()
    }
}
