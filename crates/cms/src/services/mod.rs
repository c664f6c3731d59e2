//! Lifecycle services.
//!
//! [`Lifecycle`] owns the record store, the blob store, and the settings.
//! Each accessor hands out a short-lived service borrowing them, so a
//! request never holds state beyond its own call.
//!
//! # Example
//!
//! ```rust,ignore
//! let lifecycle = Lifecycle::new(store, blobs, LifecycleSettings::from(&config));
//! let identity = lifecycle.credentials().login(&session, "writer", "secret1").await?;
//! let item = lifecycle.content().create(&identity, new_post).await?;
//! ```

pub mod assets;
pub mod comments;
pub mod content;
pub mod credentials;
pub mod deletion;
pub mod guard;
pub mod slug;

pub use assets::{AssetChange, AssetManager, AssetPolicy, ImageType, Upload};
pub use comments::CommentService;
pub use content::{ContentService, ContentUpdate, NewContent};
pub use credentials::CredentialService;
pub use deletion::{DeletionCoordinator, DeletionReport};
pub use guard::{Action, Decision, DenyReason, Guard};
pub use slug::SlugAllocator;

use crate::blob::BlobStore;
use crate::config::{DEFAULT_MAX_UPLOAD_BYTES, FolioConfig};
use crate::store::RecordStore;

/// Tunables shared by the services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleSettings {
    /// Upload size limit for images.
    pub max_upload_bytes: usize,
    /// Whether members may delete content they own.
    pub owners_may_delete_content: bool,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            owners_may_delete_content: false,
        }
    }
}

impl From<&FolioConfig> for LifecycleSettings {
    fn from(config: &FolioConfig) -> Self {
        Self {
            max_upload_bytes: config.max_upload_bytes,
            owners_may_delete_content: config.owners_may_delete_content,
        }
    }
}

/// Entry point to the content and identity lifecycle.
pub struct Lifecycle<S, B> {
    store: S,
    blobs: B,
    settings: LifecycleSettings,
}

impl<S: RecordStore, B: BlobStore> Lifecycle<S, B> {
    #[must_use]
    pub const fn new(store: S, blobs: B, settings: LifecycleSettings) -> Self {
        Self {
            store,
            blobs,
            settings,
        }
    }

    /// The authorization policy.
    #[must_use]
    pub const fn guard(&self) -> Guard {
        Guard::new(self.settings.owners_may_delete_content)
    }

    /// Registration, login, and account settings.
    #[must_use]
    pub fn credentials(&self) -> CredentialService<'_, S, B> {
        CredentialService::new(
            &self.store,
            &self.blobs,
            AssetPolicy::avatar(self.settings.max_upload_bytes),
            self.guard(),
        )
    }

    /// Slug allocation over the record store.
    #[must_use]
    pub const fn slugs(&self) -> SlugAllocator<'_, S> {
        SlugAllocator::new(&self.store)
    }

    /// Direct access to asset storage.
    #[must_use]
    pub const fn assets(&self) -> AssetManager<'_, B> {
        AssetManager::new(&self.blobs)
    }

    /// Posts and employee records.
    #[must_use]
    pub fn content(&self) -> ContentService<'_, S, B> {
        ContentService::new(
            &self.store,
            &self.blobs,
            AssetPolicy::featured_image(self.settings.max_upload_bytes),
            self.guard(),
        )
    }

    /// Comments and moderation.
    #[must_use]
    pub const fn comments(&self) -> CommentService<'_, S> {
        CommentService::new(&self.store, self.guard())
    }

    /// Cascading deletion of accounts and content.
    #[must_use]
    pub const fn deletion(&self) -> DeletionCoordinator<'_, S, B> {
        DeletionCoordinator::new(&self.store, &self.blobs, self.guard())
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn blobs(&self) -> &B {
        &self.blobs
    }

    #[must_use]
    pub const fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }
}
