//! Scenario tests for the Folio lifecycle core.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p folio-integration-tests
//! ```
//!
//! The tests run the public services over the in-memory record and blob
//! stores (feature `memory`). Both stores share one [`Journal`], so a test
//! can assert that a record commit happened before or after a blob write or
//! delete.
//!
//! # Test Files
//!
//! - `slugs` - Slug derivation, collisions, and write races
//! - `assets` - Upload validation and replace ordering
//! - `content` - Writes from stale sessions and on foreign drafts
//! - `comments` - Moderation queue and comment counts
//! - `deletion` - Cascading deletion and asset release
//! - `identity` - Registration, sessions, and authorization

use folio_cms::blob::MemoryBlobStore;
use folio_cms::journal::Journal;
use folio_cms::models::{ContentItem, SessionIdentity};
use folio_cms::services::{NewContent, Upload};
use folio_cms::store::{AccountStore, MemoryStore};
use folio_cms::{Lifecycle, LifecycleSettings};
use folio_core::{AssetRef, ContentKind, ContentStatus, Role};

/// Password used for every account the harness registers.
pub const PASSWORD: &str = "correct horse";

/// Smallest JPEG header the signature check accepts.
const JPEG_MAGIC: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

/// In-memory lifecycle plus handles to inspect its stores.
pub struct TestContext {
    pub journal: Journal,
    pub store: MemoryStore,
    pub blobs: MemoryBlobStore,
    pub lifecycle: Lifecycle<MemoryStore, MemoryBlobStore>,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    /// Default settings: 5 MiB uploads, only administrators delete content.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(LifecycleSettings::default())
    }

    #[must_use]
    pub fn with_settings(settings: LifecycleSettings) -> Self {
        let journal = Journal::new();
        let store = MemoryStore::with_journal(journal.clone());
        let blobs = MemoryBlobStore::with_journal(journal.clone());
        let lifecycle = Lifecycle::new(store.clone(), blobs.clone(), settings);
        Self {
            journal,
            store,
            blobs,
            lifecycle,
        }
    }

    /// Register a member named `name` (email `name@example.com`).
    pub async fn member(&self, name: &str) -> SessionIdentity {
        let account = self
            .lifecycle
            .credentials()
            .register(name, &format!("{name}@example.com"), PASSWORD)
            .await
            .expect("register member");
        SessionIdentity::from(&account)
    }

    /// Register a member with a profile image.
    pub async fn member_with_avatar(&self, name: &str) -> (SessionIdentity, AssetRef) {
        let account = self
            .lifecycle
            .credentials()
            .register_with_avatar(
                name,
                &format!("{name}@example.com"),
                PASSWORD,
                Some(jpeg(256)),
            )
            .await
            .expect("register member with avatar");
        let avatar = account.avatar.clone().expect("avatar stored");
        (SessionIdentity::from(&account), avatar)
    }

    /// Register an administrator.
    pub async fn administrator(&self, name: &str) -> SessionIdentity {
        let member = self.member(name).await;
        let account = self
            .store
            .set_role(member.account_id, Role::Administrator)
            .await
            .expect("promote administrator");
        SessionIdentity::from(&account)
    }

    /// Create a published post, optionally with a featured image.
    pub async fn post(&self, owner: &SessionIdentity, title: &str, image: bool) -> ContentItem {
        let new = NewContent {
            featured_image: image.then(png),
            ..post_input(title)
        };
        self.lifecycle
            .content()
            .create(owner, new)
            .await
            .expect("create post")
    }

    /// Leave a comment and approve it.
    pub async fn comment(
        &self,
        on: &ContentItem,
        author: &SessionIdentity,
        moderator: &SessionIdentity,
    ) {
        let comments = self.lifecycle.comments();
        let comment = comments
            .add(author, on.id, "A comment")
            .await
            .expect("add comment");
        comments
            .approve(moderator, comment.id)
            .await
            .expect("approve comment");
    }
}

/// Input for a published post without an image.
#[must_use]
pub fn post_input(title: &str) -> NewContent {
    NewContent {
        kind: ContentKind::Post,
        title: title.to_owned(),
        body: format!("<p>{title}</p>"),
        excerpt: None,
        status: ContentStatus::Published,
        featured_image: None,
    }
}

/// A JPEG upload of exactly `len` bytes.
#[must_use]
pub fn jpeg(len: usize) -> Upload {
    let mut bytes = JPEG_MAGIC.to_vec();
    bytes.resize(len.max(JPEG_MAGIC.len()), 0);
    Upload::new("photo.jpg", "image/jpeg", bytes)
}

/// A tiny PNG upload.
#[must_use]
pub fn png() -> Upload {
    Upload::new("cover.png", "image/png", b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec())
}
