//! Record store abstraction.
//!
//! The services only talk to these traits. [`crate::db::PgStore`] is the
//! production implementation; [`MemoryStore`] (feature `memory`) keeps the
//! same unique constraints in process for tests and tooling.
//!
//! Uniqueness is never decided by a read: implementations must reject a
//! conflicting write with [`RepositoryError::Conflict`] carrying one of the
//! constraint names below.

#[cfg(any(test, feature = "memory"))]
mod memory;
mod plan;

use async_trait::async_trait;

use folio_core::{
    AccountId, AssetRef, CommentId, CommentStatus, ContentItemId, ContentKind, Email, Role, Slug,
    Username,
};

pub use crate::db::RepositoryError;
use crate::models::{
    Account, AccountCredentials, Comment, CommentFilter, ContentChanges, ContentFilter,
    ContentItem, NewAccount, NewComment, NewContentRecord, ProfileChanges,
};
#[cfg(any(test, feature = "memory"))]
pub use memory::{MemoryStore, StoreFault};
pub use plan::{DeletionOutcome, DeletionPlan, DeletionStep};

/// Constraint names reported on conflicting writes.
pub mod constraints {
    /// Unique username.
    pub const ACCOUNT_USERNAME: &str = "account_username_key";
    /// Unique email.
    pub const ACCOUNT_EMAIL: &str = "account_email_key";
    /// Unique slug within a content kind.
    pub const CONTENT_SLUG: &str = "content_item_kind_slug_key";
    /// Content item owner must exist.
    pub const CONTENT_OWNER: &str = "content_item_owner_id_fkey";
    /// Comment target must exist.
    pub const COMMENT_CONTENT: &str = "comment_content_id_fkey";
    /// Comment author must exist.
    pub const COMMENT_AUTHOR: &str = "comment_author_id_fkey";
}

/// Account persistence.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert an account.
    ///
    /// # Errors
    ///
    /// `Conflict` on the username or email constraint.
    async fn insert_account(&self, account: &NewAccount) -> Result<Account, RepositoryError>;

    /// Get an account by ID.
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, RepositoryError>;

    /// Look up an account and its password hash by username or email.
    async fn find_credentials(
        &self,
        login: &str,
    ) -> Result<Option<AccountCredentials>, RepositoryError>;

    /// Get the password hash of an account.
    async fn password_hash(&self, id: AccountId) -> Result<Option<String>, RepositoryError>;

    /// Whether another account already uses this username or email.
    async fn identity_taken(
        &self,
        username: &Username,
        email: &Email,
        exclude: Option<AccountId>,
    ) -> Result<bool, RepositoryError>;

    /// Write profile fields.
    ///
    /// # Errors
    ///
    /// `NotFound` if the account does not exist, `Conflict` on a unique
    /// constraint.
    async fn update_profile(
        &self,
        id: AccountId,
        changes: &ProfileChanges,
    ) -> Result<Account, RepositoryError>;

    /// Replace the password hash.
    async fn set_password_hash(&self, id: AccountId, hash: &str) -> Result<(), RepositoryError>;

    /// Change the role.
    async fn set_role(&self, id: AccountId, role: Role) -> Result<Account, RepositoryError>;

    /// All accounts, newest first.
    async fn list_accounts(&self) -> Result<Vec<Account>, RepositoryError>;

    /// Number of accounts.
    async fn count_accounts(&self) -> Result<i64, RepositoryError>;
}

/// Content item persistence.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert a content item.
    ///
    /// # Errors
    ///
    /// `Conflict` on the slug constraint when the slug is taken in its kind.
    async fn insert_content(&self, item: &NewContentRecord)
    -> Result<ContentItem, RepositoryError>;

    /// Get a content item by ID.
    async fn get_content(&self, id: ContentItemId) -> Result<Option<ContentItem>, RepositoryError>;

    /// Get a content item by its slug within a kind.
    async fn get_content_by_slug(
        &self,
        kind: ContentKind,
        slug: &Slug,
    ) -> Result<Option<ContentItem>, RepositoryError>;

    /// Whether `slug` is used by an item of `kind` other than `exclude`.
    async fn slug_taken(
        &self,
        kind: ContentKind,
        slug: &str,
        exclude: Option<ContentItemId>,
    ) -> Result<bool, RepositoryError>;

    /// Write edited columns.
    ///
    /// # Errors
    ///
    /// `NotFound` if the item does not exist, `Conflict` on the slug
    /// constraint.
    async fn update_content(
        &self,
        id: ContentItemId,
        changes: &ContentChanges,
    ) -> Result<ContentItem, RepositoryError>;

    /// Items matching `filter`, newest first.
    async fn list_content(&self, filter: &ContentFilter)
    -> Result<Vec<ContentItem>, RepositoryError>;

    /// Number of items matching `filter` (ignores `limit`).
    async fn count_content(&self, filter: &ContentFilter) -> Result<i64, RepositoryError>;
}

/// Comment persistence.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Insert a comment.
    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment, RepositoryError>;

    /// Get a comment by ID.
    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>, RepositoryError>;

    /// Change moderation status.
    async fn set_comment_status(
        &self,
        id: CommentId,
        status: CommentStatus,
    ) -> Result<Comment, RepositoryError>;

    /// Comments on an item, oldest first, optionally restricted to a status.
    async fn list_comments(
        &self,
        content_id: ContentItemId,
        status: Option<CommentStatus>,
    ) -> Result<Vec<Comment>, RepositoryError>;

    /// Comments matching `filter`, newest first.
    async fn find_comments(&self, filter: &CommentFilter) -> Result<Vec<Comment>, RepositoryError>;

    /// Number of comments matching `filter`.
    async fn count_comments(&self, filter: &CommentFilter) -> Result<i64, RepositoryError>;
}

/// The complete record store.
#[async_trait]
pub trait RecordStore: AccountStore + ContentStore + CommentStore {
    /// Execute a deletion plan atomically.
    ///
    /// Steps run in order inside one transaction. The asset references held
    /// by every deleted row are returned in deletion order. If the final step
    /// deletes nothing the transaction is rolled back and `NotFound` is
    /// returned.
    async fn execute_deletion(
        &self,
        plan: &DeletionPlan,
    ) -> Result<DeletionOutcome, RepositoryError>;

    /// Every asset reference currently held by any record.
    async fn referenced_assets(&self) -> Result<Vec<AssetRef>, RepositoryError>;
}
