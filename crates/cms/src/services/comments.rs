//! Comments and their moderation.

use tracing::instrument;

use folio_core::{AccountId, CommentId, CommentStatus, ContentItemId, ContentStatus};

use super::content::entity_name;
use super::credentials::not_found_as;
use super::guard::{Action, Guard};
use crate::error::LifecycleError;
use crate::models::{
    AccountCommentStats, Comment, CommentFilter, ModerationStats, NewComment, SessionIdentity,
};
use crate::store::{DeletionPlan, RecordStore, RepositoryError, constraints};

/// Comment posting and moderation.
pub struct CommentService<'a, S: ?Sized> {
    store: &'a S,
    guard: Guard,
}

impl<'a, S: RecordStore + ?Sized> CommentService<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S, guard: Guard) -> Self {
        Self { store, guard }
    }

    /// Leave a comment on a published item. New comments await moderation.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for anonymous callers, `Validation` for a
    /// blank body, and `NotFound` if the item is missing or unpublished.
    #[instrument(skip(self, identity, body), fields(author = %identity.account_id))]
    pub async fn add(
        &self,
        identity: &SessionIdentity,
        content_id: ContentItemId,
        body: &str,
    ) -> Result<Comment, LifecycleError> {
        self.guard
            .check(Some(identity), Action::CreateComment, None)?;

        let body = body.trim();
        if body.is_empty() {
            return Err(LifecycleError::Validation(
                "Please enter a comment.".to_owned(),
            ));
        }

        let item = self
            .store
            .get_content(content_id)
            .await?
            .ok_or(LifecycleError::NotFound("content item"))?;
        if item.status != ContentStatus::Published {
            return Err(LifecycleError::NotFound(entity_name(item.kind)));
        }

        let new = NewComment {
            content_id,
            author_id: identity.account_id,
            body: body.to_owned(),
            status: CommentStatus::Pending,
        };
        let comment = self
            .store
            .insert_comment(&new)
            .await
            .map_err(|e| match e {
                // The item or the author was deleted in the meantime.
                RepositoryError::Conflict(ref c) if c == constraints::COMMENT_CONTENT => {
                    LifecycleError::NotFound(entity_name(item.kind))
                }
                RepositoryError::Conflict(ref c) if c == constraints::COMMENT_AUTHOR => {
                    LifecycleError::NotFound("account")
                }
                other => other.into(),
            })?;

        tracing::info!(comment_id = %comment.id, %content_id, "Comment awaiting moderation");
        Ok(comment)
    }

    /// Approve a comment for display. Administrators only.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for members and `NotFound` for an unknown
    /// comment.
    #[instrument(skip(self, identity), fields(actor = %identity.account_id))]
    pub async fn approve(
        &self,
        identity: &SessionIdentity,
        id: CommentId,
    ) -> Result<Comment, LifecycleError> {
        self.guard
            .check(Some(identity), Action::ModerateComment, None)?;

        self.store
            .set_comment_status(id, CommentStatus::Approved)
            .await
            .map_err(|e| not_found_as(e, "comment"))
    }

    /// Delete a comment. Administrators only.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for members and `NotFound` for an unknown
    /// comment.
    #[instrument(skip(self, identity), fields(actor = %identity.account_id))]
    pub async fn delete(
        &self,
        identity: &SessionIdentity,
        id: CommentId,
    ) -> Result<(), LifecycleError> {
        self.guard
            .check(Some(identity), Action::ModerateComment, None)?;

        self.store
            .execute_deletion(&DeletionPlan::comment(id))
            .await
            .map_err(|e| not_found_as(e, "comment"))?;

        tracing::info!("Deleted comment");
        Ok(())
    }

    /// Approved comments on an item, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the query fails.
    pub async fn list_approved(
        &self,
        content_id: ContentItemId,
    ) -> Result<Vec<Comment>, LifecycleError> {
        Ok(self
            .store
            .list_comments(content_id, Some(CommentStatus::Approved))
            .await?)
    }

    /// Every comment on an item, for the moderation queue.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for members.
    pub async fn list_for_moderation(
        &self,
        identity: &SessionIdentity,
        content_id: ContentItemId,
    ) -> Result<Vec<Comment>, LifecycleError> {
        self.guard
            .check(Some(identity), Action::ModerateComment, None)?;
        Ok(self.store.list_comments(content_id, None).await?)
    }

    /// The moderation queue: comments awaiting approval on any item,
    /// newest first.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for members.
    pub async fn list_pending(
        &self,
        identity: &SessionIdentity,
    ) -> Result<Vec<Comment>, LifecycleError> {
        self.guard
            .check(Some(identity), Action::ModerateComment, None)?;

        let filter = CommentFilter {
            status: Some(CommentStatus::Pending),
            ..CommentFilter::default()
        };
        Ok(self.store.find_comments(&filter).await?)
    }

    /// Number of approved comments on an item.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the query fails.
    pub async fn approved_count(&self, content_id: ContentItemId) -> Result<i64, LifecycleError> {
        let filter = CommentFilter {
            content: Some(content_id),
            status: Some(CommentStatus::Approved),
            ..CommentFilter::default()
        };
        Ok(self.store.count_comments(&filter).await?)
    }

    /// Comments made and received by an account, any status.
    ///
    /// Members may only read their own counts.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` when a member asks about another account.
    pub async fn account_stats(
        &self,
        identity: &SessionIdentity,
        account: AccountId,
    ) -> Result<AccountCommentStats, LifecycleError> {
        if account != identity.account_id {
            self.guard
                .check(Some(identity), Action::ViewAccountList, None)?;
        }

        let made = CommentFilter {
            author: Some(account),
            ..CommentFilter::default()
        };
        let received = CommentFilter {
            content_owner: Some(account),
            ..CommentFilter::default()
        };
        Ok(AccountCommentStats {
            made: self.store.count_comments(&made).await?,
            received: self.store.count_comments(&received).await?,
        })
    }

    /// Site-wide totals for the moderation dashboard.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for members.
    pub async fn moderation_stats(
        &self,
        identity: &SessionIdentity,
    ) -> Result<ModerationStats, LifecycleError> {
        self.guard
            .check(Some(identity), Action::ModerateComment, None)?;

        let pending = CommentFilter {
            status: Some(CommentStatus::Pending),
            ..CommentFilter::default()
        };
        Ok(ModerationStats {
            total: self.store.count_comments(&CommentFilter::default()).await?,
            pending: self.store.count_comments(&pending).await?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use folio_core::{ContentKind, Email, Role, Slug, Username};

    use super::*;
    use crate::models::{ContentItem, NewAccount, NewContentRecord};
    use crate::services::guard::DenyReason;
    use crate::store::{AccountStore, ContentStore, MemoryStore};

    async fn identity(store: &MemoryStore, name: &str, role: Role) -> SessionIdentity {
        let account = store
            .insert_account(&NewAccount {
                username: Username::parse(name).unwrap(),
                email: Email::parse(&format!("{name}@example.com")).unwrap(),
                password_hash: String::new(),
                role,
                avatar: None,
            })
            .await
            .unwrap();
        SessionIdentity::from(&account)
    }

    async fn item(
        store: &MemoryStore,
        owner: &SessionIdentity,
        slug: &str,
        status: ContentStatus,
    ) -> ContentItem {
        store
            .insert_content(&NewContentRecord {
                kind: ContentKind::Post,
                title: slug.to_owned(),
                slug: Slug::parse(slug).unwrap(),
                body: "body".to_owned(),
                excerpt: None,
                status,
                featured_image: None,
                owner_id: owner.account_id,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_comment_lifecycle() {
        let store = MemoryStore::new();
        let admin = identity(&store, "admin", Role::Administrator).await;
        let reader = identity(&store, "reader", Role::Member).await;
        let post = item(&store, &admin, "post", ContentStatus::Published).await;
        let comments = CommentService::new(&store, Guard::default());

        let comment = comments.add(&reader, post.id, "  Nice post!  ").await.unwrap();
        assert_eq!(comment.body, "Nice post!");
        assert_eq!(comment.status, CommentStatus::Pending);
        assert!(comments.list_approved(post.id).await.unwrap().is_empty());

        let denied = comments.approve(&reader, comment.id).await;
        assert!(matches!(
            denied,
            Err(LifecycleError::Unauthorized(DenyReason::RequiresAdministrator))
        ));

        comments.approve(&admin, comment.id).await.unwrap();
        assert_eq!(comments.list_approved(post.id).await.unwrap().len(), 1);

        comments.delete(&admin, comment.id).await.unwrap();
        assert_eq!(store.comment_count().await, 0);

        let again = comments.delete(&admin, comment.id).await;
        assert!(matches!(again, Err(LifecycleError::NotFound("comment"))));
    }

    #[tokio::test]
    async fn test_add_rejects_blank_and_unpublished() {
        let store = MemoryStore::new();
        let owner = identity(&store, "owner", Role::Member).await;
        let draft = item(&store, &owner, "draft", ContentStatus::Draft).await;
        let published = item(&store, &owner, "published", ContentStatus::Published).await;
        let comments = CommentService::new(&store, Guard::default());

        let blank = comments.add(&owner, published.id, "   ").await.unwrap_err();
        assert_eq!(blank.user_message(), "Please enter a comment.");

        let on_draft = comments.add(&owner, draft.id, "Hi").await;
        assert!(matches!(on_draft, Err(LifecycleError::NotFound("post"))));

        let missing = comments.add(&owner, ContentItemId::new(999), "Hi").await;
        assert!(matches!(missing, Err(LifecycleError::NotFound(_))));
        assert_eq!(store.comment_count().await, 0);
    }

    #[tokio::test]
    async fn test_moderation_queue_and_counts() {
        let store = MemoryStore::new();
        let admin = identity(&store, "admin", Role::Administrator).await;
        let writer = identity(&store, "writer", Role::Member).await;
        let reader = identity(&store, "reader", Role::Member).await;
        let first = item(&store, &writer, "first", ContentStatus::Published).await;
        let second = item(&store, &admin, "second", ContentStatus::Published).await;
        let comments = CommentService::new(&store, Guard::default());

        let approved = comments.add(&reader, first.id, "Great").await.unwrap();
        comments.approve(&admin, approved.id).await.unwrap();
        let older = comments.add(&reader, first.id, "More please").await.unwrap();
        let newer = comments.add(&writer, second.id, "Thanks").await.unwrap();

        let queue = comments.list_pending(&admin).await.unwrap();
        let ids: Vec<CommentId> = queue.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);

        let denied = comments.list_pending(&writer).await;
        assert!(matches!(
            denied,
            Err(LifecycleError::Unauthorized(DenyReason::RequiresAdministrator))
        ));

        assert_eq!(comments.approved_count(first.id).await.unwrap(), 1);
        assert_eq!(comments.approved_count(second.id).await.unwrap(), 0);

        let stats = comments.moderation_stats(&admin).await.unwrap();
        assert_eq!(stats, ModerationStats { total: 3, pending: 2 });
        assert!(comments.moderation_stats(&reader).await.is_err());
    }

    #[tokio::test]
    async fn test_account_stats_made_and_received() {
        let store = MemoryStore::new();
        let admin = identity(&store, "admin", Role::Administrator).await;
        let writer = identity(&store, "writer", Role::Member).await;
        let reader = identity(&store, "reader", Role::Member).await;
        let post = item(&store, &writer, "post", ContentStatus::Published).await;
        let other = item(&store, &admin, "other", ContentStatus::Published).await;
        let comments = CommentService::new(&store, Guard::default());

        comments.add(&reader, post.id, "One").await.unwrap();
        comments.add(&reader, post.id, "Two").await.unwrap();
        comments.add(&writer, post.id, "Reply").await.unwrap();
        comments.add(&writer, other.id, "Elsewhere").await.unwrap();

        let own = comments
            .account_stats(&writer, writer.account_id)
            .await
            .unwrap();
        assert_eq!(own, AccountCommentStats { made: 2, received: 3 });

        let by_admin = comments
            .account_stats(&admin, reader.account_id)
            .await
            .unwrap();
        assert_eq!(by_admin, AccountCommentStats { made: 2, received: 0 });

        let snooping = comments.account_stats(&reader, writer.account_id).await;
        assert!(matches!(snooping, Err(LifecycleError::Unauthorized(_))));
    }
}
