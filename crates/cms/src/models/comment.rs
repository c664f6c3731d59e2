//! Comment models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use folio_core::{AccountId, CommentId, CommentStatus, ContentItemId};

/// A comment left on a content item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: CommentId,
    pub content_id: ContentItemId,
    pub author_id: AccountId,
    pub body: String,
    pub status: CommentStatus,
    pub created_at: DateTime<Utc>,
}

/// Data for inserting a new comment.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub content_id: ContentItemId,
    pub author_id: AccountId,
    pub body: String,
    pub status: CommentStatus,
}

/// Comment query filter. All conditions are combined with AND.
#[derive(Debug, Clone, Default)]
pub struct CommentFilter {
    /// Comments on one item.
    pub content: Option<ContentItemId>,
    /// Comments written by one account.
    pub author: Option<AccountId>,
    /// Comments received on items owned by one account.
    pub content_owner: Option<AccountId>,
    /// Comments with one moderation status.
    pub status: Option<CommentStatus>,
    /// Maximum number of rows (newest first). Ignored by counts.
    pub limit: Option<i64>,
}

impl CommentFilter {
    /// Whether `comment`, left on an item owned by `owner`, satisfies this
    /// filter.
    #[must_use]
    pub fn matches(&self, comment: &Comment, owner: Option<AccountId>) -> bool {
        self.content.is_none_or(|id| id == comment.content_id)
            && self.author.is_none_or(|id| id == comment.author_id)
            && self.content_owner.is_none_or(|id| Some(id) == owner)
            && self.status.is_none_or(|s| s == comment.status)
    }
}

/// Comment counts for one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCommentStats {
    /// Comments the account wrote.
    pub made: i64,
    /// Comments left on the account's items.
    pub received: i64,
}

/// Site-wide moderation counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationStats {
    /// Every comment.
    pub total: i64,
    /// Comments awaiting approval.
    pub pending: i64,
}
