//! Content item models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use folio_core::{AccountId, AssetRef, ContentItemId, ContentKind, ContentStatus, Slug};

/// A post or employee record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentItem {
    /// Primary key.
    pub id: ContentItemId,
    /// Kind; slugs are unique per kind.
    pub kind: ContentKind,
    /// Human-entered title.
    pub title: String,
    /// URL identifier derived from the title.
    pub slug: Slug,
    /// Body text.
    pub body: String,
    /// Short summary shown in listings.
    pub excerpt: Option<String>,
    /// Publication status.
    pub status: ContentStatus,
    /// Featured image, if one was uploaded.
    pub featured_image: Option<AssetRef>,
    /// Account that created the item.
    pub owner_id: AccountId,
    /// When the item was created.
    pub created_at: DateTime<Utc>,
    /// When the item was last modified.
    pub updated_at: DateTime<Utc>,
}

/// A fully prepared content row, slug included.
#[derive(Debug, Clone)]
pub struct NewContentRecord {
    pub kind: ContentKind,
    pub title: String,
    pub slug: Slug,
    pub body: String,
    pub excerpt: Option<String>,
    pub status: ContentStatus,
    pub featured_image: Option<AssetRef>,
    pub owner_id: AccountId,
}

/// Columns written when a content item is edited.
#[derive(Debug, Clone)]
pub struct ContentChanges {
    pub title: String,
    pub slug: Slug,
    pub body: String,
    pub excerpt: Option<String>,
    pub status: ContentStatus,
    pub featured_image: Option<AssetRef>,
}

/// Listing filter. All conditions are combined with AND.
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    /// Restrict to one kind.
    pub kind: Option<ContentKind>,
    /// Restrict to one owner.
    pub owner: Option<AccountId>,
    /// Restrict to one status.
    pub status: Option<ContentStatus>,
    /// Case-insensitive substring match on title or body.
    pub search: Option<String>,
    /// Maximum number of rows (newest first).
    pub limit: Option<i64>,
}

impl ContentFilter {
    /// Whether `item` satisfies this filter.
    ///
    /// Mirrors the `WHERE` clause the Postgres store builds.
    #[must_use]
    pub fn matches(&self, item: &ContentItem) -> bool {
        if self.kind.is_some_and(|kind| kind != item.kind) {
            return false;
        }
        if self.owner.is_some_and(|owner| owner != item.owner_id) {
            return false;
        }
        if self.status.is_some_and(|status| status != item.status) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                item.title.to_lowercase().contains(&term) || item.body.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }
}
