//! Content item queries for [`PgStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::instrument;

use folio_core::{AccountId, AssetRef, ContentItemId, ContentKind, ContentStatus, Slug};

use super::{PgStore, RepositoryError, map_write_error};
use crate::models::{ContentChanges, ContentFilter, ContentItem, NewContentRecord};
use crate::store::ContentStore;

const CONTENT_COLUMNS: &str = "id, kind, title, slug, body, excerpt, status, featured_image, \
                               owner_id, created_at, updated_at";

/// Shared `WHERE` clause for listings. `$1`-`$4` are nullable filters.
const FILTER_CLAUSE: &str = r"
    WHERE ($1::content_kind IS NULL OR kind = $1)
      AND ($2::BIGINT IS NULL OR owner_id = $2)
      AND ($3::content_status IS NULL OR status = $3)
      AND ($4::TEXT IS NULL OR title ILIKE $4 OR body ILIKE $4)
";

/// Internal row type for `PostgreSQL` content queries.
#[derive(Debug, sqlx::FromRow)]
struct ContentRow {
    id: ContentItemId,
    kind: ContentKind,
    title: String,
    slug: String,
    body: String,
    excerpt: Option<String>,
    status: ContentStatus,
    featured_image: Option<String>,
    owner_id: AccountId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ContentRow> for ContentItem {
    type Error = RepositoryError;

    fn try_from(row: ContentRow) -> Result<Self, Self::Error> {
        let slug = Slug::parse(&row.slug).ok_or_else(|| {
            RepositoryError::DataCorruption(format!("invalid slug in database: {}", row.slug))
        })?;
        let featured_image = row
            .featured_image
            .map(AssetRef::try_from)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid featured image in database: {e}"))
            })?;

        Ok(Self {
            id: row.id,
            kind: row.kind,
            title: row.title,
            slug,
            body: row.body,
            excerpt: row.excerpt,
            status: row.status,
            featured_image,
            owner_id: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// `ILIKE` pattern for a search term, with wildcards in the term escaped.
fn search_pattern(filter: &ContentFilter) -> Option<String> {
    let term = filter.search.as_deref()?.trim();
    if term.is_empty() {
        return None;
    }
    let escaped = term
        .replace('\\', r"\\")
        .replace('%', r"\%")
        .replace('_', r"\_");
    Some(format!("%{escaped}%"))
}

#[async_trait]
impl ContentStore for PgStore {
    #[instrument(skip(self, item), fields(kind = %item.kind, slug = %item.slug))]
    async fn insert_content(
        &self,
        item: &NewContentRecord,
    ) -> Result<ContentItem, RepositoryError> {
        let row: ContentRow = sqlx::query_as(&format!(
            r"
            INSERT INTO content_item
                (kind, title, slug, body, excerpt, status, featured_image, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {CONTENT_COLUMNS}
            "
        ))
        .bind(item.kind)
        .bind(&item.title)
        .bind(&item.slug)
        .bind(&item.body)
        .bind(item.excerpt.as_deref())
        .bind(item.status)
        .bind(item.featured_image.as_ref())
        .bind(item.owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;

        row.try_into()
    }

    #[instrument(skip(self))]
    async fn get_content(&self, id: ContentItemId) -> Result<Option<ContentItem>, RepositoryError> {
        let row: Option<ContentRow> = sqlx::query_as(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content_item WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self), fields(slug = %slug))]
    async fn get_content_by_slug(
        &self,
        kind: ContentKind,
        slug: &Slug,
    ) -> Result<Option<ContentItem>, RepositoryError> {
        let row: Option<ContentRow> = sqlx::query_as(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content_item WHERE kind = $1 AND slug = $2"
        ))
        .bind(kind)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn slug_taken(
        &self,
        kind: ContentKind,
        slug: &str,
        exclude: Option<ContentItemId>,
    ) -> Result<bool, RepositoryError> {
        let taken: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM content_item
                WHERE kind = $1 AND slug = $2
                  AND ($3::BIGINT IS NULL OR id <> $3)
            )
            ",
        )
        .bind(kind)
        .bind(slug)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    #[instrument(skip(self, changes), fields(slug = %changes.slug))]
    async fn update_content(
        &self,
        id: ContentItemId,
        changes: &ContentChanges,
    ) -> Result<ContentItem, RepositoryError> {
        let row: Option<ContentRow> = sqlx::query_as(&format!(
            r"
            UPDATE content_item
            SET title = $2, slug = $3, body = $4, excerpt = $5, status = $6,
                featured_image = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {CONTENT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.slug)
        .bind(&changes.body)
        .bind(changes.excerpt.as_deref())
        .bind(changes.status)
        .bind(changes.featured_image.as_ref())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    #[instrument(skip(self))]
    async fn list_content(
        &self,
        filter: &ContentFilter,
    ) -> Result<Vec<ContentItem>, RepositoryError> {
        let rows: Vec<ContentRow> = sqlx::query_as(&format!(
            r"
            SELECT {CONTENT_COLUMNS} FROM content_item
            {FILTER_CLAUSE}
            ORDER BY created_at DESC, id DESC
            LIMIT $5
            "
        ))
        .bind(filter.kind)
        .bind(filter.owner)
        .bind(filter.status)
        .bind(search_pattern(filter))
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[instrument(skip(self))]
    async fn count_content(&self, filter: &ContentFilter) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM content_item {FILTER_CLAUSE}"
        ))
        .bind(filter.kind)
        .bind(filter.owner)
        .bind(filter.status)
        .bind(search_pattern(filter))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
