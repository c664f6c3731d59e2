//! Comment queries for [`PgStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::instrument;

use folio_core::{AccountId, CommentId, CommentStatus, ContentItemId};

use super::{PgStore, RepositoryError, map_write_error};
use crate::models::{Comment, CommentFilter, NewComment};
use crate::store::CommentStore;

const COMMENT_COLUMNS: &str = "id, content_id, author_id, body, status, created_at";

/// `WHERE` clause for [`CommentFilter`]. Binds `$1` to `$4`.
const FILTER_CLAUSE: &str = r"
    WHERE ($1::BIGINT IS NULL OR c.content_id = $1)
      AND ($2::BIGINT IS NULL OR c.author_id = $2)
      AND ($3::BIGINT IS NULL OR EXISTS (
            SELECT 1 FROM content_item ci WHERE ci.id = c.content_id AND ci.owner_id = $3
          ))
      AND ($4::comment_status IS NULL OR c.status = $4)
";

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: CommentId,
    content_id: ContentItemId,
    author_id: AccountId,
    body: String,
    status: CommentStatus,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            content_id: row.content_id,
            author_id: row.author_id,
            body: row.body,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl CommentStore for PgStore {
    #[instrument(skip(self, comment), fields(content_id = %comment.content_id))]
    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment, RepositoryError> {
        let row: CommentRow = sqlx::query_as(&format!(
            r"
            INSERT INTO comment (content_id, author_id, body, status)
            VALUES ($1, $2, $3, $4)
            RETURNING {COMMENT_COLUMNS}
            "
        ))
        .bind(comment.content_id)
        .bind(comment.author_id)
        .bind(&comment.body)
        .bind(comment.status)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>, RepositoryError> {
        let row: Option<CommentRow> = sqlx::query_as(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comment WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn set_comment_status(
        &self,
        id: CommentId,
        status: CommentStatus,
    ) -> Result<Comment, RepositoryError> {
        let row: Option<CommentRow> = sqlx::query_as(&format!(
            "UPDATE comment SET status = $2 WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    #[instrument(skip(self))]
    async fn list_comments(
        &self,
        content_id: ContentItemId,
        status: Option<CommentStatus>,
    ) -> Result<Vec<Comment>, RepositoryError> {
        let rows: Vec<CommentRow> = sqlx::query_as(&format!(
            r"
            SELECT {COMMENT_COLUMNS} FROM comment
            WHERE content_id = $1 AND ($2::comment_status IS NULL OR status = $2)
            ORDER BY created_at ASC, id ASC
            "
        ))
        .bind(content_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn find_comments(&self, filter: &CommentFilter) -> Result<Vec<Comment>, RepositoryError> {
        let rows: Vec<CommentRow> = sqlx::query_as(&format!(
            r"
            SELECT {COMMENT_COLUMNS} FROM comment c
            {FILTER_CLAUSE}
            ORDER BY created_at DESC, id DESC
            LIMIT $5
            "
        ))
        .bind(filter.content)
        .bind(filter.author)
        .bind(filter.content_owner)
        .bind(filter.status)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn count_comments(&self, filter: &CommentFilter) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM comment c {FILTER_CLAUSE}"))
            .bind(filter.content)
            .bind(filter.author)
            .bind(filter.content_owner)
            .bind(filter.status)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
