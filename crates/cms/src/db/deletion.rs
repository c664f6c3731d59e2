//! Transactional plan execution and asset inventory for [`PgStore`].

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use tracing::instrument;

use folio_core::AssetRef;

use super::{PgStore, RepositoryError, map_write_error};
use crate::store::{DeletionOutcome, DeletionPlan, DeletionStep, RecordStore};

/// Run one step, returning the asset column of every deleted row.
///
/// Steps that remove rows without assets return `NULL` per row so the row
/// count is still visible.
async fn run_step(
    tx: &mut Transaction<'_, Postgres>,
    step: DeletionStep,
) -> Result<Vec<Option<String>>, sqlx::Error> {
    let (sql, id) = match step {
        DeletionStep::Comment(id) => (
            "DELETE FROM comment WHERE id = $1 RETURNING NULL::TEXT",
            id.as_i64(),
        ),
        DeletionStep::CommentsOnContent(id) => (
            "DELETE FROM comment WHERE content_id = $1 RETURNING NULL::TEXT",
            id.as_i64(),
        ),
        DeletionStep::CommentsOnContentOwnedBy(id) => (
            r"
            DELETE FROM comment
            WHERE content_id IN (SELECT id FROM content_item WHERE owner_id = $1)
            RETURNING NULL::TEXT
            ",
            id.as_i64(),
        ),
        DeletionStep::CommentsByAuthor(id) => (
            "DELETE FROM comment WHERE author_id = $1 RETURNING NULL::TEXT",
            id.as_i64(),
        ),
        DeletionStep::ContentOwnedBy(id) => (
            "DELETE FROM content_item WHERE owner_id = $1 RETURNING featured_image",
            id.as_i64(),
        ),
        DeletionStep::ContentItem(id) => (
            "DELETE FROM content_item WHERE id = $1 RETURNING featured_image",
            id.as_i64(),
        ),
        DeletionStep::Account(id) => (
            "DELETE FROM account WHERE id = $1 RETURNING avatar",
            id.as_i64(),
        ),
    };

    sqlx::query_scalar(sql).bind(id).fetch_all(&mut **tx).await
}

#[async_trait]
impl RecordStore for PgStore {
    #[instrument(skip(self, plan), fields(target = ?plan.target()))]
    async fn execute_deletion(
        &self,
        plan: &DeletionPlan,
    ) -> Result<DeletionOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut outcome = DeletionOutcome::default();
        let last = plan.steps().len().saturating_sub(1);

        for (index, step) in plan.steps().iter().copied().enumerate() {
            let deleted = run_step(&mut tx, step).await.map_err(map_write_error)?;

            if index == last && deleted.is_empty() {
                // Dropping the transaction rolls it back.
                return Err(RepositoryError::NotFound);
            }

            let rows = deleted.len() as u64;
            tracing::debug!(step = step.label(), rows, "Deletion step");
            for name in deleted.into_iter().flatten() {
                let asset = AssetRef::try_from(name).map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid asset in database: {e}"))
                })?;
                outcome.assets.push(asset);
            }
            outcome.rows.push((step, rows));
        }

        tx.commit().await?;
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn referenced_assets(&self) -> Result<Vec<AssetRef>, RepositoryError> {
        let names: Vec<String> = sqlx::query_scalar(
            r"
            SELECT avatar FROM account WHERE avatar IS NOT NULL
            UNION
            SELECT featured_image FROM content_item WHERE featured_image IS NOT NULL
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        names
            .into_iter()
            .map(|name| {
                AssetRef::try_from(name).map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid asset in database: {e}"))
                })
            })
            .collect()
    }
}
