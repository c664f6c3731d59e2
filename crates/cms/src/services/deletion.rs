//! Cascading deletion coordinator.
//!
//! Deletion runs in three phases:
//!
//! 1. authorize and resolve the target,
//! 2. execute a [`DeletionPlan`] (children first) in one store transaction,
//! 3. release every asset the deleted rows referenced.
//!
//! Nothing is released unless the transaction committed. A failed release
//! only orphans a file.

use tracing::instrument;

use folio_core::{AccountId, AssetRef, ContentItemId};

use super::assets::AssetManager;
use super::content::entity_name;
use super::credentials::not_found_as;
use super::guard::{Action, Guard};
use crate::blob::BlobStore;
use crate::error::LifecycleError;
use crate::models::SessionIdentity;
use crate::store::{DeletionOutcome, DeletionPlan, RecordStore};

/// What a cascading deletion removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    /// Comment rows deleted.
    pub comments: u64,
    /// Content rows deleted.
    pub content_items: u64,
    /// Account rows deleted.
    pub accounts: u64,
    /// Assets released after the commit.
    pub released: Vec<AssetRef>,
    /// Assets whose release failed and that now have no owner.
    pub orphaned: Vec<AssetRef>,
}

/// Deletes accounts and content items together with their dependents.
pub struct DeletionCoordinator<'a, S: ?Sized, B: ?Sized> {
    store: &'a S,
    assets: AssetManager<'a, B>,
    guard: Guard,
}

impl<'a, S, B> DeletionCoordinator<'a, S, B>
where
    S: RecordStore + ?Sized,
    B: BlobStore + ?Sized,
{
    #[must_use]
    pub const fn new(store: &'a S, blobs: &'a B, guard: Guard) -> Self {
        Self {
            store,
            assets: AssetManager::new(blobs),
            guard,
        }
    }

    /// Delete an account, its content, every comment on that content, and
    /// every comment it wrote.
    ///
    /// # Errors
    ///
    /// Returns `SelfDeletion` when the actor targets their own account,
    /// `Unauthorized` for members, and `NotFound` for an unknown account.
    #[instrument(skip(self, actor), fields(actor = %actor.account_id))]
    pub async fn delete_account(
        &self,
        actor: &SessionIdentity,
        id: AccountId,
    ) -> Result<DeletionReport, LifecycleError> {
        self.guard
            .check(Some(actor), Action::DeleteAccount(id), None)?;

        if self.store.get_account(id).await?.is_none() {
            return Err(LifecycleError::NotFound("account"));
        }

        let outcome = self
            .store
            .execute_deletion(&DeletionPlan::account(id))
            .await
            .map_err(|e| not_found_as(e, "account"))?;

        let report = self.release(outcome).await;
        tracing::info!(
            comments = report.comments,
            content_items = report.content_items,
            released = report.released.len(),
            orphaned = report.orphaned.len(),
            "Deleted account"
        );
        Ok(report)
    }

    /// Delete a content item and its comments.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if the actor may not delete the item and
    /// `NotFound` for an unknown item or a draft the actor cannot see.
    #[instrument(skip(self, actor), fields(actor = %actor.account_id))]
    pub async fn delete_content_item(
        &self,
        actor: &SessionIdentity,
        id: ContentItemId,
    ) -> Result<DeletionReport, LifecycleError> {
        let item = self
            .store
            .get_content(id)
            .await?
            .ok_or(LifecycleError::NotFound("content item"))?;

        let viewable = self.guard.authorize(
            Some(actor),
            Action::ViewContent(item.status),
            Some(item.owner_id),
        );
        if !viewable.is_allowed() {
            return Err(LifecycleError::NotFound(entity_name(item.kind)));
        }
        self.guard
            .check(Some(actor), Action::DeleteContent, Some(item.owner_id))?;

        let outcome = self
            .store
            .execute_deletion(&DeletionPlan::content_item(id))
            .await
            .map_err(|e| not_found_as(e, entity_name(item.kind)))?;

        let report = self.release(outcome).await;
        tracing::info!(
            comments = report.comments,
            released = report.released.len(),
            orphaned = report.orphaned.len(),
            "Deleted content item"
        );
        Ok(report)
    }

    async fn release(&self, outcome: DeletionOutcome) -> DeletionReport {
        let mut report = DeletionReport {
            comments: outcome.comments(),
            content_items: outcome.content_items(),
            accounts: outcome.accounts(),
            ..DeletionReport::default()
        };

        for asset in outcome.assets {
            if self.assets.release_committed(&asset).await {
                report.released.push(asset);
            } else {
                report.orphaned.push(asset);
            }
        }
        report
    }
}
