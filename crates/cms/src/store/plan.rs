//! Ordered deletion plans.

use folio_core::{AccountId, AssetRef, CommentId, ContentItemId};

/// One set-oriented delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionStep {
    /// A single comment.
    Comment(CommentId),
    /// Every comment on one content item.
    CommentsOnContent(ContentItemId),
    /// Every comment on content owned by an account.
    CommentsOnContentOwnedBy(AccountId),
    /// Every comment written by an account.
    CommentsByAuthor(AccountId),
    /// Every content item owned by an account.
    ContentOwnedBy(AccountId),
    /// One content item.
    ContentItem(ContentItemId),
    /// One account.
    Account(AccountId),
}

impl DeletionStep {
    /// Short label used in logs and reports.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Comment(_) => "comment",
            Self::CommentsOnContent(_) => "comments_on_content",
            Self::CommentsOnContentOwnedBy(_) => "comments_on_owned_content",
            Self::CommentsByAuthor(_) => "comments_by_author",
            Self::ContentOwnedBy(_) => "owned_content",
            Self::ContentItem(_) => "content_item",
            Self::Account(_) => "account",
        }
    }

    /// Whether the step removes comment rows.
    #[must_use]
    pub const fn deletes_comments(&self) -> bool {
        matches!(
            self,
            Self::Comment(_)
                | Self::CommentsOnContent(_)
                | Self::CommentsOnContentOwnedBy(_)
                | Self::CommentsByAuthor(_)
        )
    }

    /// Whether the step removes content rows.
    #[must_use]
    pub const fn deletes_content(&self) -> bool {
        matches!(self, Self::ContentOwnedBy(_) | Self::ContentItem(_))
    }
}

/// Dependents first, the target last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionPlan {
    steps: Vec<DeletionStep>,
}

impl DeletionPlan {
    /// Plan for deleting one comment.
    #[must_use]
    pub fn comment(id: CommentId) -> Self {
        Self {
            steps: vec![DeletionStep::Comment(id)],
        }
    }

    /// Plan for deleting a content item with its comments.
    #[must_use]
    pub fn content_item(id: ContentItemId) -> Self {
        Self {
            steps: vec![
                DeletionStep::CommentsOnContent(id),
                DeletionStep::ContentItem(id),
            ],
        }
    }

    /// Plan for deleting an account with everything hanging off it.
    #[must_use]
    pub fn account(id: AccountId) -> Self {
        Self {
            steps: vec![
                DeletionStep::CommentsOnContentOwnedBy(id),
                DeletionStep::CommentsByAuthor(id),
                DeletionStep::ContentOwnedBy(id),
                DeletionStep::Account(id),
            ],
        }
    }

    #[cfg(test)]
    pub(crate) const fn from_steps(steps: Vec<DeletionStep>) -> Self {
        Self { steps }
    }

    /// Steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[DeletionStep] {
        &self.steps
    }

    /// The step that removes the target itself.
    #[must_use]
    pub fn target(&self) -> Option<&DeletionStep> {
        self.steps.last()
    }
}

/// What a committed plan removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionOutcome {
    /// Rows deleted per step, in plan order.
    pub rows: Vec<(DeletionStep, u64)>,
    /// Assets held by deleted rows, in deletion order.
    pub assets: Vec<AssetRef>,
}

impl DeletionOutcome {
    /// Total comment rows deleted.
    #[must_use]
    pub fn comments(&self) -> u64 {
        self.count(DeletionStep::deletes_comments)
    }

    /// Total content rows deleted.
    #[must_use]
    pub fn content_items(&self) -> u64 {
        self.count(DeletionStep::deletes_content)
    }

    /// Total account rows deleted.
    #[must_use]
    pub fn accounts(&self) -> u64 {
        self.count(|step| matches!(step, DeletionStep::Account(_)))
    }

    fn count(&self, pred: impl Fn(&DeletionStep) -> bool) -> u64 {
        self.rows
            .iter()
            .filter(|(step, _)| pred(step))
            .map(|(_, n)| n)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_plan_deletes_children_first() {
        let id = AccountId::new(3);
        let plan = DeletionPlan::account(id);
        assert_eq!(
            plan.steps(),
            &[
                DeletionStep::CommentsOnContentOwnedBy(id),
                DeletionStep::CommentsByAuthor(id),
                DeletionStep::ContentOwnedBy(id),
                DeletionStep::Account(id),
            ]
        );
        assert_eq!(plan.target(), Some(&DeletionStep::Account(id)));
    }

    #[test]
    fn test_content_plan_deletes_comments_first() {
        let id = ContentItemId::new(9);
        let plan = DeletionPlan::content_item(id);
        assert_eq!(plan.steps().first(), Some(&DeletionStep::CommentsOnContent(id)));
        assert_eq!(plan.target(), Some(&DeletionStep::ContentItem(id)));
    }

    #[test]
    fn test_outcome_totals() {
        let id = AccountId::new(1);
        let outcome = DeletionOutcome {
            rows: vec![
                (DeletionStep::CommentsOnContentOwnedBy(id), 3),
                (DeletionStep::CommentsByAuthor(id), 2),
                (DeletionStep::ContentOwnedBy(id), 2),
                (DeletionStep::Account(id), 1),
            ],
            assets: Vec::new(),
        };
        assert_eq!(outcome.comments(), 5);
        assert_eq!(outcome.content_items(), 2);
        assert_eq!(outcome.accounts(), 1);
    }
}
