//! In-process record store.
//!
//! Enforces the same unique and foreign key constraints as the Postgres
//! schema and reports the same constraint names. Deletion plans run against a
//! copy of the tables that replaces the live tables only on success.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use folio_core::{
    AccountId, AssetRef, CommentId, CommentStatus, ContentItemId, ContentKind, Email, Role, Slug,
    Username,
};

use super::constraints;
use super::{
    AccountStore, CommentStore, ContentStore, DeletionOutcome, DeletionPlan, DeletionStep,
    RecordStore, RepositoryError,
};
use crate::journal::{Journal, JournalEntry};
use crate::models::{
    Account, AccountCredentials, Comment, CommentFilter, ContentChanges, ContentFilter,
    ContentItem, NewAccount, NewComment, NewContentRecord, ProfileChanges,
};

/// A failure to inject into the next write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFault {
    /// Reject the write as if a concurrent writer took the slug.
    SlugConflict,
    /// Reject the write as if a concurrent registration took the username
    /// or email. Carries the unique constraint name.
    IdentityConflict(&'static str),
    /// Fail the write as if the database were unreachable.
    Unavailable,
}

impl StoreFault {
    fn into_error(self) -> RepositoryError {
        match self {
            Self::SlugConflict => conflict(constraints::CONTENT_SLUG),
            Self::IdentityConflict(constraint) => conflict(constraint),
            Self::Unavailable => RepositoryError::Database(sqlx::Error::PoolTimedOut),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredAccount {
    account: Account,
    password_hash: String,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    accounts: BTreeMap<AccountId, StoredAccount>,
    content: BTreeMap<ContentItemId, ContentItem>,
    comments: BTreeMap<CommentId, Comment>,
    last_id: i64,
}

impl Tables {
    const fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn check_identity(
        &self,
        username: &Username,
        email: &Email,
        exclude: Option<AccountId>,
    ) -> Result<(), RepositoryError> {
        let others = self
            .accounts
            .values()
            .map(|stored| &stored.account)
            .filter(|account| Some(account.id) != exclude);
        for account in others {
            if &account.username == username {
                return Err(conflict(constraints::ACCOUNT_USERNAME));
            }
            if &account.email == email {
                return Err(conflict(constraints::ACCOUNT_EMAIL));
            }
        }
        Ok(())
    }

    fn check_slug(
        &self,
        kind: ContentKind,
        slug: &Slug,
        exclude: Option<ContentItemId>,
    ) -> Result<(), RepositoryError> {
        let taken = self
            .content
            .values()
            .any(|item| item.kind == kind && &item.slug == slug && Some(item.id) != exclude);
        if taken {
            return Err(conflict(constraints::CONTENT_SLUG));
        }
        Ok(())
    }

    /// Foreign keys are `ON DELETE RESTRICT`.
    fn owner_of(&self, id: ContentItemId) -> Option<AccountId> {
        self.content.get(&id).map(|item| item.owner_id)
    }

    fn check_references(&self) -> Result<(), RepositoryError> {
        for comment in self.comments.values() {
            if !self.content.contains_key(&comment.content_id) {
                return Err(conflict(constraints::COMMENT_CONTENT));
            }
            if !self.accounts.contains_key(&comment.author_id) {
                return Err(conflict(constraints::COMMENT_AUTHOR));
            }
        }
        if self
            .content
            .values()
            .any(|item| !self.accounts.contains_key(&item.owner_id))
        {
            return Err(conflict(constraints::CONTENT_OWNER));
        }
        Ok(())
    }

    /// Apply one step, returning the row count and released assets.
    fn apply(&mut self, step: DeletionStep) -> (u64, Vec<AssetRef>) {
        let owned: Vec<ContentItemId> = match step {
            DeletionStep::CommentsOnContentOwnedBy(owner) | DeletionStep::ContentOwnedBy(owner) => {
                self.content
                    .values()
                    .filter(|item| item.owner_id == owner)
                    .map(|item| item.id)
                    .collect()
            }
            _ => Vec::new(),
        };

        let before_comments = self.comments.len();
        match step {
            DeletionStep::Comment(id) => {
                self.comments.remove(&id);
            }
            DeletionStep::CommentsOnContent(id) => {
                self.comments.retain(|_, c| c.content_id != id);
            }
            DeletionStep::CommentsOnContentOwnedBy(_) => {
                self.comments.retain(|_, c| !owned.contains(&c.content_id));
            }
            DeletionStep::CommentsByAuthor(author) => {
                self.comments.retain(|_, c| c.author_id != author);
            }
            DeletionStep::ContentOwnedBy(_) => {
                let items: Vec<ContentItem> = owned
                    .iter()
                    .filter_map(|id| self.content.remove(id))
                    .collect();
                let assets = items.iter().filter_map(|i| i.featured_image.clone()).collect();
                return (items.len() as u64, assets);
            }
            DeletionStep::ContentItem(id) => {
                return self.content.remove(&id).map_or((0, Vec::new()), |item| {
                    (1, item.featured_image.into_iter().collect())
                });
            }
            DeletionStep::Account(id) => {
                return self.accounts.remove(&id).map_or((0, Vec::new()), |stored| {
                    (1, stored.account.avatar.into_iter().collect())
                });
            }
        }
        ((before_comments - self.comments.len()) as u64, Vec::new())
    }
}

fn conflict(constraint: &str) -> RepositoryError {
    RepositoryError::Conflict(constraint.to_owned())
}

#[derive(Debug, Default)]
struct State {
    tables: Tables,
    faults: VecDeque<StoreFault>,
}

/// Record store held in process memory.
///
/// Cheap to clone; all clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    journal: Journal,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that records commits in `journal`.
    #[must_use]
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            state: Arc::default(),
            journal,
        }
    }

    /// Fail the next write with `fault`. Faults queue up in order.
    pub async fn inject(&self, fault: StoreFault) {
        self.state.lock().await.faults.push_back(fault);
    }

    /// Number of comment rows.
    pub async fn comment_count(&self) -> usize {
        self.state.lock().await.tables.comments.len()
    }

    /// Number of content rows.
    pub async fn content_count(&self) -> usize {
        self.state.lock().await.tables.content.len()
    }

    fn committed(&self, label: impl Into<String>) {
        self.journal.record(JournalEntry::Committed(label.into()));
    }
}

impl State {
    fn take_fault(&mut self) -> Result<(), RepositoryError> {
        self.faults.pop_front().map_or(Ok(()), |f| Err(f.into_error()))
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert_account(&self, new: &NewAccount) -> Result<Account, RepositoryError> {
        let mut state = self.state.lock().await;
        state.take_fault()?;
        state
            .tables
            .check_identity(&new.username, &new.email, None)?;

        let now = Utc::now();
        let account = Account {
            id: AccountId::new(state.tables.next_id()),
            username: new.username.clone(),
            email: new.email.clone(),
            role: new.role,
            avatar: new.avatar.clone(),
            created_at: now,
            updated_at: now,
        };
        state.tables.accounts.insert(
            account.id,
            StoredAccount {
                account: account.clone(),
                password_hash: new.password_hash.clone(),
            },
        );
        self.committed("insert_account");
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.tables.accounts.get(&id).map(|s| s.account.clone()))
    }

    async fn find_credentials(
        &self,
        login: &str,
    ) -> Result<Option<AccountCredentials>, RepositoryError> {
        let state = self.state.lock().await;
        let accounts = &state.tables.accounts;
        let found = accounts
            .values()
            .find(|s| s.account.username.as_str() == login)
            .or_else(|| {
                accounts
                    .values()
                    .find(|s| s.account.email.as_str() == login)
            });
        Ok(found.map(|s| AccountCredentials {
            account: s.account.clone(),
            password_hash: s.password_hash.clone(),
        }))
    }

    async fn password_hash(&self, id: AccountId) -> Result<Option<String>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .accounts
            .get(&id)
            .map(|s| s.password_hash.clone()))
    }

    async fn identity_taken(
        &self,
        username: &Username,
        email: &Email,
        exclude: Option<AccountId>,
    ) -> Result<bool, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .check_identity(username, email, exclude)
            .is_err())
    }

    async fn update_profile(
        &self,
        id: AccountId,
        changes: &ProfileChanges,
    ) -> Result<Account, RepositoryError> {
        let mut state = self.state.lock().await;
        state.take_fault()?;
        state
            .tables
            .check_identity(&changes.username, &changes.email, Some(id))?;
        let stored = state
            .tables
            .accounts
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;

        stored.account.username = changes.username.clone();
        stored.account.email = changes.email.clone();
        stored.account.avatar = changes.avatar.clone();
        stored.account.updated_at = Utc::now();
        let account = stored.account.clone();
        drop(state);

        self.committed("update_profile");
        Ok(account)
    }

    async fn set_password_hash(&self, id: AccountId, hash: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state.take_fault()?;
        let stored = state
            .tables
            .accounts
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        hash.clone_into(&mut stored.password_hash);
        stored.account.updated_at = Utc::now();
        drop(state);

        self.committed("set_password_hash");
        Ok(())
    }

    async fn set_role(&self, id: AccountId, role: Role) -> Result<Account, RepositoryError> {
        let mut state = self.state.lock().await;
        state.take_fault()?;
        let stored = state
            .tables
            .accounts
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        stored.account.role = role;
        stored.account.updated_at = Utc::now();
        let account = stored.account.clone();
        drop(state);

        self.committed("set_role");
        Ok(account)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .accounts
            .values()
            .rev()
            .map(|s| s.account.clone())
            .collect())
    }

    async fn count_accounts(&self) -> Result<i64, RepositoryError> {
        let state = self.state.lock().await;
        Ok(i64::try_from(state.tables.accounts.len()).unwrap_or(i64::MAX))
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn insert_content(
        &self,
        new: &NewContentRecord,
    ) -> Result<ContentItem, RepositoryError> {
        let mut state = self.state.lock().await;
        state.take_fault()?;
        state.tables.check_slug(new.kind, &new.slug, None)?;
        if !state.tables.accounts.contains_key(&new.owner_id) {
            return Err(conflict(constraints::CONTENT_OWNER));
        }

        let now = Utc::now();
        let item = ContentItem {
            id: ContentItemId::new(state.tables.next_id()),
            kind: new.kind,
            title: new.title.clone(),
            slug: new.slug.clone(),
            body: new.body.clone(),
            excerpt: new.excerpt.clone(),
            status: new.status,
            featured_image: new.featured_image.clone(),
            owner_id: new.owner_id,
            created_at: now,
            updated_at: now,
        };
        state.tables.content.insert(item.id, item.clone());
        drop(state);

        self.committed("insert_content");
        Ok(item)
    }

    async fn get_content(&self, id: ContentItemId) -> Result<Option<ContentItem>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.tables.content.get(&id).cloned())
    }

    async fn get_content_by_slug(
        &self,
        kind: ContentKind,
        slug: &Slug,
    ) -> Result<Option<ContentItem>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .content
            .values()
            .find(|item| item.kind == kind && &item.slug == slug)
            .cloned())
    }

    async fn slug_taken(
        &self,
        kind: ContentKind,
        slug: &str,
        exclude: Option<ContentItemId>,
    ) -> Result<bool, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.tables.content.values().any(|item| {
            item.kind == kind && item.slug.as_str() == slug && Some(item.id) != exclude
        }))
    }

    async fn update_content(
        &self,
        id: ContentItemId,
        changes: &ContentChanges,
    ) -> Result<ContentItem, RepositoryError> {
        let mut state = self.state.lock().await;
        state.take_fault()?;
        let kind = state
            .tables
            .content
            .get(&id)
            .ok_or(RepositoryError::NotFound)?
            .kind;
        state.tables.check_slug(kind, &changes.slug, Some(id))?;

        let item = state
            .tables
            .content
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        item.title.clone_from(&changes.title);
        item.slug = changes.slug.clone();
        item.body.clone_from(&changes.body);
        item.excerpt.clone_from(&changes.excerpt);
        item.status = changes.status;
        item.featured_image.clone_from(&changes.featured_image);
        item.updated_at = Utc::now();
        let item = item.clone();
        drop(state);

        self.committed("update_content");
        Ok(item)
    }

    async fn list_content(
        &self,
        filter: &ContentFilter,
    ) -> Result<Vec<ContentItem>, RepositoryError> {
        let state = self.state.lock().await;
        let matching = state
            .tables
            .content
            .values()
            .rev()
            .filter(|item| filter.matches(item))
            .cloned();
        Ok(match filter.limit.and_then(|n| usize::try_from(n).ok()) {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn count_content(&self, filter: &ContentFilter) -> Result<i64, RepositoryError> {
        let state = self.state.lock().await;
        let count = state
            .tables
            .content
            .values()
            .filter(|item| filter.matches(item))
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn insert_comment(&self, new: &NewComment) -> Result<Comment, RepositoryError> {
        let mut state = self.state.lock().await;
        state.take_fault()?;
        if !state.tables.content.contains_key(&new.content_id) {
            return Err(conflict(constraints::COMMENT_CONTENT));
        }
        if !state.tables.accounts.contains_key(&new.author_id) {
            return Err(conflict(constraints::COMMENT_AUTHOR));
        }

        let comment = Comment {
            id: CommentId::new(state.tables.next_id()),
            content_id: new.content_id,
            author_id: new.author_id,
            body: new.body.clone(),
            status: new.status,
            created_at: Utc::now(),
        };
        state.tables.comments.insert(comment.id, comment.clone());
        drop(state);

        self.committed("insert_comment");
        Ok(comment)
    }

    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.tables.comments.get(&id).cloned())
    }

    async fn set_comment_status(
        &self,
        id: CommentId,
        status: CommentStatus,
    ) -> Result<Comment, RepositoryError> {
        let mut state = self.state.lock().await;
        state.take_fault()?;
        let comment = state
            .tables
            .comments
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        comment.status = status;
        let comment = comment.clone();
        drop(state);

        self.committed("set_comment_status");
        Ok(comment)
    }

    async fn list_comments(
        &self,
        content_id: ContentItemId,
        status: Option<CommentStatus>,
    ) -> Result<Vec<Comment>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .comments
            .values()
            .filter(|c| c.content_id == content_id && status.is_none_or(|s| s == c.status))
            .cloned()
            .collect())
    }

    async fn find_comments(&self, filter: &CommentFilter) -> Result<Vec<Comment>, RepositoryError> {
        let state = self.state.lock().await;
        let limit = filter
            .limit
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(usize::MAX);
        Ok(state
            .tables
            .comments
            .values()
            .rev()
            .filter(|c| filter.matches(c, state.tables.owner_of(c.content_id)))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_comments(&self, filter: &CommentFilter) -> Result<i64, RepositoryError> {
        let state = self.state.lock().await;
        let count = state
            .tables
            .comments
            .values()
            .filter(|c| filter.matches(c, state.tables.owner_of(c.content_id)))
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn execute_deletion(
        &self,
        plan: &DeletionPlan,
    ) -> Result<DeletionOutcome, RepositoryError> {
        let mut state = self.state.lock().await;
        state.take_fault()?;

        let mut tables = state.tables.clone();
        let mut outcome = DeletionOutcome::default();
        let last = plan.steps().len().saturating_sub(1);

        for (index, step) in plan.steps().iter().copied().enumerate() {
            let (rows, assets) = tables.apply(step);
            tables.check_references()?;
            if index == last && rows == 0 {
                return Err(RepositoryError::NotFound);
            }
            outcome.rows.push((step, rows));
            outcome.assets.extend(assets);
        }

        state.tables = tables;
        drop(state);

        if let Some(target) = plan.target() {
            self.committed(format!("delete:{}", target.label()));
        }
        Ok(outcome)
    }

    async fn referenced_assets(&self) -> Result<Vec<AssetRef>, RepositoryError> {
        let state = self.state.lock().await;
        let avatars = state
            .tables
            .accounts
            .values()
            .filter_map(|s| s.account.avatar.clone());
        let images = state
            .tables
            .content
            .values()
            .filter_map(|item| item.featured_image.clone());
        Ok(avatars.chain(images).collect())
    }
}
