//! Content items: posts and employee records.

use std::sync::LazyLock;

use regex::Regex;
use tracing::instrument;

use folio_core::{ContentItemId, ContentKind, ContentStatus, Slug};

use super::assets::{AssetChange, AssetManager, AssetPolicy, Upload};
use super::credentials::not_found_as;
use super::guard::{Action, Guard};
use super::slug::SlugAllocator;
use crate::blob::BlobStore;
use crate::error::LifecycleError;
use crate::models::{
    ContentChanges, ContentFilter, ContentItem, NewContentRecord, SessionIdentity,
};
use crate::store::{ContentStore, RepositoryError, constraints};

/// Characters of body text used for a generated excerpt.
pub const EXCERPT_LENGTH: usize = 200;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid regex"));

/// Input for a new content item.
#[derive(Debug, Clone)]
pub struct NewContent {
    pub kind: ContentKind,
    pub title: String,
    pub body: String,
    /// Generated from the body when absent or blank.
    pub excerpt: Option<String>,
    pub status: ContentStatus,
    pub featured_image: Option<Upload>,
}

/// Input for editing a content item.
#[derive(Debug, Clone)]
pub struct ContentUpdate {
    pub title: String,
    pub body: String,
    /// Generated from the body when absent or blank.
    pub excerpt: Option<String>,
    pub status: ContentStatus,
    pub featured_image: AssetChange,
}

/// Entity name used in `NotFound` errors.
#[must_use]
pub const fn entity_name(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Post => "post",
        ContentKind::EmployeeRecord => "employee record",
    }
}

/// First [`EXCERPT_LENGTH`] characters of the body with markup removed,
/// followed by `...`.
#[must_use]
pub fn generate_excerpt(body: &str) -> String {
    let text = TAG_RE.replace_all(body, "");
    let mut excerpt: String = text.trim().chars().take(EXCERPT_LENGTH).collect();
    excerpt.push_str("...");
    excerpt
}

/// Content creation, editing, and lookup.
pub struct ContentService<'a, S: ?Sized, B: ?Sized> {
    store: &'a S,
    assets: AssetManager<'a, B>,
    image_policy: AssetPolicy,
    guard: Guard,
}

impl<'a, S, B> ContentService<'a, S, B>
where
    S: ContentStore + ?Sized,
    B: BlobStore + ?Sized,
{
    #[must_use]
    pub const fn new(store: &'a S, blobs: &'a B, image_policy: AssetPolicy, guard: Guard) -> Self {
        Self {
            store,
            assets: AssetManager::new(blobs),
            image_policy,
            guard,
        }
    }

    /// Create an item owned by the caller.
    ///
    /// The featured image is stored before the insert and released again
    /// if the insert fails.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for anonymous callers, `Validation` for a
    /// blank title or body, asset errors for a rejected image,
    /// `AllocationExhausted` if no slug could be written, and
    /// `NotFound` if the caller's account no longer exists.
    #[instrument(skip(self, identity, new), fields(owner = %identity.account_id, kind = %new.kind))]
    pub async fn create(
        &self,
        identity: &SessionIdentity,
        new: NewContent,
    ) -> Result<ContentItem, LifecycleError> {
        self.guard
            .check(Some(identity), Action::CreateContent, None)?;

        let (title, body) = validate(&new.title, &new.body)?;
        let excerpt = excerpt_or_generated(new.excerpt, &body);
        let change = new
            .featured_image
            .map_or(AssetChange::Keep, AssetChange::Replace);

        let store = self.store;
        let kind = new.kind;
        let status = new.status;
        let owner_id = identity.account_id;

        let item = self
            .assets
            .apply(None, change, &self.image_policy, move |featured_image| async move {
                SlugAllocator::new(store)
                    .insert_with_slug(&title, kind, None, |slug| {
                        insert_record(
                            store,
                            NewContentRecord {
                                kind,
                                title: title.clone(),
                                slug,
                                body: body.clone(),
                                excerpt: excerpt.clone(),
                                status,
                                featured_image: featured_image.clone(),
                                owner_id,
                            },
                        )
                    })
                    .await
                    .map_err(owner_write_error)
            })
            .await?;

        tracing::info!(id = %item.id, slug = %item.slug, "Created content item");
        Ok(item)
    }

    /// Edit an item. The slug is regenerated only when the title changes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown item or a draft the caller cannot
    /// see, `Unauthorized` if the caller may not edit it, plus the validation and asset errors of
    /// [`Self::create`].
    #[instrument(skip(self, identity, update), fields(actor = %identity.account_id))]
    pub async fn update(
        &self,
        identity: &SessionIdentity,
        id: ContentItemId,
        update: ContentUpdate,
    ) -> Result<ContentItem, LifecycleError> {
        let current = self
            .store
            .get_content(id)
            .await?
            .ok_or(LifecycleError::NotFound("content item"))?;
        let entity = entity_name(current.kind);

        // A draft the caller cannot see is missing, not forbidden.
        let current = self.visible(Some(identity), current)?;
        self.guard
            .check(Some(identity), Action::EditContent, Some(current.owner_id))?;

        let (title, body) = validate(&update.title, &update.body)?;
        let excerpt = excerpt_or_generated(update.excerpt, &body);
        let title_changed = title != current.title;

        let store = self.store;
        let kind = current.kind;
        let status = update.status;
        let current_slug = current.slug.clone();

        let item = self
            .assets
            .apply(
                current.featured_image.as_ref(),
                update.featured_image,
                &self.image_policy,
                move |featured_image| async move {
                    if !title_changed {
                        let changes = ContentChanges {
                            title,
                            slug: current_slug,
                            body,
                            excerpt,
                            status,
                            featured_image,
                        };
                        return store
                            .update_content(id, &changes)
                            .await
                            .map_err(|e| not_found_as(e, entity));
                    }

                    SlugAllocator::new(store)
                        .insert_with_slug(&title, kind, Some(id), |slug| {
                            update_record(
                                store,
                                id,
                                ContentChanges {
                                    title: title.clone(),
                                    slug,
                                    body: body.clone(),
                                    excerpt: excerpt.clone(),
                                    status,
                                    featured_image: featured_image.clone(),
                                },
                            )
                        })
                        .await
                        .map_err(|e| match e {
                            LifecycleError::Store(RepositoryError::NotFound) => {
                                LifecycleError::NotFound(entity)
                            }
                            other => other,
                        })
                },
            )
            .await?;

        if title_changed {
            tracing::info!(%id, slug = %item.slug, "Updated content item with new slug");
        } else {
            tracing::info!(%id, "Updated content item");
        }
        Ok(item)
    }

    /// Look up an item by slug.
    ///
    /// Items the caller may not view are reported as missing.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown and hidden items alike.
    pub async fn get_by_slug(
        &self,
        identity: Option<&SessionIdentity>,
        kind: ContentKind,
        slug: &str,
    ) -> Result<ContentItem, LifecycleError> {
        let not_found = LifecycleError::NotFound(entity_name(kind));
        let Some(slug) = Slug::parse(slug) else {
            return Err(not_found);
        };
        let item = self
            .store
            .get_content_by_slug(kind, &slug)
            .await?
            .ok_or(not_found)?;
        self.visible(identity, item)
    }

    /// Look up an item by ID, hiding items the caller may not view.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown and hidden items alike.
    pub async fn get(
        &self,
        identity: Option<&SessionIdentity>,
        id: ContentItemId,
    ) -> Result<ContentItem, LifecycleError> {
        let item = self
            .store
            .get_content(id)
            .await?
            .ok_or(LifecycleError::NotFound("content item"))?;
        self.visible(identity, item)
    }

    fn visible(
        &self,
        identity: Option<&SessionIdentity>,
        item: ContentItem,
    ) -> Result<ContentItem, LifecycleError> {
        let decision = self.guard.authorize(
            identity,
            Action::ViewContent(item.status),
            Some(item.owner_id),
        );
        if decision.is_allowed() {
            Ok(item)
        } else {
            Err(LifecycleError::NotFound(entity_name(item.kind)))
        }
    }

    /// Items visible in the caller's dashboard.
    ///
    /// Members only see their own items; administrators see everything the
    /// filter matches.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the query fails.
    pub async fn list(
        &self,
        identity: &SessionIdentity,
        filter: ContentFilter,
    ) -> Result<Vec<ContentItem>, LifecycleError> {
        let filter = scoped(identity, filter);
        Ok(self.store.list_content(&filter).await?)
    }

    /// Number of items [`Self::list`] would return without a limit.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the query fails.
    pub async fn count(
        &self,
        identity: &SessionIdentity,
        filter: ContentFilter,
    ) -> Result<i64, LifecycleError> {
        let filter = scoped(identity, filter);
        Ok(self.store.count_content(&filter).await?)
    }

    /// Published items for public listings.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the query fails.
    pub async fn list_published(
        &self,
        filter: ContentFilter,
    ) -> Result<Vec<ContentItem>, LifecycleError> {
        let filter = ContentFilter {
            status: Some(ContentStatus::Published),
            ..filter
        };
        Ok(self.store.list_content(&filter).await?)
    }
}

fn scoped(identity: &SessionIdentity, filter: ContentFilter) -> ContentFilter {
    if identity.is_administrator() {
        filter
    } else {
        ContentFilter {
            owner: Some(identity.account_id),
            ..filter
        }
    }
}

fn validate(title: &str, body: &str) -> Result<(String, String), LifecycleError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(LifecycleError::Validation("Title is required.".to_owned()));
    }
    let body = body.trim();
    if body.is_empty() {
        return Err(LifecycleError::Validation("Content is required.".to_owned()));
    }
    Ok((title.to_owned(), body.to_owned()))
}

fn excerpt_or_generated(excerpt: Option<String>, body: &str) -> Option<String> {
    let given = excerpt
        .map(|e| e.trim().to_owned())
        .filter(|e| !e.is_empty());
    Some(given.unwrap_or_else(|| generate_excerpt(body)))
}

/// The owner was deleted while its session was still live.
fn owner_write_error(e: LifecycleError) -> LifecycleError {
    match e {
        LifecycleError::Store(ref r) if r.is_conflict_on(constraints::CONTENT_OWNER) => {
            LifecycleError::NotFound("account")
        }
        other => other,
    }
}

async fn insert_record<S: ContentStore + ?Sized>(
    store: &S,
    record: NewContentRecord,
) -> Result<ContentItem, RepositoryError> {
    store.insert_content(&record).await
}

async fn update_record<S: ContentStore + ?Sized>(
    store: &S,
    id: ContentItemId,
    changes: ContentChanges,
) -> Result<ContentItem, RepositoryError> {
    store.update_content(id, &changes).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use folio_core::{AccountId, Email, Role, Username};

    use super::*;
    use crate::blob::MemoryBlobStore;
    use crate::models::NewAccount;
    use crate::services::guard::DenyReason;
    use crate::store::{AccountStore, MemoryStore, StoreFault};

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    struct Fixture {
        store: MemoryStore,
        blobs: MemoryBlobStore,
        owner: SessionIdentity,
        other: SessionIdentity,
        admin: SessionIdentity,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = MemoryStore::new();
            let owner = add_account(&store, "owner", Role::Member).await;
            let other = add_account(&store, "other", Role::Member).await;
            let admin = add_account(&store, "admin", Role::Administrator).await;
            Self {
                store,
                blobs: MemoryBlobStore::new(),
                owner,
                other,
                admin,
            }
        }

        fn content(&self) -> ContentService<'_, MemoryStore, MemoryBlobStore> {
            ContentService::new(
                &self.store,
                &self.blobs,
                AssetPolicy::featured_image(1024),
                Guard::default(),
            )
        }
    }

    async fn add_account(store: &MemoryStore, name: &str, role: Role) -> SessionIdentity {
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

    fn post(title: &str) -> NewContent {
        NewContent {
            kind: ContentKind::Post,
            title: title.to_owned(),
            body: "<p>Some <b>body</b> text.</p>".to_owned(),
            excerpt: None,
            status: ContentStatus::Published,
            featured_image: None,
        }
    }

    fn edit(title: &str, image: AssetChange) -> ContentUpdate {
        ContentUpdate {
            title: title.to_owned(),
            body: "Edited body".to_owned(),
            excerpt: Some("Custom excerpt".to_owned()),
            status: ContentStatus::Published,
            featured_image: image,
        }
    }

    fn image() -> Upload {
        Upload::new("cover.png", "image/png", PNG.to_vec())
    }

    #[test]
    fn test_generate_excerpt() {
        assert_eq!(generate_excerpt("<p>Hello <em>there</em></p>"), "Hello there...");
        let long = "x".repeat(500);
        assert_eq!(generate_excerpt(&long).chars().count(), EXCERPT_LENGTH + 3);
    }

    #[tokio::test]
    async fn test_create_generates_slug_and_excerpt() {
        let fx = Fixture::new().await;
        let content = fx.content();

        let first = content.create(&fx.owner, post("Hello, World! 2024")).await.unwrap();
        let second = content.create(&fx.other, post("Hello World 2024")).await.unwrap();

        assert_eq!(first.slug.as_str(), "hello-world-2024");
        assert_eq!(second.slug.as_str(), "hello-world-2024-1");
        assert_eq!(first.excerpt.as_deref(), Some("Some body text...."));
        assert_eq!(first.owner_id, fx.owner.account_id);
    }

    #[tokio::test]
    async fn test_slugs_are_scoped_by_kind() {
        let fx = Fixture::new().await;
        let content = fx.content();

        let post_item = content.create(&fx.owner, post("Jane Doe")).await.unwrap();
        let record = content
            .create(
                &fx.admin,
                NewContent {
                    kind: ContentKind::EmployeeRecord,
                    ..post("Jane Doe")
                },
            )
            .await
            .unwrap();
        assert_eq!(post_item.slug, record.slug);
    }

    #[tokio::test]
    async fn test_create_validates() {
        let fx = Fixture::new().await;
        let content = fx.content();

        let blank_title = content.create(&fx.owner, post("   ")).await.unwrap_err();
        assert_eq!(blank_title.user_message(), "Title is required.");

        let blank_body = content
            .create(
                &fx.owner,
                NewContent {
                    body: " ".to_owned(),
                    ..post("Title")
                },
            )
            .await
            .unwrap_err();
        assert_eq!(blank_body.user_message(), "Content is required.");
    }

    #[tokio::test]
    async fn test_failed_insert_releases_image() {
        let fx = Fixture::new().await;
        let content = fx.content();

        fx.store.inject(StoreFault::Unavailable).await;
        let result = content
            .create(
                &fx.owner,
                NewContent {
                    featured_image: Some(image()),
                    ..post("With image")
                },
            )
            .await;

        assert!(matches!(result, Err(LifecycleError::Store(_))));
        assert!(fx.blobs.is_empty().await);
        assert_eq!(fx.store.content_count().await, 0);
    }

    #[tokio::test]
    async fn test_update_regenerates_slug_only_on_title_change() {
        let fx = Fixture::new().await;
        let content = fx.content();
        let item = content.create(&fx.owner, post("Original")).await.unwrap();
        content.create(&fx.owner, post("Renamed")).await.unwrap();

        let same = content
            .update(&fx.owner, item.id, edit("Original", AssetChange::Keep))
            .await
            .unwrap();
        assert_eq!(same.slug.as_str(), "original");
        assert_eq!(same.excerpt.as_deref(), Some("Custom excerpt"));

        let renamed = content
            .update(&fx.owner, item.id, edit("Renamed", AssetChange::Keep))
            .await
            .unwrap();
        assert_eq!(renamed.slug.as_str(), "renamed-1");

        // Renaming back frees the old slug for the same item.
        let back = content
            .update(&fx.owner, item.id, edit("Original", AssetChange::Keep))
            .await
            .unwrap();
        assert_eq!(back.slug.as_str(), "original");
    }

    #[tokio::test]
    async fn test_update_retries_on_concurrent_slug() {
        let fx = Fixture::new().await;
        let content = fx.content();
        let item = content.create(&fx.owner, post("Draft title")).await.unwrap();

        fx.store.inject(StoreFault::SlugConflict).await;
        let renamed = content
            .update(&fx.owner, item.id, edit("Final title", AssetChange::Keep))
            .await
            .unwrap();
        assert_eq!(renamed.slug.as_str(), "final-title-1");
    }

    #[tokio::test]
    async fn test_update_requires_ownership() {
        let fx = Fixture::new().await;
        let content = fx.content();
        let item = content.create(&fx.owner, post("Mine")).await.unwrap();

        let denied = content
            .update(&fx.other, item.id, edit("Theirs", AssetChange::Replace(image())))
            .await;
        assert!(matches!(
            denied,
            Err(LifecycleError::Unauthorized(DenyReason::NotOwner))
        ));
        assert!(fx.blobs.is_empty().await);

        content
            .update(&fx.admin, item.id, edit("Moderated", AssetChange::Keep))
            .await
            .unwrap();

        let draft = content
            .create(
                &fx.owner,
                NewContent {
                    status: ContentStatus::Draft,
                    ..post("Unannounced")
                },
            )
            .await
            .unwrap();
        let hidden = content
            .update(&fx.other, draft.id, edit("Announced", AssetChange::Keep))
            .await;
        assert!(matches!(hidden, Err(LifecycleError::NotFound("post"))));

        let missing = content
            .update(&fx.admin, ContentItemId::new(999), edit("x", AssetChange::Keep))
            .await;
        assert!(matches!(missing, Err(LifecycleError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_for_deleted_owner_is_not_found() {
        let fx = Fixture::new().await;
        let content = fx.content();
        let gone = SessionIdentity {
            account_id: AccountId::new(999),
            role: Role::Member,
        };

        let err = content
            .create(
                &gone,
                NewContent {
                    featured_image: Some(image()),
                    ..post("Orphan")
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::NotFound("account")));
        assert!(!err.is_internal());
        assert!(fx.blobs.is_empty().await);
        assert_eq!(fx.store.content_count().await, 0);
    }

    #[tokio::test]
    async fn test_update_replaces_image() {
        let fx = Fixture::new().await;
        let content = fx.content();
        let item = content
            .create(
                &fx.owner,
                NewContent {
                    featured_image: Some(image()),
                    ..post("Pictured")
                },
            )
            .await
            .unwrap();
        let old = item.featured_image.clone().unwrap();
        assert!(old.as_str().starts_with("post_"));

        let updated = content
            .update(&fx.owner, item.id, edit("Pictured", AssetChange::Replace(image())))
            .await
            .unwrap();
        let new = updated.featured_image.unwrap();
        assert_ne!(new, old);
        assert_eq!(fx.blobs.list().await.unwrap(), vec![new]);

        let cleared = content
            .update(&fx.owner, item.id, edit("Pictured", AssetChange::Remove))
            .await
            .unwrap();
        assert_eq!(cleared.featured_image, None);
        assert!(fx.blobs.is_empty().await);
    }

    #[tokio::test]
    async fn test_drafts_are_hidden() {
        let fx = Fixture::new().await;
        let content = fx.content();
        let draft = content
            .create(
                &fx.owner,
                NewContent {
                    status: ContentStatus::Draft,
                    ..post("Secret plans")
                },
            )
            .await
            .unwrap();

        for viewer in [None, Some(&fx.other)] {
            let err = content
                .get_by_slug(viewer, ContentKind::Post, "secret-plans")
                .await
                .unwrap_err();
            assert_eq!(err.user_message(), "Post not found.");
        }
        for viewer in [&fx.owner, &fx.admin] {
            let found = content
                .get_by_slug(Some(viewer), ContentKind::Post, "secret-plans")
                .await
                .unwrap();
            assert_eq!(found.id, draft.id);
        }
        assert!(content.get(None, draft.id).await.is_err());
        assert!(content
            .get_by_slug(None, ContentKind::Post, "../etc")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_owner_for_members() {
        let fx = Fixture::new().await;
        let content = fx.content();
        content.create(&fx.owner, post("One")).await.unwrap();
        content.create(&fx.owner, post("Two")).await.unwrap();
        content
            .create(
                &fx.other,
                NewContent {
                    status: ContentStatus::Draft,
                    ..post("Three")
                },
            )
            .await
            .unwrap();

        let mine = content.list(&fx.owner, ContentFilter::default()).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|i| i.owner_id == fx.owner.account_id));

        let all = content.count(&fx.admin, ContentFilter::default()).await.unwrap();
        assert_eq!(all, 3);

        let published = content
            .list_published(ContentFilter::default())
            .await
            .unwrap();
        assert_eq!(published.len(), 2);

        let searched = content
            .list(
                &fx.admin,
                ContentFilter {
                    search: Some("thr".to_owned()),
                    ..ContentFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(searched.len(), 1);
        assert_eq!(searched.first().map(|i| i.title.as_str()), Some("Three"));
    }
}
