//! Slug allocation.
//!
//! Slugs are derived from titles: every run of characters outside
//! `[A-Za-z0-9-]` becomes a single `-`, the result is lowercased and trimmed
//! of `-`. Collisions within a content kind get a numeric suffix (`-1`,
//! `-2`, ...). The store's unique constraint is the final word: a write
//! rejected on the slug constraint is retried with the next free suffix.

use std::future::Future;
use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use tracing::instrument;

use folio_core::{ContentItemId, ContentKind, Slug};

use crate::error::LifecycleError;
use crate::store::{ContentStore, RepositoryError, constraints};

/// Maximum length of the title-derived part of a slug.
pub const MAX_SLUG_LENGTH: usize = 200;

/// Write attempts before giving up on a contended slug.
pub const MAX_ATTEMPTS: u32 = 5;

const PLACEHOLDER_PREFIX: &str = "item";
const PLACEHOLDER_SUFFIX_LENGTH: usize = 6;

/// Runs of characters that cannot appear in a slug.
static NON_SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9-]+").expect("Invalid regex"));

/// Normalise a title. May return an empty string.
///
/// ```
/// use folio_cms::services::slug::slugify;
///
/// assert_eq!(slugify("Hello, World! 2024"), "hello-world-2024");
/// assert_eq!(slugify("  --Rust & You--  "), "rust-you");
/// assert_eq!(slugify("日本語"), "");
/// ```
#[must_use]
pub fn slugify(title: &str) -> String {
    let replaced = NON_SLUG_RE.replace_all(title, "-").to_ascii_lowercase();
    let capped: String = replaced
        .trim_matches('-')
        .chars()
        .take(MAX_SLUG_LENGTH)
        .collect();
    capped.trim_matches('-').to_owned()
}

/// The base candidate for a title, falling back to a random placeholder
/// when the title has no slug characters.
#[must_use]
pub fn candidate(title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        placeholder()
    } else {
        slug
    }
}

fn placeholder() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    let suffix: String = (0..PLACEHOLDER_SUFFIX_LENGTH)
        .filter_map(|_| CHARSET.get(rng.random_range(0..CHARSET.len())))
        .map(|&b| char::from(b))
        .collect();
    format!("{PLACEHOLDER_PREFIX}-{suffix}")
}

fn with_counter(base: &str, counter: u32) -> String {
    if counter == 0 {
        base.to_owned()
    } else {
        format!("{base}-{counter}")
    }
}

/// Allocates slugs unique within a content kind.
pub struct SlugAllocator<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: ContentStore + ?Sized> SlugAllocator<'a, S> {
    /// Create an allocator over a content store.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// The first free slug for `title` in `kind`, ignoring the item
    /// `exclude` (the item being edited).
    ///
    /// The result is only a proposal: another writer can take it before it
    /// is stored. Use [`Self::insert_with_slug`] to write it.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Store` if the store cannot be queried.
    #[instrument(skip(self))]
    pub async fn allocate(
        &self,
        title: &str,
        kind: ContentKind,
        exclude: Option<ContentItemId>,
    ) -> Result<Slug, LifecycleError> {
        let base = candidate(title);
        let (slug, _) = self.probe(&base, kind, exclude, 0).await?;
        Ok(slug)
    }

    /// Allocate a slug and hand it to `write`, retrying with the next
    /// suffix whenever the store rejects the write on the slug constraint.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::AllocationExhausted` after
    /// [`MAX_ATTEMPTS`] rejected writes. Any other write error is returned
    /// unchanged.
    #[instrument(skip(self, write))]
    pub async fn insert_with_slug<T, F, Fut>(
        &self,
        title: &str,
        kind: ContentKind,
        exclude: Option<ContentItemId>,
        mut write: F,
    ) -> Result<T, LifecycleError>
    where
        F: FnMut(Slug) -> Fut,
        Fut: Future<Output = Result<T, RepositoryError>>,
    {
        let base = candidate(title);
        let mut next = 0;

        for attempt in 1..=MAX_ATTEMPTS {
            let (slug, counter) = self.probe(&base, kind, exclude, next).await?;
            match write(slug.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_conflict_on(constraints::CONTENT_SLUG) => {
                    tracing::debug!(attempt, %slug, "Slug taken by a concurrent write, retrying");
                    next = counter.saturating_add(1);
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(%base, attempts = MAX_ATTEMPTS, "Slug allocation exhausted");
        Err(LifecycleError::AllocationExhausted {
            attempts: MAX_ATTEMPTS,
        })
    }

    /// First free `base`, `base-1`, `base-2`, ... starting at `start`.
    async fn probe(
        &self,
        base: &str,
        kind: ContentKind,
        exclude: Option<ContentItemId>,
        start: u32,
    ) -> Result<(Slug, u32), LifecycleError> {
        let mut counter = start;
        loop {
            let candidate = with_counter(base, counter);
            if !self.store.slug_taken(kind, &candidate, exclude).await? {
                let slug = Slug::parse(&candidate).ok_or_else(|| {
                    LifecycleError::Internal(format!("generated slug is invalid: {candidate}"))
                })?;
                return Ok((slug, counter));
            }
            counter = counter.saturating_add(1);
        }
    }
}
