//! URL-safe content identifiers.

use core::fmt;

use serde::{Deserialize, Serialize};

#[cfg(feature = "postgres")]
use super::impl_pg_text;

/// A URL-safe, human-readable identifier for a content item.
///
/// Slugs are lowercase ASCII letters, digits and hyphens, never starting or
/// ending with a hyphen. They are derived from titles by the slug allocator in
/// `folio-cms`; [`Slug::parse`] only checks the shape, e.g. for lookups from a
/// request path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Check the shape of an existing slug.
    ///
    /// Returns `None` if the input is empty, has a leading/trailing hyphen, or
    /// contains anything other than `[a-z0-9-]`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let valid = !s.is_empty()
            && !s.starts_with('-')
            && !s.ends_with('-')
            && s.bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
        valid.then(|| Self(s.to_owned()))
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the slug and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl_pg_text!(Slug);
