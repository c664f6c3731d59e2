//! References to stored binary assets.

use core::fmt;

use serde::{Deserialize, Serialize};

#[cfg(feature = "postgres")]
use super::impl_pg_text;

/// Errors that can occur when parsing an [`AssetRef`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetRefError {
    /// The name is empty.
    #[error("asset name cannot be empty")]
    Empty,
    /// The name is longer than the maximum.
    #[error("asset name must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The name contains a path separator, a leading dot, or other unsafe characters.
    #[error("asset name contains unsafe characters")]
    Unsafe,
}

/// The storage name of a blob owned by exactly one record field.
///
/// Asset names are generated by the asset lifecycle manager and are always a
/// single path component made of `[A-Za-z0-9._-]` that does not start with a
/// dot, so they can be joined onto a storage root without escaping it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct AssetRef(String);

impl AssetRef {
    /// Maximum length of an asset name.
    pub const MAX_LENGTH: usize = 255;

    /// Validate a stored asset name.
    ///
    /// # Errors
    ///
    /// Returns an [`AssetRefError`] if the name is empty, too long, or not a
    /// single safe path component.
    pub fn parse(s: &str) -> Result<Self, AssetRefError> {
        if s.is_empty() {
            return Err(AssetRefError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(AssetRefError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        let safe = !s.starts_with('.')
            && s.bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
        if !safe {
            return Err(AssetRefError::Unsafe);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the asset name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AssetRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AssetRef {
    type Error = AssetRefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AssetRef> for String {
    fn from(value: AssetRef) -> Self {
        value.0
    }
}

#[cfg(feature = "postgres")]
impl_pg_text!(AssetRef);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generated_names() {
        assert!(AssetRef::parse("post_0f8e2b7c9d4a4e1f8a3b6c5d2e1f0a9b.jpg").is_ok());
        assert!(AssetRef::parse("profile_abc-123.png").is_ok());
    }

    #[test]
    fn test_parse_rejects_traversal() {
        assert_eq!(AssetRef::parse("../secret"), Err(AssetRefError::Unsafe));
        assert_eq!(AssetRef::parse("a/b.png"), Err(AssetRefError::Unsafe));
        assert_eq!(AssetRef::parse("a\\b.png"), Err(AssetRefError::Unsafe));
        assert_eq!(AssetRef::parse(".hidden"), Err(AssetRefError::Unsafe));
        assert_eq!(AssetRef::parse(""), Err(AssetRefError::Empty));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<AssetRef, _> = serde_json::from_str("\"post_1.gif\"");
        assert!(ok.is_ok());
        let bad: Result<AssetRef, _> = serde_json::from_str("\"../x\"");
        assert!(bad.is_err());
    }
}
