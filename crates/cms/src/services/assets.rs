//! Asset lifecycle manager.
//!
//! Owns every blob side effect. Uploads are validated before any write,
//! stored under a generated name, and bound to a record field through a
//! caller-supplied commit. The ordering is always:
//!
//! 1. write the new blob,
//! 2. commit the record change,
//! 3. release the old blob.
//!
//! A failed write leaves the old reference untouched. A failed commit
//! releases the new blob. A failed release after a successful commit only
//! orphans a file and is logged, never surfaced.

use std::fmt;
use std::future::Future;

use tracing::instrument;
use uuid::Uuid;

use folio_core::AssetRef;

use crate::blob::{BlobError, BlobStore};
use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::error::LifecycleError;

/// Filename prefix for featured images.
pub const FEATURED_IMAGE_PREFIX: &str = "post_";
/// Filename prefix for profile images.
pub const AVATAR_PREFIX: &str = "profile_";

/// Image formats recognised by signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageType {
    /// All recognised formats.
    pub const ALL: [Self; 4] = [Self::Jpeg, Self::Png, Self::Gif, Self::Webp];

    /// Canonical MIME type.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }

    /// Canonical file extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }

    /// Extensions a caller may use for this format.
    const fn accepted_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Jpeg => &["jpg", "jpeg"],
            Self::Png => &["png"],
            Self::Gif => &["gif"],
            Self::Webp => &["webp"],
        }
    }

    /// Parse a declared content type, ignoring parameters and case.
    #[must_use]
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Detect the format from the leading bytes.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WEBP".as_slice()) {
            Some(Self::Webp)
        } else {
            None
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// An uploaded file as received from the client.
#[derive(Clone)]
pub struct Upload {
    /// Client-supplied filename. Only its extension is ever used.
    pub filename: Option<String>,
    /// Client-declared content type.
    pub content_type: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl Upload {
    #[must_use]
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: Some(filename.into()),
            content_type: content_type.into(),
            bytes,
        }
    }

    fn extension(&self) -> Option<String> {
        let filename = self.filename.as_deref()?;
        let (_, ext) = filename.rsplit_once('.')?;
        let usable = !ext.is_empty() && ext.len() <= 5 && ext.bytes().all(|b| b.is_ascii_alphanumeric());
        usable.then(|| ext.to_ascii_lowercase())
    }
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Accepted types, size limit, and filename prefix for one record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPolicy {
    pub allowed_types: Vec<ImageType>,
    pub max_bytes: usize,
    pub prefix: String,
}

impl AssetPolicy {
    /// Policy for content featured images.
    #[must_use]
    pub fn featured_image(max_bytes: usize) -> Self {
        Self {
            allowed_types: ImageType::ALL.to_vec(),
            max_bytes,
            prefix: FEATURED_IMAGE_PREFIX.to_owned(),
        }
    }

    /// Policy for account profile images.
    #[must_use]
    pub fn avatar(max_bytes: usize) -> Self {
        Self {
            allowed_types: ImageType::ALL.to_vec(),
            max_bytes,
            prefix: AVATAR_PREFIX.to_owned(),
        }
    }

    fn allows(&self, image_type: ImageType) -> bool {
        self.allowed_types.contains(&image_type)
    }
}

impl Default for AssetPolicy {
    fn default() -> Self {
        Self::featured_image(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

/// What to do with an asset field during an update.
#[derive(Debug, Clone, Default)]
pub enum AssetChange {
    /// Leave the field as it is.
    #[default]
    Keep,
    /// Store the upload and point the field at it.
    Replace(Upload),
    /// Clear the field.
    Remove,
}

/// Stores, replaces, and releases assets in a blob store.
pub struct AssetManager<'a, B: ?Sized> {
    blobs: &'a B,
}

impl<'a, B: BlobStore + ?Sized> AssetManager<'a, B> {
    /// Create a manager over a blob store.
    #[must_use]
    pub const fn new(blobs: &'a B) -> Self {
        Self { blobs }
    }

    /// Check an upload against a policy without writing anything.
    ///
    /// # Errors
    ///
    /// `TooLarge` if the upload exceeds the limit, checked before the type.
    /// `UnsupportedType` if the declared type or the detected signature is
    /// not allowed.
    pub fn validate(upload: &Upload, policy: &AssetPolicy) -> Result<ImageType, LifecycleError> {
        if upload.bytes.len() > policy.max_bytes {
            return Err(LifecycleError::TooLarge {
                max_bytes: policy.max_bytes,
            });
        }

        let declared = ImageType::from_mime(&upload.content_type)
            .filter(|t| policy.allows(*t))
            .ok_or(LifecycleError::UnsupportedType)?;
        let detected = ImageType::sniff(&upload.bytes)
            .filter(|t| policy.allows(*t))
            .ok_or(LifecycleError::UnsupportedType)?;

        if declared != detected {
            tracing::debug!(%declared, %detected, "Declared content type differs from signature");
        }
        Ok(detected)
    }

    /// Validate and write an upload under a fresh name.
    ///
    /// # Errors
    ///
    /// Validation errors from [`Self::validate`], or `WriteFailed` if the
    /// blob store rejects the write.
    #[instrument(skip(self, upload, policy), fields(prefix = %policy.prefix, len = upload.bytes.len()))]
    pub async fn store(&self, upload: &Upload, policy: &AssetPolicy) -> Result<AssetRef, LifecycleError> {
        let image_type = Self::validate(upload, policy)?;
        let extension = upload
            .extension()
            .filter(|ext| image_type.accepted_extensions().contains(&ext.as_str()))
            .unwrap_or_else(|| image_type.extension().to_owned());
        let name = AssetRef::parse(&format!(
            "{}{}.{extension}",
            policy.prefix,
            Uuid::new_v4().simple()
        ))?;

        self.blobs
            .write(&name, &upload.bytes)
            .await
            .map_err(LifecycleError::WriteFailed)?;

        tracing::info!(asset = %name, "Stored asset");
        Ok(name)
    }

    /// Delete a blob. Releasing a missing blob succeeds.
    ///
    /// # Errors
    ///
    /// Returns the blob store error if the delete itself fails.
    pub async fn release(&self, asset: &AssetRef) -> Result<(), BlobError> {
        self.blobs.delete(asset).await
    }

    /// Release after the owning record change is committed. Failures are
    /// logged as orphaned assets. Returns whether the release succeeded.
    pub async fn release_committed(&self, asset: &AssetRef) -> bool {
        match self.release(asset).await {
            Ok(()) => {
                tracing::debug!(%asset, "Released asset");
                true
            }
            Err(e) => {
                tracing::warn!(%asset, error = %e, "Orphaned asset: release failed");
                false
            }
        }
    }

    /// Store `upload`, commit it, then release `old`.
    ///
    /// # Errors
    ///
    /// See [`Self::apply`].
    pub async fn replace<T, F, Fut>(
        &self,
        old: Option<&AssetRef>,
        upload: Upload,
        policy: &AssetPolicy,
        commit: F,
    ) -> Result<T, LifecycleError>
    where
        F: FnOnce(Option<AssetRef>) -> Fut,
        Fut: Future<Output = Result<T, LifecycleError>>,
    {
        self.apply(old, AssetChange::Replace(upload), policy, commit)
            .await
    }

    /// Apply an [`AssetChange`] to a field currently holding `old`.
    ///
    /// `commit` receives the value the field must hold afterwards and
    /// persists the record. Blob side effects are ordered around it.
    ///
    /// # Errors
    ///
    /// Validation and write errors from [`Self::store`] (nothing is
    /// committed), or the error returned by `commit` (the new blob is
    /// released, the old one kept).
    pub async fn apply<T, F, Fut>(
        &self,
        old: Option<&AssetRef>,
        change: AssetChange,
        policy: &AssetPolicy,
        commit: F,
    ) -> Result<T, LifecycleError>
    where
        F: FnOnce(Option<AssetRef>) -> Fut,
        Fut: Future<Output = Result<T, LifecycleError>>,
    {
        match change {
            AssetChange::Keep => commit(old.cloned()).await,
            AssetChange::Replace(upload) => {
                let new = self.store(&upload, policy).await?;
                match commit(Some(new.clone())).await {
                    Ok(value) => {
                        if let Some(old) = old.filter(|old| **old != new) {
                            self.release_committed(old).await;
                        }
                        Ok(value)
                    }
                    Err(e) => {
                        tracing::debug!(asset = %new, "Commit failed, releasing new asset");
                        self.release_committed(&new).await;
                        Err(e)
                    }
                }
            }
            AssetChange::Remove => {
                let value = commit(None).await?;
                if let Some(old) = old {
                    self.release_committed(old).await;
                }
                Ok(value)
            }
        }
    }
}
