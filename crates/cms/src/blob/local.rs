//! Local file system blob store.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use folio_core::AssetRef;

use super::{BlobError, BlobStore};

/// Blob store rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    /// Open a store rooted at `base_path`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `BlobError::Io` if the directory cannot be created or is not a
    /// directory.
    pub async fn open(base_path: impl Into<PathBuf>) -> Result<Self, BlobError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;

        let metadata = fs::metadata(&base_path).await?;
        if !metadata.is_dir() {
            return Err(BlobError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("not a directory: {}", base_path.display()),
            )));
        }

        Ok(Self { base_path })
    }

    /// The storage directory.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Full path for a blob. The name must be a single plain path component.
    fn path(&self, name: &str) -> Result<PathBuf, BlobError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.base_path.join(name)),
            _ => Err(BlobError::InvalidName(name.to_owned())),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn write(&self, name: &AssetRef, bytes: &[u8]) -> Result<(), BlobError> {
        let path = self.path(name.as_str())?;
        let partial = self.path(&format!(".{}.part", name.as_str()))?;

        // Write to a temporary name first so a crash never leaves a truncated
        // blob under the final name.
        let result = async {
            let mut file = fs::File::create(&partial).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            fs::rename(&partial, &path).await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&partial).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete(&self, name: &AssetRef) -> Result<(), BlobError> {
        let path = self.path(name.as_str())?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, name: &AssetRef) -> Result<bool, BlobError> {
        let path = self.path(name.as_str())?;
        match fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<AssetRef>, BlobError> {
        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if let Ok(asset) = AssetRef::parse(&name) {
                names.push(asset);
            }
        }

        names.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(names)
    }
}
