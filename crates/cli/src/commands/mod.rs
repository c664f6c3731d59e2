//! Subcommand implementations.

pub mod account;
pub mod assets;
pub mod migrate;
pub mod slug;

use thiserror::Error;

use folio_cms::blob::{BlobError, LocalBlobStore};
use folio_cms::config::{ConfigError, FolioConfig};
use folio_cms::db::{self, PgStore, RepositoryError};
use folio_cms::state::PgLifecycle;
use folio_cms::{Lifecycle, LifecycleError, LifecycleSettings};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Record store error.
    #[error("Store error: {0}")]
    Store(#[from] RepositoryError),

    /// Upload directory error.
    #[error("Upload storage error: {0}")]
    Blob(#[from] BlobError),

    /// A lifecycle operation was rejected.
    #[error("{}", .0.user_message())]
    Lifecycle(#[from] LifecycleError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: member, administrator")]
    InvalidRole(String),

    /// No account matches the given username or email.
    #[error("No account with username or email: {0}")]
    AccountNotFound(String),
}

/// Load configuration, connect, and open the upload directory.
pub async fn connect() -> Result<(FolioConfig, PgLifecycle), CliError> {
    let config = FolioConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;
    let blobs = LocalBlobStore::open(&config.upload_dir).await?;

    let lifecycle = Lifecycle::new(PgStore::new(pool), blobs, LifecycleSettings::from(&config));
    Ok((config, lifecycle))
}
