//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! folio-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `FOLIO_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Schema migrations live in `crates/cms/migrations/`. The session table is
//! created by the session store's own migration.

use tower_sessions_sqlx_store::PostgresStore;

use folio_cms::config::FolioConfig;
use folio_cms::db;

use super::CliError;

/// Run schema and session store migrations.
pub async fn run() -> Result<(), CliError> {
    let config = FolioConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;

    tracing::info!("Running schema migrations...");
    sqlx::migrate!("../cms/migrations").run(&pool).await?;

    tracing::info!("Running session store migrations...");
    PostgresStore::new(pool.clone()).migrate().await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
