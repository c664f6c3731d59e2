//! Folio CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! folio-cli migrate
//!
//! # Create the first administrator
//! folio-cli account create -u admin -e admin@example.com -p 'secret' -r administrator
//!
//! # Delete an account and everything it owns
//! folio-cli account delete --as admin writer
//!
//! # Preview a slug
//! folio-cli slug "Hello, World! 2024"
//!
//! # Remove uploads no record refers to
//! folio-cli assets sweep --delete
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `account create` / `account delete` - Manage accounts
//! - `slug` - Preview slugs
//! - `assets sweep` - Find orphaned uploads

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio_cms::config::FolioConfig;
use folio_core::ContentKind;

mod commands;

#[derive(Parser)]
#[command(name = "folio-cli")]
#[command(author, version, about = "Folio CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage accounts
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Print the slug for a title
    Slug {
        /// Title to normalise
        title: String,

        /// Content kind (`post`, `employee_record`)
        #[arg(short, long, default_value = "post")]
        kind: String,

        /// Probe the database for the next free slug
        #[arg(short, long)]
        allocate: bool,
    },
    /// Maintain uploaded files
    Assets {
        #[command(subcommand)]
        action: AssetsAction,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// Register a new account
    Create {
        /// Username
        #[arg(short, long)]
        username: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password
        #[arg(short, long)]
        password: String,

        /// Role (`member`, `administrator`)
        #[arg(short, long, default_value = "member")]
        role: String,
    },
    /// Delete an account with its content and comments
    Delete {
        /// Username or email of the administrator performing the deletion
        #[arg(long = "as")]
        actor: String,

        /// Username or email of the account to delete
        target: String,
    },
}

#[derive(Subcommand)]
enum AssetsAction {
    /// List uploaded files that no record refers to
    Sweep {
        /// Remove them
        #[arg(long)]
        delete: bool,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &FolioConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Commands that don't touch the database run without configuration
    let _sentry_guard = FolioConfig::from_env()
        .ok()
        .and_then(|config| init_sentry(&config));

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "folio_cms=info,folio_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Account { action } => match action {
            AccountAction::Create {
                username,
                email,
                password,
                role,
            } => commands::account::create(&username, &email, &password, &role).await?,
            AccountAction::Delete { actor, target } => {
                commands::account::delete(&actor, &target).await?;
            }
        },
        Commands::Slug {
            title,
            kind,
            allocate,
        } => {
            let kind: ContentKind = kind.parse()?;
            commands::slug::preview(&title, kind, allocate).await?;
        }
        Commands::Assets { action } => match action {
            AssetsAction::Sweep { delete } => commands::assets::sweep(delete).await?,
        },
    }
    Ok(())
}
