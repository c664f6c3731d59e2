//! Account management commands.
//!
//! # Usage
//!
//! ```bash
//! # Bootstrap the first administrator
//! folio-cli account create -u admin -e admin@example.com -p 'secret' -r administrator
//!
//! # Delete an account with everything it owns, acting as an administrator
//! folio-cli account delete --as admin writer
//! ```

use folio_cms::models::{Account, SessionIdentity};
use folio_cms::state::PgLifecycle;
use folio_cms::store::AccountStore;
use folio_core::Role;

use super::{CliError, connect};

/// Register an account and optionally promote it.
///
/// Promotion bypasses the guard: this is how the first administrator is
/// created.
pub async fn create(
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> Result<(), CliError> {
    let role: Role = role
        .parse()
        .map_err(|_| CliError::InvalidRole(role.to_owned()))?;

    let (_, lifecycle) = connect().await?;

    tracing::info!("Creating account: {} <{}> ({})", username, email, role);
    let mut account = lifecycle
        .credentials()
        .register(username, email, password)
        .await?;

    if role != account.role {
        account = lifecycle.store().set_role(account.id, role).await?;
    }

    tracing::info!("Account created with ID: {} ({})", account.id, account.role);
    Ok(())
}

/// Delete `target` and everything it owns, acting as `actor`.
pub async fn delete(actor: &str, target: &str) -> Result<(), CliError> {
    let (_, lifecycle) = connect().await?;

    let actor = SessionIdentity::from(&find(&lifecycle, actor).await?);
    let target = find(&lifecycle, target).await?;

    tracing::info!("Deleting account {} ({})...", target.username, target.id);
    let report = lifecycle
        .deletion()
        .delete_account(&actor, target.id)
        .await?;

    tracing::info!(
        "Deleted {} content item(s) and {} comment(s); released {} file(s)",
        report.content_items,
        report.comments,
        report.released.len()
    );
    for asset in &report.orphaned {
        tracing::warn!("Could not remove {asset}; run `folio-cli assets sweep --delete`");
    }
    Ok(())
}

async fn find(lifecycle: &PgLifecycle, login: &str) -> Result<Account, CliError> {
    lifecycle
        .store()
        .find_credentials(login)
        .await?
        .map(|credentials| credentials.account)
        .ok_or_else(|| CliError::AccountNotFound(login.to_owned()))
}
