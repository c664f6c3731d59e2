//! Account queries for [`PgStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::instrument;

use folio_core::{AccountId, AssetRef, Email, Role, Username};

use super::{PgStore, RepositoryError, map_write_error};
use crate::models::{Account, AccountCredentials, NewAccount, ProfileChanges};
use crate::store::AccountStore;

const ACCOUNT_COLUMNS: &str = "id, username, email, role, avatar, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` account queries.
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: AccountId,
    username: String,
    email: String,
    role: Role,
    avatar: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = RepositoryError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let username = Username::parse(&row.username).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid username in database: {e}"))
        })?;
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let avatar = row
            .avatar
            .map(AssetRef::try_from)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid avatar in database: {e}"))
            })?;

        Ok(Self {
            id: row.id,
            username,
            email,
            role: row.role,
            avatar,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Account row joined with its password hash.
#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    account: AccountRow,
    password_hash: String,
}

// =============================================================================
// Repository
// =============================================================================

#[async_trait]
impl AccountStore for PgStore {
    #[instrument(skip(self, account), fields(username = %account.username))]
    async fn insert_account(&self, account: &NewAccount) -> Result<Account, RepositoryError> {
        let row: AccountRow = sqlx::query_as(&format!(
            r"
            INSERT INTO account (username, email, password_hash, role, avatar)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ACCOUNT_COLUMNS}
            "
        ))
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.role)
        .bind(account.avatar.as_ref())
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;

        row.try_into()
    }

    #[instrument(skip(self))]
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self))]
    async fn find_credentials(
        &self,
        login: &str,
    ) -> Result<Option<AccountCredentials>, RepositoryError> {
        let row: Option<CredentialRow> = sqlx::query_as(&format!(
            r"
            SELECT {ACCOUNT_COLUMNS}, password_hash
            FROM account
            WHERE username = $1 OR email = $1
            ORDER BY (username = $1) DESC
            LIMIT 1
            "
        ))
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(AccountCredentials {
                account: row.account.try_into()?,
                password_hash: row.password_hash,
            })
        })
        .transpose()
    }

    #[instrument(skip(self))]
    async fn password_hash(&self, id: AccountId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar("SELECT password_hash FROM account WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(hash)
    }

    #[instrument(skip(self))]
    async fn identity_taken(
        &self,
        username: &Username,
        email: &Email,
        exclude: Option<AccountId>,
    ) -> Result<bool, RepositoryError> {
        let taken: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM account
                WHERE (username = $1 OR email = $2)
                  AND ($3::BIGINT IS NULL OR id <> $3)
            )
            ",
        )
        .bind(username)
        .bind(email)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    #[instrument(skip(self, changes))]
    async fn update_profile(
        &self,
        id: AccountId,
        changes: &ProfileChanges,
    ) -> Result<Account, RepositoryError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            r"
            UPDATE account
            SET username = $2, email = $3, avatar = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&changes.username)
        .bind(&changes.email)
        .bind(changes.avatar.as_ref())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    #[instrument(skip(self, hash))]
    async fn set_password_hash(&self, id: AccountId, hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE account SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_role(&self, id: AccountId, role: Role) -> Result<Account, RepositoryError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            r"
            UPDATE account SET role = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    #[instrument(skip(self))]
    async fn list_accounts(&self) -> Result<Vec<Account>, RepositoryError> {
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[instrument(skip(self))]
    async fn count_accounts(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM account")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
