//! Account models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use folio_core::{AccountId, AssetRef, Email, Role, Username};

/// A registered account.
///
/// The password hash is never part of this type; it is only read back
/// through [`AccountCredentials`] during authentication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Primary key.
    pub id: AccountId,
    /// Unique username, case-sensitive as stored.
    pub username: Username,
    /// Unique email, case-sensitive as stored.
    pub email: Email,
    /// Capability level.
    pub role: Role,
    /// Profile image, if one was uploaded.
    pub avatar: Option<AssetRef>,
    /// When the account was registered.
    pub created_at: DateTime<Utc>,
    /// When the account was last modified.
    pub updated_at: DateTime<Utc>,
}

/// An account together with its stored password hash.
pub struct AccountCredentials {
    /// The account.
    pub account: Account,
    /// Argon2 PHC string.
    pub password_hash: String,
}

impl std::fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("account", &self.account)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// Data for inserting a new account.
#[derive(Clone)]
pub struct NewAccount {
    /// Username (already validated).
    pub username: Username,
    /// Email (already validated).
    pub email: Email,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Initial role.
    pub role: Role,
    /// Avatar stored before the insert.
    pub avatar: Option<AssetRef>,
}

impl std::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("role", &self.role)
            .field("avatar", &self.avatar)
            .finish()
    }
}

/// Profile fields written by a profile update.
#[derive(Debug, Clone)]
pub struct ProfileChanges {
    /// New username.
    pub username: Username,
    /// New email.
    pub email: Email,
    /// Avatar after the change (`None` clears it).
    pub avatar: Option<AssetRef>,
}
