//! Session-related types for authentication.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use folio_core::{AccountId, Role};

use super::Account;

/// Session-stored identity.
///
/// The only input the authorization guard accepts about the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    /// Account's database ID.
    pub account_id: AccountId,
    /// Account's role at login time.
    pub role: Role,
}

impl SessionIdentity {
    /// Whether the identity carries administrator capabilities.
    #[must_use]
    pub const fn is_administrator(&self) -> bool {
        self.role.is_administrator()
    }
}

impl From<&Account> for SessionIdentity {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.id,
            role: account.role,
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in identity.
    pub const CURRENT_IDENTITY: &str = "current_identity";
}
