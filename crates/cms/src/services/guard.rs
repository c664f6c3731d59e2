//! Authorization guard.
//!
//! A pure decision table over `(identity, action, target owner)`. Services
//! call [`Guard::authorize`] before touching any store and stop on `Deny`.

use std::fmt;

use folio_core::{AccountId, ContentStatus};

use crate::error::LifecycleError;
use crate::models::SessionIdentity;

/// An operation subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Create a content item.
    CreateContent,
    /// Edit a content item.
    EditContent,
    /// Delete a content item.
    DeleteContent,
    /// Delete the given account.
    DeleteAccount(AccountId),
    /// Change the role of the given account.
    ChangeRole(AccountId),
    /// View a content item with the given status.
    ViewContent(ContentStatus),
    /// Comment on a published content item.
    CreateComment,
    /// Approve or delete comments.
    ModerateComment,
    /// List all accounts.
    ViewAccountList,
}

/// Why an action was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No identity was supplied.
    Anonymous,
    /// The caller does not own the target.
    NotOwner,
    /// The action is reserved for administrators.
    RequiresAdministrator,
    /// An account may not delete itself.
    SelfDeletion,
    /// An account may not change its own role.
    SelfRoleChange,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Anonymous => "login required",
            Self::NotOwner => "not the owner",
            Self::RequiresAdministrator => "administrator required",
            Self::SelfDeletion => "cannot delete own account",
            Self::SelfRoleChange => "cannot change own role",
        })
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Map a denial into the error taxonomy.
    ///
    /// # Errors
    ///
    /// `SelfDeletion` and `SelfRoleChange` keep their own variants; every
    /// other denial becomes `Unauthorized`.
    pub fn into_result(self) -> Result<(), LifecycleError> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(DenyReason::SelfDeletion) => Err(LifecycleError::SelfDeletion),
            Self::Deny(DenyReason::SelfRoleChange) => Err(LifecycleError::SelfRoleChange),
            Self::Deny(reason) => Err(LifecycleError::Unauthorized(reason)),
        }
    }
}

/// The authorization policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Guard {
    owners_may_delete_content: bool,
}

impl Guard {
    /// Create a guard. `owners_may_delete_content` lets members delete
    /// content they own.
    #[must_use]
    pub const fn new(owners_may_delete_content: bool) -> Self {
        Self {
            owners_may_delete_content,
        }
    }

    /// Decide whether `identity` may perform `action` on a target owned by
    /// `target_owner`.
    #[must_use]
    pub fn authorize(
        &self,
        identity: Option<&SessionIdentity>,
        action: Action,
        target_owner: Option<AccountId>,
    ) -> Decision {
        let Some(identity) = identity else {
            return match action {
                Action::ViewContent(ContentStatus::Published) => Decision::Allow,
                _ => Decision::Deny(DenyReason::Anonymous),
            };
        };

        // Self-protection comes before the role check.
        match action {
            Action::DeleteAccount(target) if target == identity.account_id => {
                return Decision::Deny(DenyReason::SelfDeletion);
            }
            Action::ChangeRole(target) if target == identity.account_id => {
                return Decision::Deny(DenyReason::SelfRoleChange);
            }
            _ => {}
        }

        if identity.is_administrator() {
            return Decision::Allow;
        }

        let owns = target_owner == Some(identity.account_id);
        match action {
            Action::CreateContent
            | Action::CreateComment
            | Action::ViewContent(ContentStatus::Published) => Decision::Allow,
            Action::EditContent | Action::ViewContent(ContentStatus::Draft) if owns => {
                Decision::Allow
            }
            Action::DeleteContent if owns && self.owners_may_delete_content => Decision::Allow,
            Action::EditContent | Action::ViewContent(_) => Decision::Deny(DenyReason::NotOwner),
            Action::DeleteContent if !owns => Decision::Deny(DenyReason::NotOwner),
            Action::DeleteContent
            | Action::DeleteAccount(_)
            | Action::ChangeRole(_)
            | Action::ModerateComment
            | Action::ViewAccountList => Decision::Deny(DenyReason::RequiresAdministrator),
        }
    }

    /// [`Self::authorize`] mapped into the error taxonomy.
    ///
    /// # Errors
    ///
    /// Returns the error for the denial, see [`Decision::into_result`].
    pub fn check(
        &self,
        identity: Option<&SessionIdentity>,
        action: Action,
        target_owner: Option<AccountId>,
    ) -> Result<(), LifecycleError> {
        let decision = self.authorize(identity, action, target_owner);
        if let Decision::Deny(reason) = decision {
            tracing::debug!(?action, %reason, "Authorization denied");
        }
        decision.into_result()
    }
}

#[cfg(test)]
mod tests {
    use folio_core::Role;

    use super::*;

    const OWNER: AccountId = AccountId::new(1);
    const OTHER: AccountId = AccountId::new(2);
    const ADMIN: AccountId = AccountId::new(3);

    fn member(id: AccountId) -> SessionIdentity {
        SessionIdentity {
            account_id: id,
            role: Role::Member,
        }
    }

    fn admin() -> SessionIdentity {
        SessionIdentity {
            account_id: ADMIN,
            role: Role::Administrator,
        }
    }

    #[test]
    fn test_content_table() {
        let guard = Guard::default();
        let owner = member(OWNER);
        let other = member(OTHER);
        let admin = admin();

        let rows = [
            (Action::CreateContent, Decision::Allow, Decision::Allow),
            (
                Action::EditContent,
                Decision::Allow,
                Decision::Deny(DenyReason::NotOwner),
            ),
            (
                Action::DeleteContent,
                Decision::Deny(DenyReason::RequiresAdministrator),
                Decision::Deny(DenyReason::NotOwner),
            ),
            (
                Action::ViewContent(ContentStatus::Published),
                Decision::Allow,
                Decision::Allow,
            ),
            (
                Action::ViewContent(ContentStatus::Draft),
                Decision::Allow,
                Decision::Deny(DenyReason::NotOwner),
            ),
            (Action::CreateComment, Decision::Allow, Decision::Allow),
            (
                Action::ModerateComment,
                Decision::Deny(DenyReason::RequiresAdministrator),
                Decision::Deny(DenyReason::RequiresAdministrator),
            ),
            (
                Action::ViewAccountList,
                Decision::Deny(DenyReason::RequiresAdministrator),
                Decision::Deny(DenyReason::RequiresAdministrator),
            ),
        ];

        for (action, as_owner, as_other) in rows {
            assert_eq!(guard.authorize(Some(&owner), action, Some(OWNER)), as_owner, "{action:?} owner");
            assert_eq!(guard.authorize(Some(&other), action, Some(OWNER)), as_other, "{action:?} other");
            assert_eq!(guard.authorize(Some(&admin), action, Some(OWNER)), Decision::Allow, "{action:?} admin");
        }
    }

    #[test]
    fn test_anonymous_only_views_published() {
        let guard = Guard::default();
        assert_eq!(
            guard.authorize(None, Action::ViewContent(ContentStatus::Published), None),
            Decision::Allow
        );
        for action in [
            Action::ViewContent(ContentStatus::Draft),
            Action::CreateContent,
            Action::CreateComment,
            Action::DeleteAccount(OWNER),
        ] {
            assert_eq!(
                guard.authorize(None, action, Some(OWNER)),
                Decision::Deny(DenyReason::Anonymous)
            );
        }
    }

    #[test]
    fn test_administrator_cannot_target_self() {
        let guard = Guard::default();
        let admin = admin();
        assert_eq!(
            guard.authorize(Some(&admin), Action::DeleteAccount(ADMIN), None),
            Decision::Deny(DenyReason::SelfDeletion)
        );
        assert_eq!(
            guard.authorize(Some(&admin), Action::ChangeRole(ADMIN), None),
            Decision::Deny(DenyReason::SelfRoleChange)
        );
        assert!(guard
            .authorize(Some(&admin), Action::DeleteAccount(OWNER), None)
            .is_allowed());
    }

    #[test]
    fn test_members_cannot_manage_accounts() {
        let guard = Guard::default();
        let other = member(OTHER);
        assert_eq!(
            guard.authorize(Some(&other), Action::DeleteAccount(OWNER), None),
            Decision::Deny(DenyReason::RequiresAdministrator)
        );
        assert_eq!(
            guard.authorize(Some(&other), Action::ChangeRole(OWNER), None),
            Decision::Deny(DenyReason::RequiresAdministrator)
        );
    }

    #[test]
    fn test_owner_delete_policy() {
        let guard = Guard::new(true);
        assert!(guard
            .authorize(Some(&member(OWNER)), Action::DeleteContent, Some(OWNER))
            .is_allowed());
        assert_eq!(
            guard.authorize(Some(&member(OTHER)), Action::DeleteContent, Some(OWNER)),
            Decision::Deny(DenyReason::NotOwner)
        );
    }

    #[test]
    fn test_into_result_maps_self_protection() {
        assert!(matches!(
            Decision::Deny(DenyReason::SelfDeletion).into_result(),
            Err(LifecycleError::SelfDeletion)
        ));
        assert!(matches!(
            Decision::Deny(DenyReason::SelfRoleChange).into_result(),
            Err(LifecycleError::SelfRoleChange)
        ));
        assert!(matches!(
            Decision::Deny(DenyReason::NotOwner).into_result(),
            Err(LifecycleError::Unauthorized(DenyReason::NotOwner))
        ));
    }
}
