//! Credential store: registration, authentication, and account settings.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::instrument;

use folio_core::{AccountId, Email, Role, Username};

use super::assets::{AssetChange, AssetManager, AssetPolicy, Upload};
use super::guard::{Action, Guard};
use crate::blob::BlobStore;
use crate::error::{LifecycleError, clear_sentry_user, set_sentry_user};
use crate::middleware::IdentityProvider;
use crate::models::{Account, NewAccount, ProfileChanges, SessionIdentity};
use crate::store::{AccountStore, RepositoryError, constraints};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Registration, login, and account settings.
pub struct CredentialService<'a, S: ?Sized, B: ?Sized> {
    store: &'a S,
    assets: AssetManager<'a, B>,
    avatar_policy: AssetPolicy,
    guard: Guard,
}

impl<'a, S, B> CredentialService<'a, S, B>
where
    S: AccountStore + ?Sized,
    B: BlobStore + ?Sized,
{
    /// Create a credential service.
    #[must_use]
    pub const fn new(store: &'a S, blobs: &'a B, avatar_policy: AssetPolicy, guard: Guard) -> Self {
        Self {
            store,
            assets: AssetManager::new(blobs),
            avatar_policy,
            guard,
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a member account.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a malformed username or email,
    /// `WeakPassword` for a short password, and `DuplicateIdentity` if the
    /// username or email is taken.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Account, LifecycleError> {
        self.register_with_avatar(username, email, password, None)
            .await
    }

    /// Register a member account with an optional profile image.
    ///
    /// The image is stored first; if the account insert fails it is
    /// released again.
    ///
    /// # Errors
    ///
    /// As [`Self::register`], plus the asset errors for a rejected image.
    #[instrument(skip(self, password, avatar))]
    pub async fn register_with_avatar(
        &self,
        username: &str,
        email: &str,
        password: &str,
        avatar: Option<Upload>,
    ) -> Result<Account, LifecycleError> {
        let username = Username::parse(username)?;
        let email = Email::parse(email)?;
        validate_password(password)?;

        // Advisory only; the insert below decides.
        if self.store.identity_taken(&username, &email, None).await? {
            return Err(LifecycleError::DuplicateIdentity);
        }

        let password_hash = hash_password(password)?;
        let change = avatar.map_or(AssetChange::Keep, AssetChange::Replace);
        let store = self.store;

        let account = self
            .assets
            .apply(None, change, &self.avatar_policy, move |avatar| async move {
                let new = NewAccount {
                    username,
                    email,
                    password_hash,
                    role: Role::Member,
                    avatar,
                };
                store
                    .insert_account(&new)
                    .await
                    .map_err(identity_write_error)
            })
            .await?;

        tracing::info!(account_id = %account.id, username = %account.username, "Registered account");
        Ok(account)
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Check a username-or-email and password.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` for an unknown login or a wrong
    /// password, without saying which.
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        login: &str,
        password: &str,
    ) -> Result<SessionIdentity, LifecycleError> {
        let login = login.trim();
        if login.is_empty() || password.is_empty() {
            return Err(LifecycleError::InvalidCredentials);
        }

        let Some(credentials) = self.store.find_credentials(login).await? else {
            tracing::debug!("Login for unknown account");
            return Err(LifecycleError::InvalidCredentials);
        };

        verify_password(password, &credentials.password_hash)
            .map_err(|_| LifecycleError::InvalidCredentials)?;

        Ok(SessionIdentity::from(&credentials.account))
    }

    /// Authenticate and bind the identity to the session.
    ///
    /// # Errors
    ///
    /// As [`Self::authenticate`], plus `Session` if the provider fails.
    pub async fn login<P: IdentityProvider + ?Sized>(
        &self,
        provider: &P,
        login: &str,
        password: &str,
    ) -> Result<SessionIdentity, LifecycleError> {
        let identity = self.authenticate(login, password).await?;
        provider.establish(&identity).await?;

        set_sentry_user(&identity.account_id, None);
        tracing::info!(account_id = %identity.account_id, "Logged in");
        Ok(identity)
    }

    /// Invalidate the session.
    ///
    /// # Errors
    ///
    /// Returns `Session` if the provider fails.
    pub async fn end_session<P: IdentityProvider + ?Sized>(
        &self,
        provider: &P,
    ) -> Result<(), LifecycleError> {
        let previous = provider.current().await?;
        provider.invalidate().await?;

        clear_sentry_user();
        if let Some(identity) = previous {
            tracing::info!(account_id = %identity.account_id, "Logged out");
        }
        Ok(())
    }

    // =========================================================================
    // Account settings
    // =========================================================================

    /// The caller's own account.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account was deleted after login.
    pub async fn account(&self, identity: &SessionIdentity) -> Result<Account, LifecycleError> {
        self.store
            .get_account(identity.account_id)
            .await?
            .ok_or(LifecycleError::NotFound("account"))
    }

    /// Change username, email, and profile image.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateIdentity` if another account uses the username or
    /// email, plus validation and asset errors.
    #[instrument(skip(self, identity, avatar), fields(account_id = %identity.account_id))]
    pub async fn update_profile(
        &self,
        identity: &SessionIdentity,
        username: &str,
        email: &str,
        avatar: AssetChange,
    ) -> Result<Account, LifecycleError> {
        let username = Username::parse(username)?;
        let email = Email::parse(email)?;
        let current = self.account(identity).await?;

        if self
            .store
            .identity_taken(&username, &email, Some(current.id))
            .await?
        {
            return Err(LifecycleError::DuplicateIdentity);
        }

        let store = self.store;
        let id = current.id;
        self.assets
            .apply(
                current.avatar.as_ref(),
                avatar,
                &self.avatar_policy,
                move |avatar| async move {
                    let changes = ProfileChanges {
                        username,
                        email,
                        avatar,
                    };
                    store
                        .update_profile(id, &changes)
                        .await
                        .map_err(identity_write_error)
                },
            )
            .await
    }

    /// Replace the password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the confirmation differs or the current
    /// password is wrong, and `WeakPassword` for a short new password.
    #[instrument(skip_all, fields(account_id = %identity.account_id))]
    pub async fn change_password(
        &self,
        identity: &SessionIdentity,
        current: &str,
        new: &str,
        confirm: &str,
    ) -> Result<(), LifecycleError> {
        if new != confirm {
            return Err(LifecycleError::Validation(
                "New passwords do not match.".to_owned(),
            ));
        }
        validate_password(new)?;

        let stored = self
            .store
            .password_hash(identity.account_id)
            .await?
            .ok_or(LifecycleError::NotFound("account"))?;
        verify_password(current, &stored).map_err(|_| {
            LifecycleError::Validation("Current password is incorrect.".to_owned())
        })?;

        self.store
            .set_password_hash(identity.account_id, &hash_password(new)?)
            .await
            .map_err(|e| not_found_as(e, "account"))?;

        tracing::info!("Password changed");
        Ok(())
    }

    /// Change another account's role. Administrators only.
    ///
    /// # Errors
    ///
    /// Returns `SelfRoleChange` when `target` is the actor, `Unauthorized`
    /// for members, and `NotFound` for an unknown target.
    #[instrument(skip(self, actor), fields(actor = %actor.account_id))]
    pub async fn set_role(
        &self,
        actor: &SessionIdentity,
        target: AccountId,
        role: Role,
    ) -> Result<Account, LifecycleError> {
        self.guard
            .check(Some(actor), Action::ChangeRole(target), None)?;

        let account = self
            .store
            .set_role(target, role)
            .await
            .map_err(|e| not_found_as(e, "account"))?;

        tracing::info!(%target, %role, "Role changed");
        Ok(account)
    }

    /// All accounts, newest first. Administrators only.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for members.
    pub async fn list_accounts(
        &self,
        actor: &SessionIdentity,
    ) -> Result<Vec<Account>, LifecycleError> {
        self.guard.check(Some(actor), Action::ViewAccountList, None)?;
        Ok(self.store.list_accounts().await?)
    }
}

/// Map a rejected account write into the taxonomy.
///
/// A unique violation on username or email is the authoritative duplicate
/// signal, even when the pre-check passed.
fn identity_write_error(e: RepositoryError) -> LifecycleError {
    if e.is_conflict_on_any(&[constraints::ACCOUNT_USERNAME, constraints::ACCOUNT_EMAIL]) {
        LifecycleError::DuplicateIdentity
    } else {
        not_found_as(e, "account")
    }
}

pub(crate) fn not_found_as(e: RepositoryError, entity: &'static str) -> LifecycleError {
    match e {
        RepositoryError::NotFound => LifecycleError::NotFound(entity),
        other => LifecycleError::Store(other),
    }
}

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), LifecycleError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(LifecycleError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters."
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `Internal` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, LifecycleError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| LifecycleError::Internal(format!("password hashing failed: {e}")))
}

/// Verify a password against a stored PHC string.
///
/// # Errors
///
/// Returns `InvalidCredentials` on mismatch or an unparseable hash.
pub fn verify_password(password: &str, hash: &str) -> Result<(), LifecycleError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| LifecycleError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| LifecycleError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;
    use crate::middleware::MemoryIdentity;
    use crate::services::guard::DenyReason;
    use crate::store::{MemoryStore, StoreFault};

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0];

    fn service<'a>(
        store: &'a MemoryStore,
        blobs: &'a MemoryBlobStore,
    ) -> CredentialService<'a, MemoryStore, MemoryBlobStore> {
        CredentialService::new(store, blobs, AssetPolicy::avatar(1024), Guard::default())
    }

    fn avatar() -> Upload {
        Upload::new("me.jpg", "image/jpeg", JPEG.to_vec())
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter22", &hash).is_ok());
        assert!(verify_password("hunter23", &hash).is_err());
        assert!(verify_password("hunter22", "not-a-hash").is_err());
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_identity_write_error() {
        let e = RepositoryError::Conflict(constraints::ACCOUNT_EMAIL.to_owned());
        assert!(matches!(identity_write_error(e), LifecycleError::DuplicateIdentity));

        let e = RepositoryError::Conflict(constraints::CONTENT_SLUG.to_owned());
        assert!(matches!(identity_write_error(e), LifecycleError::Store(_)));
    }

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();
        let credentials = service(&store, &blobs);

        let account = credentials
            .register(" writer ", "writer@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(account.username.as_str(), "writer");
        assert_eq!(account.role, Role::Member);
        assert_eq!(account.avatar, None);

        let by_name = credentials.authenticate("writer", "secret1").await.unwrap();
        let by_email = credentials
            .authenticate("writer@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(by_name.account_id, account.id);
        assert_eq!(by_email, by_name);
    }

    #[tokio::test]
    async fn test_authenticate_failures_are_indistinguishable() {
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();
        let credentials = service(&store, &blobs);
        credentials
            .register("writer", "writer@example.com", "secret1")
            .await
            .unwrap();

        let wrong_password = credentials.authenticate("writer", "secret2").await;
        let unknown = credentials.authenticate("nobody", "secret1").await;
        let wrong_case = credentials.authenticate("Writer", "secret1").await;

        for result in [wrong_password, unknown, wrong_case] {
            let err = result.unwrap_err();
            assert!(matches!(err, LifecycleError::InvalidCredentials));
            assert_eq!(err.user_message(), "Invalid username/email or password.");
        }
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();
        let credentials = service(&store, &blobs);

        assert!(matches!(
            credentials.register("ab", "a@example.com", "secret1").await,
            Err(LifecycleError::Validation(_))
        ));
        assert!(matches!(
            credentials.register("writer", "not-an-email", "secret1").await,
            Err(LifecycleError::Validation(_))
        ));
        assert!(matches!(
            credentials.register("writer", "a@example.com", "12345").await,
            Err(LifecycleError::WeakPassword(_))
        ));
    }

    #[tokio::test]
    async fn test_register_duplicate() {
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();
        let credentials = service(&store, &blobs);
        credentials
            .register("writer", "writer@example.com", "secret1")
            .await
            .unwrap();

        let same_name = credentials
            .register_with_avatar("writer", "other@example.com", "secret1", Some(avatar()))
            .await;
        let same_email = credentials
            .register("other", "writer@example.com", "secret1")
            .await;

        assert!(matches!(same_name, Err(LifecycleError::DuplicateIdentity)));
        assert!(matches!(same_email, Err(LifecycleError::DuplicateIdentity)));
        assert!(blobs.is_empty().await);
    }

    #[tokio::test]
    async fn test_register_conflict_after_precheck_is_duplicate() {
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();
        let credentials = service(&store, &blobs);

        store
            .inject(StoreFault::IdentityConflict(constraints::ACCOUNT_USERNAME))
            .await;
        let result = credentials
            .register_with_avatar("writer", "writer@example.com", "secret1", Some(avatar()))
            .await;

        assert!(matches!(result, Err(LifecycleError::DuplicateIdentity)));
        assert!(blobs.is_empty().await);
        assert!(store.find_credentials("writer").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_with_avatar_releases_on_failed_insert() {
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();
        let credentials = service(&store, &blobs);

        store.inject(StoreFault::Unavailable).await;
        let result = credentials
            .register_with_avatar("writer", "writer@example.com", "secret1", Some(avatar()))
            .await;
        assert!(matches!(result, Err(LifecycleError::Store(_))));
        assert!(blobs.is_empty().await);

        let account = credentials
            .register_with_avatar("writer", "writer@example.com", "secret1", Some(avatar()))
            .await
            .unwrap();
        let avatar = account.avatar.unwrap();
        assert!(avatar.as_str().starts_with("profile_"));
        assert!(blobs.exists(&avatar).await.unwrap());
    }

    #[tokio::test]
    async fn test_login_and_end_session() {
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();
        let credentials = service(&store, &blobs);
        let provider = MemoryIdentity::new();
        credentials
            .register("writer", "writer@example.com", "secret1")
            .await
            .unwrap();

        assert!(credentials.login(&provider, "writer", "nope!!").await.is_err());
        assert_eq!(provider.current().await.unwrap(), None);

        let identity = credentials
            .login(&provider, "writer", "secret1")
            .await
            .unwrap();
        assert_eq!(provider.current().await.unwrap(), Some(identity));

        credentials.end_session(&provider).await.unwrap();
        assert_eq!(provider.current().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_profile() {
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();
        let credentials = service(&store, &blobs);
        let writer = credentials
            .register_with_avatar("writer", "writer@example.com", "secret1", Some(avatar()))
            .await
            .unwrap();
        credentials
            .register("other", "other@example.com", "secret1")
            .await
            .unwrap();
        let identity = SessionIdentity::from(&writer);
        let old_avatar = writer.avatar.clone().unwrap();

        // Keeping the own username and email is not a duplicate.
        let same = credentials
            .update_profile(&identity, "writer", "writer@example.com", AssetChange::Keep)
            .await
            .unwrap();
        assert_eq!(same.avatar.as_ref(), Some(&old_avatar));

        let taken = credentials
            .update_profile(&identity, "other", "writer@example.com", AssetChange::Keep)
            .await;
        assert!(matches!(taken, Err(LifecycleError::DuplicateIdentity)));

        let updated = credentials
            .update_profile(
                &identity,
                "writer2",
                "writer2@example.com",
                AssetChange::Replace(avatar()),
            )
            .await
            .unwrap();
        assert_eq!(updated.username.as_str(), "writer2");
        let new_avatar = updated.avatar.unwrap();
        assert_ne!(new_avatar, old_avatar);
        assert!(!blobs.exists(&old_avatar).await.unwrap());
        assert!(blobs.exists(&new_avatar).await.unwrap());

        let cleared = credentials
            .update_profile(&identity, "writer2", "writer2@example.com", AssetChange::Remove)
            .await
            .unwrap();
        assert_eq!(cleared.avatar, None);
        assert!(blobs.is_empty().await);
    }

    #[tokio::test]
    async fn test_change_password() {
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();
        let credentials = service(&store, &blobs);
        let account = credentials
            .register("writer", "writer@example.com", "secret1")
            .await
            .unwrap();
        let identity = SessionIdentity::from(&account);

        let mismatch = credentials
            .change_password(&identity, "secret1", "secret2", "secret3")
            .await;
        assert!(matches!(mismatch, Err(LifecycleError::Validation(_))));

        let wrong_current = credentials
            .change_password(&identity, "secret9", "secret2", "secret2")
            .await;
        assert!(matches!(wrong_current, Err(LifecycleError::Validation(_))));

        let weak = credentials
            .change_password(&identity, "secret1", "abc", "abc")
            .await;
        assert!(matches!(weak, Err(LifecycleError::WeakPassword(_))));

        credentials
            .change_password(&identity, "secret1", "secret2", "secret2")
            .await
            .unwrap();
        assert!(credentials.authenticate("writer", "secret1").await.is_err());
        assert!(credentials.authenticate("writer", "secret2").await.is_ok());
    }

    #[tokio::test]
    async fn test_set_role() {
        let store = MemoryStore::new();
        let blobs = MemoryBlobStore::new();
        let credentials = service(&store, &blobs);
        let admin = credentials
            .register("admin", "admin@example.com", "secret1")
            .await
            .unwrap();
        let member = credentials
            .register("member", "member@example.com", "secret1")
            .await
            .unwrap();
        let admin = store.set_role(admin.id, Role::Administrator).await.unwrap();
        let admin_identity = SessionIdentity::from(&admin);
        let member_identity = SessionIdentity::from(&member);

        let promoted = credentials
            .set_role(&admin_identity, member.id, Role::Administrator)
            .await
            .unwrap();
        assert_eq!(promoted.role, Role::Administrator);

        let own = credentials
            .set_role(&admin_identity, admin.id, Role::Member)
            .await;
        assert!(matches!(own, Err(LifecycleError::SelfRoleChange)));

        let by_member = credentials
            .set_role(&member_identity, admin.id, Role::Member)
            .await;
        assert!(matches!(
            by_member,
            Err(LifecycleError::Unauthorized(DenyReason::RequiresAdministrator))
        ));

        let missing = credentials
            .set_role(&admin_identity, AccountId::new(999), Role::Member)
            .await;
        assert!(matches!(missing, Err(LifecycleError::NotFound("account"))));
    }
}
