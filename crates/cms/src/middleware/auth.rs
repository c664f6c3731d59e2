//! Session identity plumbing and extractors.
//!
//! The services never read the session themselves. Handlers extract a
//! [`SessionIdentity`] with [`RequireIdentity`] or [`OptionalIdentity`] and
//! pass it explicitly into every guarded call.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{SessionIdentity, session_keys};

/// Session backend error.
pub type SessionError = tower_sessions::session::Error;

/// Where the current identity lives between requests.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The identity bound to this session, if any.
    async fn current(&self) -> Result<Option<SessionIdentity>, SessionError>;

    /// Bind `identity` to a fresh session id.
    async fn establish(&self, identity: &SessionIdentity) -> Result<(), SessionError>;

    /// Drop all session data and the session id.
    async fn invalidate(&self) -> Result<(), SessionError>;
}

#[async_trait]
impl IdentityProvider for Session {
    async fn current(&self) -> Result<Option<SessionIdentity>, SessionError> {
        self.get(session_keys::CURRENT_IDENTITY).await
    }

    async fn establish(&self, identity: &SessionIdentity) -> Result<(), SessionError> {
        // New id on login so a pre-login session id cannot be reused.
        self.cycle_id().await?;
        self.insert(session_keys::CURRENT_IDENTITY, identity).await
    }

    async fn invalidate(&self) -> Result<(), SessionError> {
        self.flush().await
    }
}

#[cfg(any(test, feature = "memory"))]
pub use memory::MemoryIdentity;

#[cfg(any(test, feature = "memory"))]
mod memory {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::{IdentityProvider, SessionError};
    use crate::models::SessionIdentity;

    #[derive(Debug, Default)]
    struct Slot {
        generation: u64,
        identity: Option<SessionIdentity>,
    }

    /// Identity provider for a single in-process session.
    ///
    /// The generation counter advances whenever the session id would be
    /// cycled or flushed.
    #[derive(Debug, Clone, Default)]
    pub struct MemoryIdentity {
        slot: Arc<Mutex<Slot>>,
    }

    impl MemoryIdentity {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// How many times the session id has been replaced.
        pub async fn generation(&self) -> u64 {
            self.slot.lock().await.generation
        }
    }

    #[async_trait]
    impl IdentityProvider for MemoryIdentity {
        async fn current(&self) -> Result<Option<SessionIdentity>, SessionError> {
            Ok(self.slot.lock().await.identity)
        }

        async fn establish(&self, identity: &SessionIdentity) -> Result<(), SessionError> {
            let mut slot = self.slot.lock().await;
            slot.generation += 1;
            slot.identity = Some(*identity);
            Ok(())
        }

        async fn invalidate(&self) -> Result<(), SessionError> {
            let mut slot = self.slot.lock().await;
            slot.generation += 1;
            slot.identity = None;
            Ok(())
        }
    }
}

/// Extractor that requires a logged-in identity.
///
/// # Example
///
/// ```rust,ignore
/// async fn create_post(
///     State(state): State<AppState>,
///     RequireIdentity(identity): RequireIdentity,
///     Json(form): Json<PostForm>,
/// ) -> Result<impl IntoResponse, LifecycleError> {
///     let item = state.lifecycle().content().create(&identity, form.into()).await?;
///     Ok(Json(item))
/// }
/// ```
pub struct RequireIdentity(pub SessionIdentity);

/// Error returned when a logged-in identity is required.
pub enum IdentityRejection {
    /// Redirect to the login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (for API requests).
    Unauthorized,
}

impl IntoResponse for IdentityRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/login").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireIdentity
where
    S: Send + Sync,
{
    type Rejection = IdentityRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by SessionManagerLayer
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(IdentityRejection::Unauthorized)?;

        let identity = session.current().await.ok().flatten().ok_or_else(|| {
            if parts.uri.path().starts_with("/api/") {
                IdentityRejection::Unauthorized
            } else {
                IdentityRejection::RedirectToLogin
            }
        })?;

        Ok(Self(identity))
    }
}

/// Extractor that reads the identity if there is one.
///
/// Never rejects; anonymous requests get `None`.
pub struct OptionalIdentity(pub Option<SessionIdentity>);

impl<S> FromRequestParts<S> for OptionalIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = match parts.extensions.get::<Session>() {
            Some(session) => session.current().await.ok().flatten(),
            None => None,
        };

        Ok(Self(identity))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use folio_core::{AccountId, Role};

    use super::*;

    #[tokio::test]
    async fn test_memory_identity_cycles_on_establish_and_invalidate() {
        let provider = MemoryIdentity::new();
        assert_eq!(provider.current().await.unwrap(), None);

        let identity = SessionIdentity {
            account_id: AccountId::new(7),
            role: Role::Member,
        };
        provider.establish(&identity).await.unwrap();
        assert_eq!(provider.current().await.unwrap(), Some(identity));
        assert_eq!(provider.generation().await, 1);

        provider.invalidate().await.unwrap();
        assert_eq!(provider.current().await.unwrap(), None);
        assert_eq!(provider.generation().await, 2);
    }

    #[tokio::test]
    async fn test_extractors_without_session_layer() {
        let (mut parts, ()) = Request::builder()
            .uri("/api/posts")
            .body(())
            .unwrap()
            .into_parts();

        let OptionalIdentity(identity) = OptionalIdentity::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(identity.is_none());

        let rejection = RequireIdentity::from_request_parts(&mut parts, &()).await;
        assert!(matches!(rejection, Err(IdentityRejection::Unauthorized)));
    }
}
