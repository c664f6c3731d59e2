//! Unified error handling with Sentry integration.
//!
//! Every lifecycle operation returns [`LifecycleError`]. Handlers can return
//! it directly: the `IntoResponse` impl picks the status code, captures
//! internal failures to Sentry, and never exposes storage details.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use folio_core::{AssetRefError, EmailError, UsernameError};

use crate::blob::BlobError;
use crate::db::RepositoryError;
use crate::services::guard::DenyReason;

/// Error taxonomy for the content and identity lifecycle.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Input failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Password does not meet the password rules.
    #[error("weak password: {0}")]
    WeakPassword(String),

    /// Username or email is already registered.
    #[error("username or email already exists")]
    DuplicateIdentity,

    /// No unique slug could be written within the retry bound.
    #[error("slug allocation exhausted after {attempts} attempts")]
    AllocationExhausted {
        /// Attempts made.
        attempts: u32,
    },

    /// Upload is not an allowed image type.
    #[error("unsupported upload type")]
    UnsupportedType,

    /// Upload exceeds the size limit.
    #[error("upload exceeds {max_bytes} bytes")]
    TooLarge {
        /// Configured limit.
        max_bytes: usize,
    },

    /// The blob store failed to persist an upload.
    #[error("blob write failed: {0}")]
    WriteFailed(#[source] BlobError),

    /// Unknown login or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The authorization guard denied the action.
    #[error("unauthorized: {0}")]
    Unauthorized(DenyReason),

    /// The record does not exist. Carries the entity name.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// An administrator tried to delete their own account.
    #[error("cannot delete own account")]
    SelfDeletion,

    /// An administrator tried to change their own role.
    #[error("cannot change own role")]
    SelfRoleChange,

    /// Record store failure.
    #[error("store error: {0}")]
    Store(#[from] RepositoryError),

    /// Session backend failure.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Unexpected internal failure (password hashing, corrupted state).
    #[error("internal error: {0}")]
    Internal(String),
}

impl LifecycleError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::WeakPassword(_) => StatusCode::BAD_REQUEST,
            Self::DuplicateIdentity | Self::AllocationExhausted { .. } => StatusCode::CONFLICT,
            Self::UnsupportedType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::WriteFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Unauthorized(_) | Self::SelfDeletion | Self::SelfRoleChange => {
                StatusCode::FORBIDDEN
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::WeakPassword(msg) => msg.clone(),
            Self::DuplicateIdentity => "Username or email already exists.".to_owned(),
            Self::AllocationExhausted { .. } => {
                "Could not generate a unique address for this title. Please try a different title."
                    .to_owned()
            }
            Self::UnsupportedType => {
                "Please upload a valid image file (JPEG, PNG, GIF, or WebP).".to_owned()
            }
            Self::TooLarge { max_bytes } => format!(
                "Image file is too large. Maximum size is {}MB.",
                max_bytes / (1024 * 1024)
            ),
            Self::WriteFailed(_) => "Failed to store the uploaded file. Please try again.".to_owned(),
            Self::InvalidCredentials => "Invalid username/email or password.".to_owned(),
            Self::Unauthorized(_) => {
                "You do not have permission to perform this action.".to_owned()
            }
            Self::NotFound(entity) => format!("{} not found.", capitalize(entity)),
            Self::SelfDeletion => "You cannot delete your own account.".to_owned(),
            Self::SelfRoleChange => "You cannot change your own role.".to_owned(),
            Self::Store(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_owned()
            }
        }
    }

    /// Whether the error is a server-side failure worth reporting.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Session(_) | Self::Internal(_) | Self::WriteFailed(_)
        )
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

impl From<EmailError> for LifecycleError {
    fn from(e: EmailError) -> Self {
        Self::Validation(capitalize(&e.to_string()) + ".")
    }
}

impl From<UsernameError> for LifecycleError {
    fn from(e: UsernameError) -> Self {
        Self::Validation(capitalize(&e.to_string()) + ".")
    }
}

impl From<AssetRefError> for LifecycleError {
    fn from(e: AssetRefError) -> Self {
        Self::Internal(format!("generated asset name rejected: {e}"))
    }
}

impl IntoResponse for LifecycleError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_internal() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        (self.status_code(), self.user_message()).into_response()
    }
}

/// Result type alias for `LifecycleError`.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Set the Sentry user context from an account ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(account_id: &impl ToString, username: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(account_id.to_string()),
            username: username.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
