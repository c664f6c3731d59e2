//! HTTP session plumbing.
//!
//! Handlers mount [`session::create_session_layer`] and read the caller with
//! the extractors in [`auth`].

pub mod auth;
pub mod session;

pub use auth::{
    IdentityProvider, IdentityRejection, OptionalIdentity, RequireIdentity, SessionError,
};
#[cfg(any(test, feature = "memory"))]
pub use auth::MemoryIdentity;
pub use session::create_session_layer;
