//! Folio content and identity lifecycle core.
//!
//! The web layer calls into five operation families:
//!
//! - registration and authentication ([`services::credentials`])
//! - slug allocation ([`services::slug`])
//! - storing, replacing, and releasing uploads ([`services::assets`])
//! - authorization ([`services::guard`])
//! - deletion with cascade ([`services::deletion`])
//!
//! Every operation returns [`error::LifecycleError`] on failure. Storage is
//! reached only through the [`store`] and [`blob`] traits; the Postgres and
//! filesystem implementations live in [`db`] and [`blob::LocalBlobStore`].
//! Enable the `memory` feature for in-process stores.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod blob;
pub mod config;
pub mod db;
pub mod error;
#[cfg(any(test, feature = "memory"))]
pub mod journal;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
pub mod store;

pub use error::{LifecycleError, Result};
pub use services::{Lifecycle, LifecycleSettings};
