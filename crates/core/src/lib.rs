//! Folio Core - Shared domain types.
//!
//! This crate provides the types used across all Folio components:
//! - `cms` - Content & identity lifecycle services (slugs, assets, authorization, cascades)
//! - `cli` - Command-line tools for migrations and account management
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no filesystem. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, usernames, emails, slugs, asset references,
//!   and the role/status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
