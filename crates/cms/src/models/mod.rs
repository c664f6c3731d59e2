//! Domain models for records held in the record store.

pub mod account;
pub mod comment;
pub mod content;
pub mod session;

pub use account::{Account, AccountCredentials, NewAccount, ProfileChanges};
pub use comment::{AccountCommentStats, Comment, CommentFilter, ModerationStats, NewComment};
pub use content::{ContentChanges, ContentFilter, ContentItem, NewContentRecord};
pub use session::{SessionIdentity, keys as session_keys};
