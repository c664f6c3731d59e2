//! Role, kind, and status enums for accounts, content items, and comments.

use serde::{Deserialize, Serialize};

/// Implements `Display` and `FromStr` using the snake_case wire names.
macro_rules! impl_wire_names {
    ($name:ident, $label:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            /// The snake_case name stored in the database and sent over the wire.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", $label, ": {}"), s)),
                }
            }
        }
    };
}

/// Account role.
///
/// Administrators hold every member capability plus account management,
/// moderation, and deletion of any content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "account_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular registered account.
    #[default]
    Member,
    /// Full access including account management.
    Administrator,
}

impl_wire_names!(Role, "role", {
    Member => "member",
    Administrator => "administrator",
});

impl Role {
    /// Whether this role has administrator capabilities.
    #[must_use]
    pub const fn is_administrator(self) -> bool {
        matches!(self, Self::Administrator)
    }
}

/// Kind of content item. Slugs are unique per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "content_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Blog post.
    Post,
    /// Employee record in the employee portal.
    EmployeeRecord,
}

impl_wire_names!(ContentKind, "content kind", {
    Post => "post",
    EmployeeRecord => "employee_record",
});

/// Publication status of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "content_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    /// Visible to the owner and administrators only.
    #[default]
    Draft,
    /// Visible to everyone.
    Published,
}

impl_wire_names!(ContentStatus, "content status", {
    Draft => "draft",
    Published => "published",
});

/// Moderation status of a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "comment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum CommentStatus {
    /// Awaiting moderation.
    #[default]
    Pending,
    /// Visible on the content item.
    Approved,
}

impl_wire_names!(CommentStatus, "comment status", {
    Pending => "pending",
    Approved => "approved",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [Role::Member, Role::Administrator] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_serde_names_match_wire_names() {
        let json = serde_json::to_string(&ContentKind::EmployeeRecord).unwrap();
        assert_eq!(json, "\"employee_record\"");
        assert_eq!(ContentKind::EmployeeRecord.as_str(), "employee_record");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Role::default(), Role::Member);
        assert_eq!(ContentStatus::default(), ContentStatus::Draft);
        assert_eq!(CommentStatus::default(), CommentStatus::Pending);
    }
}
