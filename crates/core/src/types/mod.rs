//! Core types for Folio.
//!
//! This module provides type-safe wrappers for common domain concepts.

/// Implements `sqlx` text encoding for a `String` newtype.
///
/// Values read back from the database are trusted and are not re-validated.
#[cfg(feature = "postgres")]
macro_rules! impl_pg_text {
    ($name:ident) => {
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <String as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <String as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let s = <String as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(s))
            }
        }

        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::core::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <String as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

#[cfg(feature = "postgres")]
pub(crate) use impl_pg_text;

pub mod asset;
pub mod email;
pub mod id;
pub mod slug;
pub mod status;
pub mod username;

pub use asset::{AssetRef, AssetRefError};
pub use email::{Email, EmailError};
pub use id::*;
pub use slug::Slug;
pub use status::*;
pub use username::{Username, UsernameError};
