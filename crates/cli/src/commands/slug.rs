//! Slug preview command.
//!
//! # Usage
//!
//! ```bash
//! # Print the normalised candidate for a title
//! folio-cli slug "Hello, World! 2024"
//!
//! # Print the slug the next post with this title would get
//! folio-cli slug --allocate --kind post "Hello, World! 2024"
//! ```

use folio_cms::services::slug;
use folio_core::ContentKind;

use super::{CliError, connect};

/// Print the slug for `title`, optionally probing the database.
pub async fn preview(title: &str, kind: ContentKind, allocate: bool) -> Result<(), CliError> {
    let slug = if allocate {
        let (_, lifecycle) = connect().await?;
        lifecycle
            .slugs()
            .allocate(title, kind, None)
            .await?
            .to_string()
    } else {
        slug::candidate(title)
    };

    #[allow(clippy::print_stdout)]
    {
        println!("{slug}");
    }
    Ok(())
}
