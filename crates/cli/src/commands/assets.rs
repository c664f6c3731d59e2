//! Upload maintenance commands.
//!
//! # Usage
//!
//! ```bash
//! # List uploaded files no record refers to
//! folio-cli assets sweep
//!
//! # ...and remove them
//! folio-cli assets sweep --delete
//! ```
//!
//! Files are orphaned when a request aborts between writing an upload and
//! committing the record, or when a release fails after a commit. Run the
//! sweep while no uploads are in flight: a file written by a request that
//! has not committed yet is indistinguishable from an orphan.

use std::collections::BTreeSet;

use folio_cms::blob::BlobStore;
use folio_cms::store::RecordStore;
use folio_core::AssetRef;

use super::{CliError, connect};

/// Report, and with `delete` remove, unreferenced uploads.
pub async fn sweep(delete: bool) -> Result<(), CliError> {
    let (config, lifecycle) = connect().await?;

    let referenced: BTreeSet<AssetRef> = lifecycle
        .store()
        .referenced_assets()
        .await?
        .into_iter()
        .collect();
    let stored = lifecycle.blobs().list().await?;
    let orphans: Vec<AssetRef> = stored
        .into_iter()
        .filter(|asset| !referenced.contains(asset))
        .collect();

    tracing::info!(
        "{} unreferenced file(s) in {}",
        orphans.len(),
        config.upload_dir.display()
    );

    let assets = lifecycle.assets();
    let mut removed = 0_usize;
    for asset in &orphans {
        if !delete {
            #[allow(clippy::print_stdout)]
            {
                println!("{asset}");
            }
            continue;
        }
        match assets.release(asset).await {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("Failed to remove {asset}: {e}"),
        }
    }

    if delete {
        tracing::info!("Removed {removed} file(s)");
    }
    Ok(())
}
