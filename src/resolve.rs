//! Source resolution
//!
//! Opens a source through the SDK, reads its metadata and partition table,
//! and releases the handle on every exit path.

use crate::error::{SelectError, SourceError};
use crate::selection::SelectedImage;
use crate::source::{
    Metadata, PartitionTable, SourceDescriptor, SourceHandle, SourceKind, SourceOptions, SourceSdk,
};
use crate::utils::basename;
use crate::{log_debug, log_info, log_warn};

const MODULE: &str = "resolve";

/// Resolve `options` to a selected image
///
/// Http requests whose path is not an HTTP(S) URL fail before any I/O.
pub async fn resolve_source(
    sdk: &dyn SourceSdk,
    options: &SourceOptions,
) -> Result<SelectedImage, SelectError> {
    let path = options.image_path.as_str();
    let descriptor = SourceDescriptor::new(path, options.kind).map_err(|_| {
        log_warn!(MODULE, "Rejected non-HTTP URL: {}", path);
        SelectError::UnsupportedProtocol {
            path: path.to_string(),
        }
    })?;

    log_info!(
        MODULE,
        "Resolving {} ({})",
        basename(path),
        match options.kind {
            SourceKind::File => "file",
            SourceKind::Http => "http",
        }
    );

    let mut handle = sdk
        .open(&descriptor)
        .await
        .map_err(|e| SelectError::open_image(path, e))?;

    let inspected = inspect(handle.as_mut()).await;

    if let Err(e) = handle.close().await {
        log_debug!(MODULE, "Ignoring close failure for {}: {}", basename(path), e);
    }

    let (metadata, partition_table) = inspected.map_err(|e| SelectError::open_image(path, e))?;
    Ok(SelectedImage::from_metadata(path, metadata, partition_table))
}

/// Query the inner source for metadata and partition table
async fn inspect(
    handle: &mut dyn SourceHandle,
) -> Result<(Metadata, Option<PartitionTable>), SourceError> {
    let mut inner = handle.inner_source().await?;
    let metadata = inner.metadata().await?;
    let partition_table = inner.partition_table().await?;
    Ok((metadata, partition_table))
}
