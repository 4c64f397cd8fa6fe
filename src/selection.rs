//! Selection state
//!
//! Holds the currently selected image and the advisory warning raised when
//! it was selected.

use serde::{Deserialize, Serialize};

use crate::formats::looks_like_windows_image;
use crate::messages;
use crate::source::{BlockMap, Metadata, Partition, PartitionTable, PartitionTableKind};
use crate::utils::{basename, extension, format_size};

pub const WINDOWS_IMAGE_TITLE: &str = "Possible Windows image detected";
pub const MISSING_PARTITION_TABLE_TITLE: &str = "Missing partition table";

/// Image chosen by the user, with the metadata read from its source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedImage {
    /// Path or URL as resolved
    pub path: String,
    /// Final extension of `path`, without the dot
    pub extension: String,
    pub name: Option<String>,
    /// Uncompressed size when known, otherwise the compressed size
    pub size: u64,
    pub compressed_size: Option<u64>,
    pub is_size_estimated: bool,
    pub is_compressed: bool,
    pub logo: Option<String>,
    pub block_map: Option<BlockMap>,
    pub has_partition_table: bool,
    pub partition_table_kind: Option<PartitionTableKind>,
    pub partitions: Vec<Partition>,
}

impl SelectedImage {
    /// Merge source metadata with the resolved path
    pub fn from_metadata(
        path: &str,
        metadata: Metadata,
        partition_table: Option<PartitionTable>,
    ) -> Self {
        let size = metadata
            .size
            .or(metadata.compressed_size)
            .unwrap_or_default();
        let (has_partition_table, partition_table_kind, partitions) = match partition_table {
            Some(table) => (true, Some(table.kind), table.partitions),
            None => (false, None, Vec::new()),
        };

        SelectedImage {
            path: path.to_string(),
            extension: extension(path).to_string(),
            name: metadata.name,
            size,
            compressed_size: metadata.compressed_size,
            is_size_estimated: metadata.is_size_estimated,
            is_compressed: metadata.is_compressed,
            logo: metadata.logo,
            block_map: metadata.block_map,
            has_partition_table,
            partition_table_kind,
            partitions,
        }
    }

    /// Metadata name, falling back to the basename of the path
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => basename(&self.path),
        }
    }
}

/// Advisory attached to a selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub title: String,
    pub message: String,
}

/// Warning for `image`, if any
///
/// Heuristics run in order and the first match wins: a Windows-looking
/// basename, then a missing partition table.
pub fn detect_warning(image: &SelectedImage) -> Option<Warning> {
    if looks_like_windows_image(&image.path) {
        Some(Warning {
            title: WINDOWS_IMAGE_TITLE.to_string(),
            message: messages::warning::looks_like_windows_image(),
        })
    } else if !image.has_partition_table {
        Some(Warning {
            title: MISSING_PARTITION_TABLE_TITLE.to_string(),
            message: messages::warning::missing_partition_table(),
        })
    } else {
        None
    }
}

/// Selection plus pending warning
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    image: Option<SelectedImage>,
    warning: Option<Warning>,
}

impl SelectionState {
    /// Install `image`, replacing the previous selection and its warning
    pub fn select(&mut self, image: SelectedImage) -> Option<&Warning> {
        self.warning = detect_warning(&image);
        self.image = Some(image);
        self.warning.as_ref()
    }

    /// Clear the selection and any pending warning
    pub fn deselect(&mut self) -> Option<SelectedImage> {
        self.warning = None;
        self.image.take()
    }

    /// Dismiss the warning, keeping the selection
    pub fn dismiss_warning(&mut self) -> Option<Warning> {
        self.warning.take()
    }

    pub fn image(&self) -> Option<&SelectedImage> {
        self.image.as_ref()
    }

    pub fn warning(&self) -> Option<&Warning> {
        self.warning.as_ref()
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        let image = self.image.as_ref();
        SelectionSnapshot {
            has_image: image.is_some(),
            image_name: image.map(|i| i.display_name().to_string()),
            image_path: image.map(|i| i.path.clone()),
            image_size: image.map(|i| i.size),
            image_size_text: image.map(|i| format_size(i.size)),
            image_logo: image.and_then(|i| i.logo.clone()),
            warning: self.warning.clone(),
        }
    }
}

/// What a view needs to render the selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionSnapshot {
    pub has_image: bool,
    pub image_name: Option<String>,
    pub image_path: Option<String>,
    pub image_size: Option<u64>,
    pub image_size_text: Option<String>,
    pub image_logo: Option<String>,
    pub warning: Option<Warning>,
}
