//! Block map (.bmap) sidecar files
//!
//! A bmap lists which blocks of an image carry data, letting the flasher
//! skip the rest. Only discovery and parsing live here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use xmltree::{Element, XMLNode};

use crate::error::SourceError;
use crate::utils::strip_compression_ext;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMap {
    pub version: Option<String>,
    pub image_size: u64,
    pub block_size: u64,
    pub blocks_count: u64,
    pub mapped_blocks_count: u64,
    pub checksum_type: Option<String>,
    pub ranges: Vec<BlockRange>,
}

/// Inclusive block range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub start: u64,
    pub end: u64,
    pub checksum: Option<String>,
}

/// Locate a bmap next to `image_path`
///
/// For `os.img.xz` this tries `os.img.xz.bmap`, `os.img.bmap` and `os.bmap`.
pub fn find_block_map(image_path: &Path) -> Option<PathBuf> {
    let file_name = image_path.file_name()?.to_str()?;
    let uncompressed = strip_compression_ext(file_name);
    let stem = uncompressed
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(uncompressed);

    [file_name, uncompressed, stem]
        .iter()
        .map(|base| image_path.with_file_name(format!("{}.bmap", base)))
        .find(|candidate| candidate.is_file())
}

/// Parse bmap XML
pub fn parse_block_map(xml: &[u8]) -> Result<BlockMap, SourceError> {
    let root = Element::parse(xml)
        .map_err(|e| SourceError::Format(format!("Invalid bmap XML: {}", e)))?;

    if !root.name.eq_ignore_ascii_case("bmap") {
        return Err(SourceError::Format(format!(
            "Unexpected bmap root element: {}",
            root.name
        )));
    }

    let checksum_type = child_text(&root, "ChecksumType");
    let ranges = match root.get_child("BlockMap") {
        Some(block_map) => parse_ranges(block_map)?,
        None => Vec::new(),
    };

    Ok(BlockMap {
        version: root.attributes.get("version").cloned(),
        image_size: child_number(&root, "ImageSize")?,
        block_size: child_number(&root, "BlockSize")?,
        blocks_count: child_number(&root, "BlocksCount")?,
        mapped_blocks_count: child_number(&root, "MappedBlocksCount")?,
        checksum_type,
        ranges,
    })
}

fn child_text(parent: &Element, name: &str) -> Option<String> {
    parent
        .get_child(name)
        .and_then(|e| e.get_text())
        .map(|t| t.trim().to_string())
}

fn child_number(parent: &Element, name: &str) -> Result<u64, SourceError> {
    let text = child_text(parent, name)
        .ok_or_else(|| SourceError::Format(format!("bmap is missing <{}>", name)))?;
    text.parse()
        .map_err(|_| SourceError::Format(format!("Invalid <{}> value in bmap: {}", name, text)))
}

fn parse_ranges(block_map: &Element) -> Result<Vec<BlockRange>, SourceError> {
    block_map
        .children
        .iter()
        .filter_map(|node| match node {
            XMLNode::Element(e) if e.name == "Range" => Some(e),
            _ => None,
        })
        .map(|range| {
            let text = range.get_text().map(|t| t.trim().to_string()).unwrap_or_default();
            let (start, end) = match text.split_once('-') {
                Some((start, end)) => (start.trim(), end.trim()),
                None => (text.as_str(), text.as_str()),
            };
            let parse = |v: &str| {
                v.parse::<u64>()
                    .map_err(|_| SourceError::Format(format!("Invalid bmap range: {}", text)))
            };
            Ok(BlockRange {
                start: parse(start)?,
                end: parse(end)?,
                checksum: range.attributes.get("chksum").cloned(),
            })
        })
        .collect()
}
