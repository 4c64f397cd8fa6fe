//! Source SDK contract
//!
//! A source is opened from a descriptor, asked for its inner (possibly
//! decompressed) source, queried for metadata and partition table, and
//! closed. Every call returns a `Result`; the caller owns the release.
//!
//! `LocalSdk` implements the contract for local files and HTTP(S) URLs.

mod bmap;
mod compression;
mod file;
mod http;
mod partition;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::formats::is_http_url;

pub use bmap::{find_block_map, parse_block_map, BlockMap, BlockRange};
pub use compression::{read_prefix, Compression};
pub use file::FileSource;
pub use http::HttpSource;
pub use partition::{parse_partition_table, Partition, PartitionTable, PartitionTableKind};

/// Declared kind of a selection request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    File,
    Http,
}

impl SourceKind {
    /// Http for `http://` and `https://` prefixes, File otherwise
    pub fn infer(image_path: &str) -> Self {
        if is_http_url(image_path) {
            SourceKind::Http
        } else {
            SourceKind::File
        }
    }
}

/// What the flashing pipeline receives once an image is selected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceOptions {
    pub image_path: String,
    pub kind: SourceKind,
}

impl SourceOptions {
    pub fn new(image_path: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            image_path: image_path.into(),
            kind,
        }
    }
}

/// Concrete source to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    File { path: PathBuf },
    Http { url: String },
}

impl SourceDescriptor {
    /// Build a descriptor, rejecting Http requests that are not HTTP(S) URLs
    pub fn new(image_path: &str, kind: SourceKind) -> Result<Self, SourceError> {
        match kind {
            SourceKind::File => Ok(SourceDescriptor::File {
                path: PathBuf::from(image_path),
            }),
            SourceKind::Http if is_http_url(image_path) => Ok(SourceDescriptor::Http {
                url: image_path.to_string(),
            }),
            SourceKind::Http => Err(SourceError::UnsupportedProtocol(image_path.to_string())),
        }
    }
}

/// Metadata reported by a source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Uncompressed size, when known
    pub size: Option<u64>,
    /// Size of the compressed stream, for compressed sources
    pub compressed_size: Option<u64>,
    /// `size` is derived from a trailer rather than read exactly
    pub is_size_estimated: bool,
    pub is_compressed: bool,
    pub name: Option<String>,
    /// SVG logo shipped with the image
    pub logo: Option<String>,
    pub block_map: Option<BlockMap>,
}

/// Open source
#[async_trait]
pub trait SourceHandle: Send {
    /// Source yielding the image contents, decompressing if needed
    async fn inner_source(&mut self) -> Result<Box<dyn SourceHandle>, SourceError>;

    async fn metadata(&mut self) -> Result<Metadata, SourceError>;

    /// Partition table at the start of the image, `None` if there is none
    async fn partition_table(&mut self) -> Result<Option<PartitionTable>, SourceError>;

    /// Release the underlying handle. A second call fails with `Closed`.
    async fn close(&mut self) -> Result<(), SourceError>;
}

/// Entry point of a source SDK
#[async_trait]
pub trait SourceSdk: Send + Sync {
    async fn open(&self, descriptor: &SourceDescriptor)
        -> Result<Box<dyn SourceHandle>, SourceError>;
}

/// SDK over local files and HTTP(S) URLs
#[derive(Debug, Default, Clone)]
pub struct LocalSdk;

#[async_trait]
impl SourceSdk for LocalSdk {
    async fn open(
        &self,
        descriptor: &SourceDescriptor,
    ) -> Result<Box<dyn SourceHandle>, SourceError> {
        match descriptor {
            SourceDescriptor::File { path } => Ok(Box::new(FileSource::open(path).await?)),
            SourceDescriptor::Http { url } => Ok(Box::new(HttpSource::open(url).await?)),
        }
    }
}
