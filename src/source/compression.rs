//! Compression detection and streaming decoders
//!
//! Handles XZ, GZ, BZ2 and ZST streams using Rust native libraries. Only a
//! prefix of the decompressed stream is ever needed here.

use std::io::{BufReader, ErrorKind, Read};

use bzip2::read::BzDecoder;
use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};
use xz2::read::XzDecoder;
use zstd::stream::read::Decoder as ZstdDecoder;

use crate::config;
use crate::error::SourceError;
use crate::log_debug;
use crate::utils::extension;

const MODULE: &str = "source::compression";

/// Bytes needed to recognize every supported magic number
pub const MAGIC_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Xz,
    Gz,
    Bz2,
    Zstd,
}

impl Compression {
    /// Detect from the file extension of a path or URL
    pub fn from_extension(path: &str) -> Self {
        // Query strings are not part of the extension for URLs
        let path = path.split(['?', '#']).next().unwrap_or(path);
        match extension(path).to_lowercase().as_str() {
            "xz" => Compression::Xz,
            "gz" => Compression::Gz,
            "bz2" => Compression::Bz2,
            "zst" => Compression::Zstd,
            _ => Compression::None,
        }
    }

    /// Detect from the leading bytes of a stream
    pub fn from_magic(header: &[u8]) -> Option<Self> {
        if header.starts_with(&[0xFD, b'7', b'z', b'X', b'Z', 0x00]) {
            Some(Compression::Xz)
        } else if header.starts_with(&[0x1F, 0x8B]) {
            Some(Compression::Gz)
        } else if header.starts_with(b"BZh") {
            Some(Compression::Bz2)
        } else if header.starts_with(&[0x28, 0xB5, 0x2F, 0xFD]) {
            Some(Compression::Zstd)
        } else {
            None
        }
    }

    /// Magic bytes first, then the extension
    pub fn detect(path: &str, header: &[u8]) -> Self {
        Compression::from_magic(header).unwrap_or_else(|| Compression::from_extension(path))
    }

    pub fn is_compressed(self) -> bool {
        self != Compression::None
    }

    pub fn name(self) -> &'static str {
        match self {
            Compression::None => "raw",
            Compression::Xz => "xz",
            Compression::Gz => "gz",
            Compression::Bz2 => "bz2",
            Compression::Zstd => "zstd",
        }
    }

    /// Wrap `reader` in the matching decoder
    pub fn decoder<'a, R: Read + Send + 'a>(
        self,
        reader: R,
    ) -> Result<Box<dyn Read + Send + 'a>, SourceError> {
        let buffered = BufReader::with_capacity(config::source::DECOMPRESS_BUFFER_SIZE, reader);
        Ok(match self {
            Compression::None => Box::new(buffered),
            Compression::Xz => Box::new(XzDecoder::new_multi_decoder(buffered)),
            Compression::Gz => Box::new(MultiGzDecoder::new(buffered)),
            Compression::Bz2 => Box::new(BzDecoder::new(buffered)),
            Compression::Zstd => Box::new(ZstdDecoder::with_buffer(buffered).map_err(|e| {
                SourceError::Format(format!("Failed to create zstd decoder: {}", e))
            })?),
        })
    }
}

/// Read up to `limit` bytes from `reader`
///
/// With `allow_truncated`, a decoder error after some output has been
/// produced ends the read instead of failing it. Use this when the
/// compressed input itself is only a prefix of the stream.
pub fn read_prefix(
    reader: &mut dyn Read,
    limit: usize,
    format_name: &str,
    allow_truncated: bool,
) -> Result<Vec<u8>, SourceError> {
    let mut data = vec![0u8; limit];
    let mut filled = 0;

    while filled < limit {
        match reader.read(&mut data[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if allow_truncated && filled > 0 => {
                log_debug!(
                    MODULE,
                    "{} stream ended early after {} bytes: {}",
                    format_name,
                    filled,
                    e
                );
                break;
            }
            Err(e) => {
                return Err(SourceError::Format(format!(
                    "{} decompression error: {}",
                    format_name, e
                )))
            }
        }
    }

    data.truncate(filled);
    Ok(data)
}

/// Uncompressed size recorded in a gzip trailer (ISIZE, modulo 2^32)
pub fn gzip_size_from_trailer(trailer: [u8; 4]) -> u64 {
    u32::from_le_bytes(trailer) as u64
}
