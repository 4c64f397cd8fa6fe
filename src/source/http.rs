//! HTTP(S) source
//!
//! Size comes from a HEAD request; the partition table from a ranged GET of
//! the first bytes, decoded when the remote image is compressed.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::{Client, StatusCode};

use super::compression::{read_prefix, Compression, MAGIC_LEN};
use super::partition::{parse_partition_table, PartitionTable};
use super::{Metadata, SourceHandle};
use crate::config;
use crate::error::SourceError;
use crate::utils::{basename, bytes_to_mb};
use crate::{log_debug, log_info};

const MODULE: &str = "source::http";

/// Decoded start of the remote image
#[derive(Debug, Clone)]
struct Probe {
    compression: Compression,
    prefix: Vec<u8>,
}

/// Remote image addressed by an HTTP(S) URL
#[derive(Debug)]
pub struct HttpSource {
    url: String,
    client: Option<Client>,
    content_length: Option<u64>,
    probe: Option<Probe>,
}

impl HttpSource {
    pub async fn open(url: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(config::app::USER_AGENT)
            .timeout(Duration::from_secs(config::source::HTTP_TIMEOUT_SECS))
            .build()?;

        log_info!(MODULE, "Opening {}", url);
        let response = client.head(url).send().await?;
        let status = response.status();

        // Some servers refuse HEAD; the ranged GET still works for them
        let content_length = if status.is_success() {
            header_u64(response.headers().get(CONTENT_LENGTH))
        } else if matches!(
            status,
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
        ) {
            log_debug!(MODULE, "HEAD not supported by server ({})", status);
            None
        } else {
            return Err(SourceError::Http(format!("Server returned {}", status)));
        };

        if let Some(length) = content_length {
            log_debug!(
                MODULE,
                "Remote size: {} bytes ({:.2} MB)",
                length,
                bytes_to_mb(length)
            );
        }

        Ok(HttpSource {
            url: url.to_string(),
            client: Some(client),
            content_length,
            probe: None,
        })
    }

    fn client(&self) -> Result<&Client, SourceError> {
        self.client.as_ref().ok_or(SourceError::Closed)
    }

    /// Fetch and decode the first bytes of the image, once
    async fn probe(&mut self) -> Result<&Probe, SourceError> {
        if self.probe.is_none() {
            let (probe, total) = fetch_probe(self.client()?, &self.url).await?;
            if self.content_length.is_none() {
                self.content_length = total;
            }
            self.probe = Some(probe);
        }
        self.probe
            .as_ref()
            .ok_or_else(|| SourceError::Http("Probe unavailable".to_string()))
    }
}

#[async_trait]
impl SourceHandle for HttpSource {
    async fn inner_source(&mut self) -> Result<Box<dyn SourceHandle>, SourceError> {
        let probe = self.probe().await?.clone();
        if probe.compression.is_compressed() {
            log_info!(
                MODULE,
                "Detected {} compression for {}",
                probe.compression.name(),
                basename(&self.url)
            );
        }

        Ok(Box::new(HttpSource {
            url: self.url.clone(),
            client: Some(self.client()?.clone()),
            content_length: self.content_length,
            probe: Some(probe),
        }))
    }

    async fn metadata(&mut self) -> Result<Metadata, SourceError> {
        self.client()?;
        let compression = match &self.probe {
            Some(probe) => probe.compression,
            None => Compression::from_extension(&self.url),
        };

        let mut metadata = Metadata {
            is_compressed: compression.is_compressed(),
            ..Metadata::default()
        };
        if compression.is_compressed() {
            metadata.compressed_size = self.content_length;
        } else {
            metadata.size = self.content_length;
        }
        Ok(metadata)
    }

    async fn partition_table(&mut self) -> Result<Option<PartitionTable>, SourceError> {
        let probe = self.probe().await?;
        parse_partition_table(&probe.prefix)
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        match self.client.take() {
            Some(_) => Ok(()),
            None => Err(SourceError::Closed),
        }
    }
}

fn header_u64(value: Option<&reqwest::header::HeaderValue>) -> Option<u64> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Total length from a `Content-Range: bytes 0-99/1234` header
fn content_range_total(value: Option<&reqwest::header::HeaderValue>) -> Option<u64> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit_once('/'))
        .and_then(|(_, total)| total.trim().parse().ok())
}

/// Download the start of the image and decode the partition probe
///
/// Returns the probe and the total size reported by a ranged response.
async fn fetch_probe(client: &Client, url: &str) -> Result<(Probe, Option<u64>), SourceError> {
    let range_end = config::source::HTTP_COMPRESSED_PROBE_BYTES - 1;
    let response = client
        .get(url)
        .header(RANGE, format!("bytes=0-{}", range_end))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Http(format!("Server returned {}", status)));
    }

    let total = if status == StatusCode::PARTIAL_CONTENT {
        content_range_total(response.headers().get(CONTENT_RANGE))
    } else {
        // Range ignored, the body is the whole image
        header_u64(response.headers().get(CONTENT_LENGTH))
    };

    let mut stream = response.bytes_stream();
    let mut raw: Vec<u8> = Vec::new();
    let mut compression = None;
    let mut limit = config::source::HTTP_COMPRESSED_PROBE_BYTES;

    while let Some(chunk) = stream.next().await {
        raw.extend_from_slice(&chunk?);

        if compression.is_none() && raw.len() >= MAGIC_LEN {
            let detected = Compression::detect(url, &raw[..MAGIC_LEN]);
            if !detected.is_compressed() {
                limit = config::source::PARTITION_PROBE_BYTES;
            }
            compression = Some(detected);
        }

        if raw.len() >= limit {
            break;
        }
    }
    raw.truncate(limit);

    let compression = compression.unwrap_or_else(|| Compression::detect(url, &raw));
    log_debug!(
        MODULE,
        "Fetched {} bytes of {} ({})",
        raw.len(),
        basename(url),
        compression.name()
    );

    let prefix = if compression.is_compressed() {
        tokio::task::spawn_blocking(move || {
            let mut decoder = compression.decoder(std::io::Cursor::new(raw))?;
            read_prefix(
                &mut decoder,
                config::source::PARTITION_PROBE_BYTES,
                compression.name(),
                true,
            )
        })
        .await
        .map_err(|e| SourceError::Io(std::io::Error::other(format!("Task failed: {}", e))))??
    } else {
        raw
    };

    Ok((
        Probe {
            compression,
            prefix,
        },
        total,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_content_range_total() {
        let value = HeaderValue::from_static("bytes 0-4194303/123456789");
        assert_eq!(content_range_total(Some(&value)), Some(123456789));

        let unknown = HeaderValue::from_static("bytes 0-99/*");
        assert_eq!(content_range_total(Some(&unknown)), None);
        assert_eq!(content_range_total(None), None);
    }

    #[test]
    fn test_header_u64() {
        let value = HeaderValue::from_static(" 2048 ");
        assert_eq!(header_u64(Some(&value)), Some(2048));
        let invalid = HeaderValue::from_static("lots");
        assert_eq!(header_u64(Some(&invalid)), None);
    }
}
