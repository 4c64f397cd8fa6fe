//! Local file source

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::bmap::{find_block_map, parse_block_map};
use super::compression::{gzip_size_from_trailer, read_prefix, Compression, MAGIC_LEN};
use super::partition::{parse_partition_table, PartitionTable};
use super::{Metadata, SourceHandle};
use crate::config;
use crate::error::SourceError;
use crate::{log_debug, log_info, log_warn};

const MODULE: &str = "source::file";

/// Smallest possible gzip member (header + empty deflate block + trailer)
const GZIP_MIN_LEN: u64 = 18;

/// Image file on a local filesystem
///
/// The handle returned by `open` reads the file as-is; its inner source
/// decodes the compression detected from the magic bytes or extension.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    file: Option<File>,
    len: u64,
    compression: Compression,
}

impl FileSource {
    pub async fn open(path: &Path) -> Result<Self, SourceError> {
        let path = path.to_path_buf();
        log_debug!(MODULE, "Opening {}", path.display());

        blocking(move || {
            let file = File::open(&path)?;
            let metadata = file.metadata()?;
            if !metadata.is_file() {
                return Err(SourceError::Format(format!(
                    "{} is not a regular file",
                    path.display()
                )));
            }

            Ok(FileSource {
                len: metadata.len(),
                path,
                file: Some(file),
                compression: Compression::None,
            })
        })
        .await
    }

    fn handle(&self) -> Result<File, SourceError> {
        let file = self.file.as_ref().ok_or(SourceError::Closed)?;
        Ok(file.try_clone()?)
    }
}

#[async_trait]
impl SourceHandle for FileSource {
    async fn inner_source(&mut self) -> Result<Box<dyn SourceHandle>, SourceError> {
        let mut file = self.handle()?;
        let path = self.path.clone();
        let len = self.len;
        let current = self.compression;

        let inner = blocking(move || {
            let compression = if current.is_compressed() {
                current
            } else {
                let mut header = [0u8; MAGIC_LEN];
                file.seek(SeekFrom::Start(0))?;
                let read = read_prefix(&mut file, MAGIC_LEN, "raw", false)?;
                header[..read.len()].copy_from_slice(&read);
                Compression::detect(&path.to_string_lossy(), &header[..read.len()])
            };

            Ok(FileSource {
                path,
                file: Some(file),
                len,
                compression,
            })
        })
        .await?;

        if inner.compression.is_compressed() {
            log_info!(
                MODULE,
                "Detected {} compression for {}",
                inner.compression.name(),
                inner.path.display()
            );
        }

        Ok(Box::new(inner))
    }

    async fn metadata(&mut self) -> Result<Metadata, SourceError> {
        let mut file = self.handle()?;
        let path = self.path.clone();
        let len = self.len;
        let compression = self.compression;

        blocking(move || {
            let mut metadata = Metadata {
                is_compressed: compression.is_compressed(),
                ..Metadata::default()
            };

            match compression {
                Compression::None => metadata.size = Some(len),
                Compression::Gz if len >= GZIP_MIN_LEN => {
                    let mut trailer = [0u8; 4];
                    file.seek(SeekFrom::End(-4))?;
                    file.read_exact(&mut trailer)?;
                    metadata.size = Some(gzip_size_from_trailer(trailer));
                    metadata.is_size_estimated = true;
                    metadata.compressed_size = Some(len);
                }
                _ => metadata.compressed_size = Some(len),
            }

            if let Some(bmap_path) = find_block_map(&path) {
                match std::fs::read(&bmap_path)
                    .map_err(SourceError::from)
                    .and_then(|xml| parse_block_map(&xml))
                {
                    Ok(block_map) => {
                        log_debug!(MODULE, "Using block map {}", bmap_path.display());
                        metadata.block_map = Some(block_map);
                    }
                    Err(e) => {
                        log_warn!(
                            MODULE,
                            "Ignoring unreadable block map {}: {}",
                            bmap_path.display(),
                            e
                        );
                    }
                }
            }

            Ok(metadata)
        })
        .await
    }

    async fn partition_table(&mut self) -> Result<Option<PartitionTable>, SourceError> {
        let mut file = self.handle()?;
        let compression = self.compression;

        let prefix = blocking(move || {
            file.seek(SeekFrom::Start(0))?;
            let mut decoder = compression.decoder(file)?;
            read_prefix(
                &mut decoder,
                config::source::PARTITION_PROBE_BYTES,
                compression.name(),
                false,
            )
        })
        .await?;

        parse_partition_table(&prefix)
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        match self.file.take() {
            Some(_) => {
                log_debug!(MODULE, "Closed {}", self.path.display());
                Ok(())
            }
            None => Err(SourceError::Closed),
        }
    }
}

/// Run blocking file work off the async runtime
async fn blocking<T, F>(f: F) -> Result<T, SourceError>
where
    F: FnOnce() -> Result<T, SourceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SourceError::Io(std::io::Error::other(format!("Task failed: {}", e))))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::partition::tests::{gpt_image, mbr_image};
    use crate::source::PartitionTableKind;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSource::open(&dir.path().join("missing.img"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Io(_)));
    }

    #[tokio::test]
    async fn test_open_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileSource::open(dir.path()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_raw_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "os.img", &mbr_image(1024 * 1024));

        let mut source = FileSource::open(&path).await.unwrap();
        let mut inner = source.inner_source().await.unwrap();

        let metadata = inner.metadata().await.unwrap();
        assert_eq!(metadata.size, Some(1024 * 1024));
        assert!(!metadata.is_compressed);
        assert!(metadata.block_map.is_none());

        let table = inner.partition_table().await.unwrap().unwrap();
        assert_eq!(table.kind, PartitionTableKind::Mbr);

        source.close().await.unwrap();
        assert!(matches!(source.close().await, Err(SourceError::Closed)));
    }

    #[tokio::test]
    async fn test_gzip_image_by_magic() {
        let dir = tempfile::tempdir().unwrap();
        let image = gpt_image(2 * 1024 * 1024);
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&image).unwrap();
        let compressed = encoder.finish().unwrap();
        // No compression extension: detection relies on the magic bytes
        let path = write_file(dir.path(), "os.img", &compressed);

        let mut source = FileSource::open(&path).await.unwrap();
        let mut inner = source.inner_source().await.unwrap();

        let metadata = inner.metadata().await.unwrap();
        assert!(metadata.is_compressed);
        assert!(metadata.is_size_estimated);
        assert_eq!(metadata.size, Some(image.len() as u64));
        assert_eq!(metadata.compressed_size, Some(compressed.len() as u64));

        let table = inner.partition_table().await.unwrap().unwrap();
        assert_eq!(table.kind, PartitionTableKind::Gpt);
        assert_eq!(table.partitions[0].name.as_deref(), Some("rootfs"));

        source.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_xz_image_without_partition_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        encoder.write_all(&vec![0u8; 256 * 1024]).unwrap();
        let path = write_file(dir.path(), "blank.img.xz", &encoder.finish().unwrap());

        let mut source = FileSource::open(&path).await.unwrap();
        let mut inner = source.inner_source().await.unwrap();

        let metadata = inner.metadata().await.unwrap();
        assert!(metadata.is_compressed);
        assert_eq!(metadata.size, None);
        assert!(metadata.compressed_size.is_some());
        assert_eq!(inner.partition_table().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_compressed_image() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = vec![0xFD, b'7', b'z', b'X', b'Z', 0x00];
        data.extend_from_slice(&[0xAB; 4096]);
        let path = write_file(dir.path(), "broken.img.xz", &data);

        let mut source = FileSource::open(&path).await.unwrap();
        let mut inner = source.inner_source().await.unwrap();
        assert!(matches!(
            inner.partition_table().await,
            Err(SourceError::Format(_))
        ));
    }

    #[tokio::test]
    async fn test_block_map_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "os.img", &mbr_image(8192));
        write_file(
            dir.path(),
            "os.bmap",
            b"<bmap version=\"2.0\"><ImageSize>8192</ImageSize><BlockSize>4096</BlockSize>\
              <BlocksCount>2</BlocksCount><MappedBlocksCount>1</MappedBlocksCount>\
              <BlockMap><Range>0</Range></BlockMap></bmap>",
        );

        let mut source = FileSource::open(&path).await.unwrap();
        let mut inner = source.inner_source().await.unwrap();
        let block_map = inner.metadata().await.unwrap().block_map.unwrap();
        assert_eq!(block_map.mapped_blocks_count, 1);
        assert_eq!(block_map.ranges.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_source_rejects_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "os.img", &mbr_image(4096));

        let mut source = FileSource::open(&path).await.unwrap();
        source.close().await.unwrap();
        assert!(matches!(
            source.inner_source().await,
            Err(SourceError::Closed)
        ));
        assert!(matches!(source.metadata().await, Err(SourceError::Closed)));
    }
}
