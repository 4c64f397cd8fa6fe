//! End-to-end resolution through `LocalSdk` against files on disk and a
//! minimal in-process HTTP server.

use std::io::Write;
use std::sync::Arc;

use image_source_selector::catalog::fetch_images;
use image_source_selector::source::PartitionTableKind;
use image_source_selector::{
    resolve_source, CatalogError, HttpCatalog, LocalSdk, MemoryStore, SelectError, SourceKind,
    SourceOptions, SourceSelector,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const IMAGE_LEN: usize = 1024 * 1024;

/// Image with a single bootable FAT32 primary partition
fn mbr_image() -> Vec<u8> {
    let mut image = vec![0u8; IMAGE_LEN];
    let entry = &mut image[446..462];
    entry[0] = 0x80;
    entry[4] = 0x0c;
    entry[8..12].copy_from_slice(&2048u32.to_le_bytes());
    entry[12..16].copy_from_slice(&(((IMAGE_LEN / 512) - 2048) as u32).to_le_bytes());
    image[510] = 0x55;
    image[511] = 0xAA;
    image
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn xz(data: &[u8]) -> Vec<u8> {
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Serve `body` at every path except `/missing*`, honouring `Range: bytes=0-N`
async fn serve(body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let image = Arc::new(body);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let image = image.clone();
            tokio::spawn(async move {
                let _ = respond(&mut socket, &image).await;
            });
        }
    });

    format!("http://{}", addr)
}

async fn respond(socket: &mut TcpStream, image: &[u8]) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buf[..n]);
    }

    let text = String::from_utf8_lossy(&request).to_string();
    let mut lines = text.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default();
    let path = request_line.next().unwrap_or_default();
    let range_end = lines
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("range")
                .then(|| value.trim().to_string())
        })
        .and_then(|range| range.strip_prefix("bytes=0-")?.parse::<usize>().ok());

    if path.starts_with("/missing") {
        socket
            .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await?;
        return socket.shutdown().await;
    }

    let (status, extra, body) = match range_end {
        Some(end) if method == "GET" => {
            let end = end.min(image.len() - 1);
            (
                "206 Partial Content",
                format!("Content-Range: bytes 0-{}/{}\r\n", end, image.len()),
                &image[..=end],
            )
        }
        _ => ("200 OK", String::new(), image),
    };

    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
        status,
        body.len(),
        extra
    );
    socket.write_all(head.as_bytes()).await?;
    if method == "GET" {
        socket.write_all(body).await?;
    }
    socket.shutdown().await
}

#[tokio::test]
async fn test_local_xz_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("armbian.img.xz");
    let compressed = xz(&mbr_image());
    std::fs::write(&path, &compressed).unwrap();

    let path = path.to_string_lossy().into_owned();
    let image = resolve_source(&LocalSdk, &SourceOptions::new(&path, SourceKind::File))
        .await
        .unwrap();

    assert_eq!(image.path, path);
    assert_eq!(image.extension, "xz");
    assert!(image.is_compressed);
    assert_eq!(image.size, compressed.len() as u64);
    assert!(image.has_partition_table);
    assert_eq!(image.partition_table_kind, Some(PartitionTableKind::Mbr));
    assert_eq!(image.partitions.len(), 1);
    assert!(image.partitions[0].bootable);
    assert_eq!(image.partitions[0].offset, 2048 * 512);
}

#[tokio::test]
async fn test_local_blank_image_warns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blank.img");
    std::fs::write(&path, vec![0u8; 64 * 1024]).unwrap();

    let mut selector = SourceSelector::new(Arc::new(LocalSdk), Arc::new(MemoryStore::new()));
    selector
        .select_image_by_path(&path.to_string_lossy(), SourceKind::File)
        .await
        .unwrap();

    assert!(!selector.selection().unwrap().has_partition_table);
    assert_eq!(
        selector.warning().unwrap().title,
        "Missing partition table"
    );
}

#[tokio::test]
async fn test_missing_local_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gone.img").to_string_lossy().into_owned();

    let err = resolve_source(&LocalSdk, &SourceOptions::new(&path, SourceKind::File))
        .await
        .unwrap_err();

    assert!(matches!(err, SelectError::OpenImage { .. }));
    assert!(err.user_error().description.contains("gone.img"));
}

#[tokio::test]
async fn test_http_raw_image() {
    let base = serve(mbr_image()).await;
    let url = format!("{}/images/armbian.img", base);

    let image = resolve_source(&LocalSdk, &SourceOptions::new(&url, SourceKind::Http))
        .await
        .unwrap();

    assert_eq!(image.path, url);
    assert!(!image.is_compressed);
    assert_eq!(image.size, IMAGE_LEN as u64);
    assert_eq!(image.partition_table_kind, Some(PartitionTableKind::Mbr));
}

#[tokio::test]
async fn test_http_gzip_image() {
    let compressed = gzip(&mbr_image());
    let compressed_len = compressed.len() as u64;
    let base = serve(compressed).await;
    let url = format!("{}/images/armbian.img.gz", base);

    let image = resolve_source(&LocalSdk, &SourceOptions::new(&url, SourceKind::Http))
        .await
        .unwrap();

    assert!(image.is_compressed);
    assert_eq!(image.compressed_size, Some(compressed_len));
    assert_eq!(image.size, compressed_len);
    assert!(image.has_partition_table);
    assert_eq!(image.partitions.len(), 1);
}

#[tokio::test]
async fn test_http_not_found() {
    let base = serve(mbr_image()).await;
    let url = format!("{}/missing/armbian.img", base);

    let err = resolve_source(&LocalSdk, &SourceOptions::new(&url, SourceKind::Http))
        .await
        .unwrap_err();

    assert!(matches!(err, SelectError::OpenImage { .. }));
    assert!(err.user_error().description.contains("404"));
}

fn catalog_json(image_base: &str) -> Vec<u8> {
    serde_json::json!([
        {
            "file_name": "ubuntu-22.04-c4.img",
            "file_size": "1.0M",
            "last_modified": "2024-03-01 10:00",
            "download_url": format!("{}/c4/ubuntu-22.04-c4.img", image_base)
        },
        {
            "file_name": "README.txt",
            "download_url": "ftp://mirror.example.com/README.txt"
        }
    ])
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn test_fetch_catalog_over_http() {
    let base = serve(catalog_json("https://dl.example.com")).await;

    let images = fetch_images(&format!("{}/list.json", base)).await.unwrap();

    assert_eq!(images.len(), 1);
    assert_eq!(images[0].file_name, "ubuntu-22.04-c4.img");
    assert_eq!(images[0].file_size, "1.0M");
    assert_eq!(
        images[0].download_url,
        "https://dl.example.com/c4/ubuntu-22.04-c4.img"
    );

    let err = fetch_images(&format!("{}/missing/list.json", base))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Http(ref msg) if msg.contains("404")));
}

#[tokio::test]
async fn test_fetch_catalog_rejects_non_json() {
    let base = serve(b"<html>maintenance</html>".to_vec()).await;
    let err = fetch_images(&format!("{}/list.json", base))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Parse(_)));
}

#[tokio::test]
async fn test_catalog_image_selected_over_http() {
    let image_base = serve(mbr_image()).await;
    let catalog_base = serve(catalog_json(&image_base)).await;

    let mut selector = SourceSelector::new(Arc::new(LocalSdk), Arc::new(MemoryStore::new()))
        .with_catalog(Arc::new(HttpCatalog::new(format!("{}/list.json", catalog_base))));

    let images = selector.fetch_catalog().await.unwrap();
    let url = images[0].download_url.clone();
    selector.select_catalog_image(&url).await.unwrap();

    assert_eq!(selector.recent_urls(), vec![url.clone()]);
    let image = selector.selection().unwrap();
    assert_eq!(image.path, url);
    assert_eq!(image.size, IMAGE_LEN as u64);
    assert_eq!(image.partition_table_kind, Some(PartitionTableKind::Mbr));
}
