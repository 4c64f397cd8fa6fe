//! Image catalog
//!
//! Fetches the list of downloadable images offered by the catalog flow.
//! The catalog is a JSON array of entries; picking one hands its download
//! URL to the URL entry flow.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::CatalogError;
use crate::formats::is_http_url;
use crate::{log_debug, log_error, log_info};

const MODULE: &str = "catalog";

/// Downloadable image listed in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub file_name: String,
    /// Size as displayed by the catalog (e.g. "1.2G")
    #[serde(default)]
    pub file_size: String,
    #[serde(default)]
    pub last_modified: String,
    pub download_url: String,
}

/// Source of the image catalog
#[async_trait]
pub trait ImageCatalog: Send + Sync {
    async fn fetch_images(&self) -> Result<Vec<ImageInfo>, CatalogError>;
}

/// Catalog served as JSON over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    url: String,
}

impl HttpCatalog {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl ImageCatalog for HttpCatalog {
    async fn fetch_images(&self) -> Result<Vec<ImageInfo>, CatalogError> {
        fetch_images(&self.url).await
    }
}

/// Fetch the catalog at `url`
pub async fn fetch_images(url: &str) -> Result<Vec<ImageInfo>, CatalogError> {
    log_info!(MODULE, "Fetching image catalog from {}", url);

    let client = Client::builder()
        .user_agent(config::app::USER_AGENT)
        .timeout(Duration::from_secs(config::source::HTTP_TIMEOUT_SECS))
        .build()
        .map_err(|e| CatalogError::Http(format!("Failed to create HTTP client: {}", e)))?;

    let response = client.get(url).send().await.map_err(|e| {
        log_error!(MODULE, "Failed to fetch catalog: {}", e);
        CatalogError::Http(e.to_string())
    })?;

    if !response.status().is_success() {
        return Err(CatalogError::Http(format!(
            "Server returned {}",
            response.status()
        )));
    }

    let entries: Vec<ImageInfo> = response.json().await.map_err(|e| {
        log_error!(MODULE, "Failed to parse catalog JSON: {}", e);
        CatalogError::Parse(e.to_string())
    })?;

    let images = filter_downloadable(entries);
    log_info!(MODULE, "Loaded {} catalog images", images.len());
    Ok(images)
}

/// Keep entries with a name and an HTTP(S) download URL
pub fn filter_downloadable(entries: Vec<ImageInfo>) -> Vec<ImageInfo> {
    let total = entries.len();
    let images: Vec<ImageInfo> = entries
        .into_iter()
        .filter(|image| !image.file_name.is_empty() && is_http_url(&image.download_url))
        .collect();

    if images.len() < total {
        log_debug!(
            MODULE,
            "Skipped {} catalog entries without a usable download URL",
            total - images.len()
        );
    }
    images
}
