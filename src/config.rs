//! Application configuration
//!
//! Compile-time constants grouped by concern, plus the runtime settings
//! persisted in the key-value store.

use serde::{Deserialize, Serialize};

use crate::store::KeyValueStore;
use crate::{log_debug, log_warn};

pub mod app {
    /// Application name, used for cache and config directories
    pub const NAME: &str = "image-source-selector";
    /// User agent for HTTP sources
    pub const USER_AGENT: &str = concat!("image-source-selector/", env!("CARGO_PKG_VERSION"));
}

pub mod store {
    /// Store file name inside the config directory
    pub const FILE_NAME: &str = "store.json";
    /// Key holding the JSON-encoded recent URL list
    pub const RECENT_URLS_KEY: &str = "recentUrlImages";
    /// Key holding the developer mode flag
    pub const DEVELOPER_MODE_KEY: &str = "developer_mode";
    /// Key holding the image catalog URL
    pub const CATALOG_URL_KEY: &str = "catalog_url";
    /// Maximum number of recent URLs kept
    pub const MAX_RECENT_URLS: usize = 5;
}

pub mod events {
    /// Inbound: an external process asks to select an image path or URL
    pub const SELECT_IMAGE: &str = "select-image";
    /// Outbound: the selector is ready to receive inbound requests
    pub const SOURCE_SELECTOR_READY: &str = "source-selector-ready";
    /// Outbound: the selection changed
    pub const SELECTION_CHANGED: &str = "selection-changed";
    /// Outbound: a selection raised an advisory warning
    pub const WARNING: &str = "warning";
    /// Outbound: the image catalog was fetched
    pub const CATALOG: &str = "catalog";
}

pub mod source {
    /// Sector size assumed for partition table parsing
    pub const SECTOR_SIZE: usize = 512;
    /// Decompressed bytes read for partition table detection
    /// (protective MBR + GPT header + 128 entries of 128 bytes)
    pub const PARTITION_PROBE_BYTES: usize = 34 * SECTOR_SIZE;
    /// Upper bound on compressed bytes fetched from a remote image to
    /// decode the partition probe
    pub const HTTP_COMPRESSED_PROBE_BYTES: usize = 4 * 1024 * 1024;
    /// Read buffer for decoders
    pub const DECOMPRESS_BUFFER_SIZE: usize = 64 * 1024;
    /// HTTP request timeout in seconds
    pub const HTTP_TIMEOUT_SECS: u64 = 30;
}

pub mod logging {
    /// Number of session log files kept in the cache directory
    pub const MAX_LOG_FILES: usize = 10;
}

const MODULE: &str = "config";

/// Runtime settings persisted in the key-value store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub developer_mode: bool,
    /// JSON list of downloadable images offered by the catalog flow
    pub catalog_url: Option<String>,
}

impl Settings {
    /// Load settings, falling back to defaults for missing or invalid entries
    pub fn load(kv: &dyn KeyValueStore) -> Self {
        let developer_mode = load_value::<bool>(kv, store::DEVELOPER_MODE_KEY).unwrap_or(false);
        let catalog_url = load_text(kv, store::CATALOG_URL_KEY);

        log_debug!(
            MODULE,
            "Loaded settings: developer_mode={}, catalog_url={:?}",
            developer_mode,
            catalog_url
        );
        Self {
            developer_mode,
            catalog_url,
        }
    }
}

/// Read and decode a JSON setting, `None` when missing or invalid
fn load_value<T: serde::de::DeserializeOwned>(kv: &dyn KeyValueStore, key: &str) -> Option<T> {
    match kv.load(key) {
        Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                log_warn!(MODULE, "Invalid {} value {:?}: {}", key, raw, e);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            log_warn!(MODULE, "Failed to read {}: {}. Using default.", key, e);
            None
        }
    }
}

/// Read a plain-text setting, `None` when missing or blank
fn load_text(kv: &dyn KeyValueStore, key: &str) -> Option<String> {
    match kv.load(key) {
        Ok(Some(raw)) => {
            let text = raw.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Ok(None) => None,
        Err(e) => {
            log_warn!(MODULE, "Failed to read {}: {}", key, e);
            None
        }
    }
}
