//! Recent URL history
//!
//! Bounded list of previously entered image URLs, persisted as a JSON array
//! under a single store key and used to pre-populate URL entry.

use std::sync::Arc;

use serde_json::Value;

use crate::config;
use crate::error::StoreError;
use crate::store::KeyValueStore;
use crate::{log_debug, log_warn};

const MODULE: &str = "recent";

/// Normalize a decoded recent URL list
///
/// Anything other than an array yields an empty list. Non-string and empty
/// entries are dropped, a duplicate keeps its first position, and only the
/// last `MAX_RECENT_URLS` entries survive.
pub fn normalize_recent_urls(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => normalize_entries(items.iter().filter_map(Value::as_str)),
        _ => Vec::new(),
    }
}

fn normalize_entries<'a>(entries: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for url in entries.filter(|u| !u.is_empty()) {
        if !urls.iter().any(|existing| existing == url) {
            urls.push(url.to_string());
        }
    }

    let excess = urls.len().saturating_sub(config::store::MAX_RECENT_URLS);
    urls.drain(..excess);
    urls
}

/// Recent URL list over an injected store
#[derive(Clone)]
pub struct RecentUrls {
    store: Arc<dyn KeyValueStore>,
}

impl RecentUrls {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Current normalized list, oldest first
    ///
    /// Unreadable or malformed entries yield an empty list.
    pub fn get(&self) -> Vec<String> {
        let raw = match self.store.load(config::store::RECENT_URLS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                log_warn!(MODULE, "Failed to load recent URLs: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => normalize_recent_urls(&value),
            Err(e) => {
                log_debug!(MODULE, "Ignoring malformed recent URL list: {}", e);
                Vec::new()
            }
        }
    }

    /// Merge `url` into the list and persist it
    pub fn append(&self, url: &str) -> Result<Vec<String>, StoreError> {
        let current = self.get();
        let urls = normalize_entries(current.iter().map(String::as_str).chain([url]));

        let encoded = serde_json::to_string(&urls)?;
        self.store.save(config::store::RECENT_URLS_KEY, &encoded)?;

        log_debug!(MODULE, "Recent URLs updated ({} entries)", urls.len());
        Ok(urls)
    }
}
