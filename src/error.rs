//! Error types
//!
//! `SourceError` is what SDK calls fail with, `SelectError` is what a
//! selection attempt fails with and carries the user-facing dialog text.

use serde::Serialize;
use thiserror::Error;

use crate::messages;
use crate::utils::basename;

/// Failure of a single source SDK call
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("{0}")]
    Format(String),

    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("Source is closed")]
    Closed,
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        SourceError::Http(e.to_string())
    }
}

/// Failure of a selection attempt
#[derive(Debug, Error)]
pub enum SelectError {
    /// Non-HTTP(S) string submitted as a URL; no I/O was attempted
    #[error("Unsupported protocol for {path}")]
    UnsupportedProtocol { path: String },

    /// Opening the source or reading its metadata or partition table failed
    #[error("Error opening image {path}")]
    OpenImage {
        path: String,
        #[source]
        source: SourceError,
    },
}

impl SelectError {
    pub fn open_image(path: &str, source: SourceError) -> Self {
        SelectError::OpenImage {
            path: path.to_string(),
            source,
        }
    }

    /// Dialog contents shown for this error
    pub fn user_error(&self) -> UserError {
        match self {
            SelectError::UnsupportedProtocol { .. } => UserError {
                title: "Unsupported protocol".to_string(),
                description: messages::error::unsupported_protocol(),
            },
            SelectError::OpenImage { path, source } => UserError {
                title: "Error opening image".to_string(),
                description: messages::error::open_image(basename(path), &source.to_string()),
            },
        }
    }
}

/// Error as presented to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserError {
    pub title: String,
    pub description: String,
}

/// Persisted store failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store contents are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Image catalog failure
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("No image catalog configured")]
    NotConfigured,

    #[error("Failed to fetch image catalog: {0}")]
    Http(String),

    #[error("Failed to parse image catalog: {0}")]
    Parse(String),
}

impl CatalogError {
    /// Dialog contents shown when the catalog cannot be loaded
    pub fn user_error(&self) -> UserError {
        UserError {
            title: "Error loading images".to_string(),
            description: self.to_string(),
        }
    }
}

/// Host collaborator failure (file picker)
#[derive(Debug, Error)]
pub enum HostError {
    #[error("File picker failed: {0}")]
    Picker(String),
}
