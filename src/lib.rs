//! Image Source Selector - pick the image a disk flasher will write
//!
//! Resolves local files and HTTP(S) URLs through a source SDK, inspects
//! their metadata and partition table, and keeps the active selection with
//! its advisory warning. User actions arrive as requests on a single
//! channel; results leave as events.

pub mod logging;

pub mod catalog;
pub mod config;
pub mod error;
pub mod formats;
pub mod host;
pub mod ipc;
pub mod messages;
pub mod network_drive;
pub mod recent;
pub mod resolve;
pub mod selection;
pub mod selector;
pub mod source;
pub mod store;
pub mod utils;

#[cfg(feature = "desktop")]
pub mod desktop;

pub use catalog::{HttpCatalog, ImageCatalog, ImageInfo};
pub use error::{CatalogError, SelectError, SourceError, StoreError, UserError};
pub use ipc::{DropPayload, OutboundEvent, SelectorRequest};
pub use resolve::resolve_source;
pub use selection::{SelectedImage, SelectionSnapshot, Warning};
pub use selector::{DragResponse, SourceSelector};
pub use source::{LocalSdk, SourceKind, SourceOptions, SourceSdk};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
