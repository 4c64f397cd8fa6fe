//! Fakes for the selector collaborators

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image_source_selector::error::{CatalogError, HostError};
use image_source_selector::host::{Dialogs, ExceptionReporter, FilePicker};
use image_source_selector::source::{
    Metadata, PartitionTable, PartitionTableKind, SourceDescriptor, SourceHandle,
};
use image_source_selector::{ImageCatalog, ImageInfo, SourceError, SourceSdk, UserError};

/// SDK call that should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Open,
    InnerSource,
    Metadata,
    PartitionTable,
    Close,
}

/// SDK answering every open with the same scripted source
#[derive(Clone)]
pub struct ScriptedSdk {
    pub metadata: Metadata,
    pub partition_table: Option<PartitionTable>,
    pub fail_at: Option<FailAt>,
    pub opened: Arc<Mutex<Vec<SourceDescriptor>>>,
    pub closes: Arc<AtomicUsize>,
}

impl ScriptedSdk {
    pub fn new() -> Self {
        ScriptedSdk {
            metadata: Metadata {
                size: Some(4 * 1024 * 1024 * 1024),
                ..Metadata::default()
            },
            partition_table: Some(PartitionTable {
                kind: PartitionTableKind::Mbr,
                partitions: Vec::new(),
            }),
            fail_at: None,
            opened: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn without_partition_table(mut self) -> Self {
        self.partition_table = None;
        self
    }

    pub fn failing_at(mut self, step: FailAt) -> Self {
        self.fail_at = Some(step);
        self
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> Vec<SourceDescriptor> {
        self.opened.lock().unwrap().clone()
    }

    fn check(&self, step: FailAt) -> Result<(), SourceError> {
        if self.fail_at == Some(step) {
            Err(SourceError::Format(format!("{:?} failed", step)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SourceSdk for ScriptedSdk {
    async fn open(
        &self,
        descriptor: &SourceDescriptor,
    ) -> Result<Box<dyn SourceHandle>, SourceError> {
        self.opened.lock().unwrap().push(descriptor.clone());
        self.check(FailAt::Open)?;
        Ok(Box::new(ScriptedHandle { sdk: self.clone() }))
    }
}

struct ScriptedHandle {
    sdk: ScriptedSdk,
}

#[async_trait]
impl SourceHandle for ScriptedHandle {
    async fn inner_source(&mut self) -> Result<Box<dyn SourceHandle>, SourceError> {
        self.sdk.check(FailAt::InnerSource)?;
        Ok(Box::new(ScriptedHandle {
            sdk: self.sdk.clone(),
        }))
    }

    async fn metadata(&mut self) -> Result<Metadata, SourceError> {
        self.sdk.check(FailAt::Metadata)?;
        Ok(self.sdk.metadata.clone())
    }

    async fn partition_table(&mut self) -> Result<Option<PartitionTable>, SourceError> {
        self.sdk.check(FailAt::PartitionTable)?;
        Ok(self.sdk.partition_table.clone())
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        self.sdk.closes.fetch_add(1, Ordering::SeqCst);
        self.sdk.check(FailAt::Close)
    }
}

#[derive(Default)]
pub struct RecordingDialogs {
    pub shown: Mutex<Vec<UserError>>,
}

impl RecordingDialogs {
    pub fn shown(&self) -> Vec<UserError> {
        self.shown.lock().unwrap().clone()
    }
}

impl Dialogs for RecordingDialogs {
    fn show_error(&self, error: &UserError) {
        self.shown.lock().unwrap().push(error.clone());
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    pub reported: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn reported(&self) -> Vec<String> {
        self.reported.lock().unwrap().clone()
    }
}

impl ExceptionReporter for RecordingReporter {
    fn report(&self, error: &(dyn std::error::Error + 'static)) {
        self.reported.lock().unwrap().push(error.to_string());
    }
}

/// Picker returning a fixed answer
pub enum StaticPicker {
    Picked(String),
    Cancelled,
    Broken,
}

#[async_trait]
impl FilePicker for StaticPicker {
    async fn pick_image(&self) -> Result<Option<String>, HostError> {
        match self {
            StaticPicker::Picked(path) => Ok(Some(path.clone())),
            StaticPicker::Cancelled => Ok(None),
            StaticPicker::Broken => Err(HostError::Picker("no display".to_string())),
        }
    }
}

/// Catalog returning a fixed list, or failing when `None`
pub struct StaticCatalog(pub Option<Vec<ImageInfo>>);

impl StaticCatalog {
    pub fn image(file_name: &str, download_url: &str) -> ImageInfo {
        ImageInfo {
            file_name: file_name.to_string(),
            file_size: "1.1G".to_string(),
            last_modified: "2024-03-01 10:00".to_string(),
            download_url: download_url.to_string(),
        }
    }
}

#[async_trait]
impl ImageCatalog for StaticCatalog {
    async fn fetch_images(&self) -> Result<Vec<ImageInfo>, CatalogError> {
        self.0
            .clone()
            .ok_or_else(|| CatalogError::Http("Server returned 503".to_string()))
    }
}
