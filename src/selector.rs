//! Image source selector
//!
//! Owns the active selection and turns user actions (file picker, URL
//! entry, drops, inbound `select-image` requests, warning answers) into
//! source resolutions and state changes.

use std::sync::Arc;

use crate::catalog::{ImageCatalog, ImageInfo};
use crate::error::{CatalogError, SelectError};
use crate::host::{
    Dialogs, EventSink, ExceptionReporter, FilePicker, LogDialogs, LogReporter, NoFilePicker,
    NullEvents,
};
use crate::ipc::{DropPayload, OutboundEvent, SelectorRequest};
use crate::network_drive::replace_windows_network_drive_letter;
use crate::recent::RecentUrls;
use crate::resolve::resolve_source;
use crate::selection::{SelectedImage, SelectionSnapshot, SelectionState, Warning};
use crate::source::{SourceKind, SourceOptions, SourceSdk};
use crate::store::KeyValueStore;
use crate::{log_debug, log_info, log_warn};

const MODULE: &str = "selector";

/// Continuation run after every successful selection
pub type AfterSelected = Box<dyn Fn(&SourceOptions) + Send + Sync>;

/// Answer to drag-over and drag-enter events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragResponse {
    /// Suppress the default navigation to the dragged file
    PreventDefault,
}

pub struct SourceSelector {
    sdk: Arc<dyn SourceSdk>,
    picker: Arc<dyn FilePicker>,
    dialogs: Arc<dyn Dialogs>,
    reporter: Arc<dyn ExceptionReporter>,
    events: Arc<dyn EventSink>,
    catalog: Option<Arc<dyn ImageCatalog>>,
    recent: RecentUrls,
    after_selected: Option<AfterSelected>,
    state: SelectionState,
    flashing: bool,
    mounted: bool,
}

impl SourceSelector {
    /// Selector with logging dialogs and reporter, no picker, no catalog and
    /// no events
    pub fn new(sdk: Arc<dyn SourceSdk>, store: Arc<dyn KeyValueStore>) -> Self {
        SourceSelector {
            sdk,
            picker: Arc::new(NoFilePicker),
            dialogs: Arc::new(LogDialogs),
            reporter: Arc::new(LogReporter),
            events: Arc::new(NullEvents),
            catalog: None,
            recent: RecentUrls::new(store),
            after_selected: None,
            state: SelectionState::default(),
            flashing: false,
            mounted: false,
        }
    }

    pub fn with_picker(mut self, picker: Arc<dyn FilePicker>) -> Self {
        self.picker = picker;
        self
    }

    pub fn with_dialogs(mut self, dialogs: Arc<dyn Dialogs>) -> Self {
        self.dialogs = dialogs;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ExceptionReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn ImageCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn on_selected<F>(mut self, f: F) -> Self
    where
        F: Fn(&SourceOptions) + Send + Sync + 'static,
    {
        self.after_selected = Some(Box::new(f));
        self
    }

    /// Announce readiness for inbound requests. Only the first call emits.
    pub fn mount(&mut self) {
        if self.mounted {
            return;
        }
        self.mounted = true;
        log_debug!(MODULE, "Source selector ready");
        self.events.emit(OutboundEvent::SourceSelectorReady);
    }

    /// Dispatch one request
    ///
    /// Failures are shown and reported by the handlers themselves.
    pub async fn handle(&mut self, request: SelectorRequest) {
        let result = match request {
            SelectorRequest::SelectImage { image_path } => self
                .on_select_image(&image_path)
                .await
                .map_err(|e| e.to_string()),
            SelectorRequest::OpenFilePicker => {
                self.open_image_selector().await.map_err(|e| e.to_string())
            }
            SelectorRequest::SubmitUrl { url } => {
                self.submit_url(&url).await.map_err(|e| e.to_string())
            }
            SelectorRequest::Drop(payload) => {
                self.on_drop(&payload).await.map_err(|e| e.to_string())
            }
            SelectorRequest::FetchCatalog => self
                .fetch_catalog()
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
            SelectorRequest::SelectCatalogImage { download_url } => self
                .select_catalog_image(&download_url)
                .await
                .map_err(|e| e.to_string()),
            SelectorRequest::Reselect => {
                self.reselect_image();
                Ok(())
            }
            SelectorRequest::AcceptWarning => {
                self.accept_warning();
                Ok(())
            }
            SelectorRequest::CancelWarning => {
                self.cancel_warning();
                Ok(())
            }
            SelectorRequest::SetFlashing { flashing } => {
                self.set_flashing(flashing);
                Ok(())
            }
        };

        if let Err(e) = result {
            log_debug!(MODULE, "Request failed: {}", e);
        }
    }

    /// Inbound `select-image`: kind inferred from the URL prefix
    pub async fn on_select_image(&mut self, image_path: &str) -> Result<(), SelectError> {
        self.select_image_by_path(image_path, SourceKind::infer(image_path))
            .await
    }

    /// Resolve `image_path` and install it as the selection
    ///
    /// On failure the error dialog is shown, the error is reported and the
    /// current selection is kept.
    pub async fn select_image_by_path(
        &mut self,
        image_path: &str,
        kind: SourceKind,
    ) -> Result<(), SelectError> {
        let image_path = match kind {
            SourceKind::File => match replace_windows_network_drive_letter(image_path) {
                Ok(path) => path,
                Err(e) => {
                    log_warn!(MODULE, "Could not resolve network drive: {}", e);
                    self.reporter.report(&e);
                    image_path.to_string()
                }
            },
            SourceKind::Http => image_path.to_string(),
        };

        let options = SourceOptions::new(image_path, kind);
        match resolve_source(self.sdk.as_ref(), &options).await {
            Ok(image) => {
                self.install(image);
                if let Some(after_selected) = &self.after_selected {
                    after_selected(&options);
                }
                Ok(())
            }
            Err(e) => {
                log_warn!(MODULE, "Selection failed: {}", e);
                self.dialogs.show_error(&e.user_error());
                self.reporter.report(&e);
                Err(e)
            }
        }
    }

    /// Ask the file picker for an image; cancelling changes nothing
    pub async fn open_image_selector(&mut self) -> Result<(), SelectError> {
        match self.picker.pick_image().await {
            Ok(Some(path)) if !path.is_empty() => {
                self.select_image_by_path(&path, SourceKind::File).await
            }
            Ok(_) => {
                log_debug!(MODULE, "File picker cancelled");
                Ok(())
            }
            Err(e) => {
                log_warn!(MODULE, "{}", e);
                self.reporter.report(&e);
                Ok(())
            }
        }
    }

    /// URL entered by the user
    ///
    /// The URL is remembered before it is resolved, whatever the outcome.
    pub async fn submit_url(&mut self, url: &str) -> Result<(), SelectError> {
        if url.is_empty() {
            log_debug!(MODULE, "URL entry closed without a URL");
            return Ok(());
        }

        if let Err(e) = self.recent.append(url) {
            log_warn!(MODULE, "Could not remember URL: {}", e);
            self.reporter.report(&e);
        }
        self.select_image_by_path(url, SourceKind::Http).await
    }

    /// Load the image catalog and send it to the view
    pub async fn fetch_catalog(&mut self) -> Result<Vec<ImageInfo>, CatalogError> {
        let result = match &self.catalog {
            Some(catalog) => catalog.fetch_images().await,
            None => Err(CatalogError::NotConfigured),
        };

        match result {
            Ok(images) => {
                log_info!(MODULE, "Catalog lists {} images", images.len());
                self.events.emit(OutboundEvent::Catalog(images.clone()));
                Ok(images)
            }
            Err(e) => {
                log_warn!(MODULE, "Catalog unavailable: {}", e);
                self.dialogs.show_error(&e.user_error());
                self.reporter.report(&e);
                Err(e)
            }
        }
    }

    /// Image picked from the catalog, handled like an entered URL
    ///
    /// An empty URL means the catalog was closed without a choice.
    pub async fn select_catalog_image(&mut self, download_url: &str) -> Result<(), SelectError> {
        if download_url.is_empty() {
            log_debug!(MODULE, "Catalog closed without a choice");
            return Ok(());
        }
        self.submit_url(download_url).await
    }

    /// Recently entered URLs, oldest first
    pub fn recent_urls(&self) -> Vec<String> {
        self.recent.get()
    }

    /// Resolve the first dropped file; the others are ignored
    pub async fn on_drop(&mut self, payload: &DropPayload) -> Result<(), SelectError> {
        let Some(file) = payload.files.first() else {
            log_debug!(MODULE, "Empty drop ignored");
            return Ok(());
        };
        if payload.files.len() > 1 {
            log_debug!(
                MODULE,
                "Ignoring {} extra dropped files",
                payload.files.len() - 1
            );
        }
        self.select_image_by_path(&file.path, SourceKind::File).await
    }

    pub fn on_drag_over(&self) -> DragResponse {
        DragResponse::PreventDefault
    }

    pub fn on_drag_enter(&self) -> DragResponse {
        DragResponse::PreventDefault
    }

    /// Clear the selection so another image can be picked
    pub fn reselect_image(&mut self) {
        if self.flashing {
            log_debug!(MODULE, "Reselect ignored while flashing");
            return;
        }
        if self.state.deselect().is_some() {
            log_info!(MODULE, "Selection cleared");
        }
        self.emit_selection();
    }

    /// Keep the selection despite the warning
    pub fn accept_warning(&mut self) {
        if self.state.dismiss_warning().is_some() {
            self.emit_selection();
        }
    }

    /// Drop the selection that raised the warning
    pub fn cancel_warning(&mut self) {
        if self.state.warning().is_none() {
            return;
        }
        self.state.deselect();
        log_info!(MODULE, "Selection cancelled after warning");
        self.emit_selection();
    }

    pub fn set_flashing(&mut self, flashing: bool) {
        self.flashing = flashing;
    }

    pub fn is_flashing(&self) -> bool {
        self.flashing
    }

    pub fn selection(&self) -> Option<&SelectedImage> {
        self.state.image()
    }

    pub fn warning(&self) -> Option<&Warning> {
        self.state.warning()
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        self.state.snapshot()
    }

    fn install(&mut self, image: SelectedImage) {
        log_info!(
            MODULE,
            "Selected {} ({} bytes)",
            image.display_name(),
            image.size
        );
        if let Some(warning) = self.state.select(image) {
            log_info!(MODULE, "Warning: {}", warning.title);
            self.events.emit(OutboundEvent::Warning(warning.clone()));
        }
        self.emit_selection();
    }

    fn emit_selection(&self) {
        self.events
            .emit(OutboundEvent::SelectionChanged(self.state.snapshot()));
    }
}
