//! Tauri integration
//!
//! Adapters that back the selector collaborators with the store and dialog
//! plugins and the Tauri event system, plus the commands the webview uses
//! to drive the selector.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tauri::{AppHandle, Emitter, Listener, Manager, Runtime, State};
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};
use tauri_plugin_store::StoreExt;
use tokio::sync::mpsc;

use crate::catalog::HttpCatalog;
use crate::config::{self, Settings};
use crate::error::{HostError, StoreError, UserError};
use crate::formats::PICKER_EXTENSIONS;
use crate::host::{Dialogs, EventSink, FilePicker, LogReporter};
use crate::ipc::{self, OutboundEvent, SelectorRequest};
use crate::recent::RecentUrls;
use crate::selector::SourceSelector;
use crate::source::LocalSdk;
use crate::store::KeyValueStore;
use crate::{log_debug, log_error, log_info, log_warn};

const MODULE: &str = "desktop";

/// Capacity of the request channel between the webview and the selector
const REQUEST_QUEUE: usize = 32;

/// Key-value store backed by `tauri-plugin-store`
pub struct TauriStore<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> TauriStore<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self { app }
    }
}

impl<R: Runtime> KeyValueStore for TauriStore<R> {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let store = self
            .app
            .store(config::store::FILE_NAME)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(store.get(key).map(stored_text))
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let store = self
            .app
            .store(config::store::FILE_NAME)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        store.set(key, stored_value(value));
        store
            .save()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

/// Text handed to the selector for a store value. Strings are unwrapped,
/// anything else is kept as its JSON text.
fn stored_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn stored_value(text: &str) -> Value {
    Value::String(text.to_string())
}

/// Native file picker from `tauri-plugin-dialog`
pub struct TauriFilePicker<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> TauriFilePicker<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self { app }
    }
}

#[async_trait]
impl<R: Runtime> FilePicker for TauriFilePicker<R> {
    async fn pick_image(&self) -> Result<Option<String>, HostError> {
        let app = self.app.clone();
        log_info!(MODULE, "Opening file picker dialog");

        let picked = tokio::task::spawn_blocking(move || {
            app.dialog()
                .file()
                .add_filter("Disk Images", PICKER_EXTENSIONS)
                .add_filter("All Files", &["*"])
                .set_title("Select Disk Image")
                .blocking_pick_file()
        })
        .await
        .map_err(|e| HostError::Picker(format!("Task failed: {}", e)))?;

        match picked {
            Some(file_path) => {
                let path = file_path.as_path().ok_or_else(|| {
                    log_error!(MODULE, "Invalid path: not a valid file path");
                    HostError::Picker("Invalid path: not a valid file path".to_string())
                })?;
                Ok(Some(path.to_string_lossy().into_owned()))
            }
            None => Ok(None),
        }
    }
}

/// Error dialogs from `tauri-plugin-dialog`
pub struct TauriDialogs<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> TauriDialogs<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self { app }
    }
}

impl<R: Runtime> Dialogs for TauriDialogs<R> {
    fn show_error(&self, error: &UserError) {
        self.app
            .dialog()
            .message(error.description.clone())
            .title(error.title.clone())
            .kind(MessageDialogKind::Error)
            .show(|_| {});
    }
}

/// Outbound events emitted to every webview
pub struct TauriEvents<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> TauriEvents<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self { app }
    }
}

impl<R: Runtime> EventSink for TauriEvents<R> {
    fn emit(&self, event: OutboundEvent) {
        let name = event.name();
        let result = match event {
            OutboundEvent::SourceSelectorReady => self.app.emit(name, ()),
            OutboundEvent::SelectionChanged(snapshot) => self.app.emit(name, snapshot),
            OutboundEvent::Warning(warning) => self.app.emit(name, warning),
            OutboundEvent::Catalog(images) => self.app.emit(name, images),
        };
        if let Err(e) = result {
            log_warn!(MODULE, "Failed to emit {}: {}", name, e);
        }
    }
}

/// Payload of the inbound `select-image` event
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectImagePayload {
    image_path: String,
}

/// Sender side of the selector request channel, managed as app state
pub struct SelectorChannel(mpsc::Sender<SelectorRequest>);

/// Build the selector, start its handler loop and forward `select-image`
/// events to it. Call once from the app `setup` hook.
pub fn init<R: Runtime>(app: &AppHandle<R>) {
    let store = Arc::new(TauriStore::new(app.clone()));
    let settings = Settings::load(store.as_ref());

    let mut selector = SourceSelector::new(Arc::new(LocalSdk), store)
        .with_picker(Arc::new(TauriFilePicker::new(app.clone())))
        .with_dialogs(Arc::new(TauriDialogs::new(app.clone())))
        .with_reporter(Arc::new(LogReporter))
        .with_events(Arc::new(TauriEvents::new(app.clone())));
    if let Some(url) = settings.catalog_url {
        selector = selector.with_catalog(Arc::new(HttpCatalog::new(url)));
    }

    let (tx, rx) = mpsc::channel(REQUEST_QUEUE);
    tauri::async_runtime::spawn(ipc::run(selector, rx));

    let inbound = tx.clone();
    app.listen(config::events::SELECT_IMAGE, move |event| {
        match serde_json::from_str::<SelectImagePayload>(event.payload()) {
            Ok(payload) => {
                let request = SelectorRequest::SelectImage {
                    image_path: payload.image_path,
                };
                if let Err(e) = inbound.try_send(request) {
                    log_warn!(MODULE, "Dropped select-image request: {}", e);
                }
            }
            Err(e) => log_warn!(MODULE, "Invalid select-image payload: {}", e),
        }
    });

    app.manage(SelectorChannel(tx));
    log_debug!(MODULE, "Source selector attached");
}

/// Forward a request from the webview to the selector
#[tauri::command]
pub async fn selector_request(
    channel: State<'_, SelectorChannel>,
    request: SelectorRequest,
) -> Result<(), String> {
    channel.0.send(request).await.map_err(|e| {
        log_error!(MODULE, "Selector is not running: {}", e);
        format!("Selector is not running: {}", e)
    })
}

/// Recent URLs used to pre-populate the URL entry dialog
#[tauri::command]
pub fn get_recent_urls<R: Runtime>(app: AppHandle<R>) -> Vec<String> {
    RecentUrls::new(Arc::new(TauriStore::new(app))).get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_image_payload() {
        let payload: SelectImagePayload =
            serde_json::from_str(r#"{"imagePath": "https://h/os.img.xz"}"#).unwrap();
        assert_eq!(payload.image_path, "https://h/os.img.xz");

        assert!(serde_json::from_str::<SelectImagePayload>(r#"{"image_path": "/a.img"}"#).is_err());
    }

    #[test]
    fn test_stored_text() {
        assert_eq!(stored_text(json!("[\"https://a\"]")), "[\"https://a\"]");
        assert_eq!(stored_text(json!(true)), "true");
        assert_eq!(stored_text(json!(["https://a"])), "[\"https://a\"]");
    }

    #[test]
    fn test_stored_value_keeps_text() {
        let text = "[\"https://a\",\"https://b\"]";
        assert_eq!(stored_value(text), Value::String(text.to_string()));
        assert_eq!(stored_text(stored_value(text)), text);
    }
}
