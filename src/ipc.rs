//! Request channel
//!
//! Every user action and inbound `select-image` message is a
//! `SelectorRequest` on a single channel. One handler loop consumes it, so
//! resolutions never overlap.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::catalog::ImageInfo;
use crate::config;
use crate::host::EventSink;
use crate::log_debug;
use crate::selection::{SelectionSnapshot, Warning};
use crate::selector::SourceSelector;

const MODULE: &str = "ipc";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SelectorRequest {
    /// Inbound `select-image`; kind inferred from the path
    SelectImage {
        #[serde(rename = "imagePath")]
        image_path: String,
    },
    OpenFilePicker,
    SubmitUrl {
        url: String,
    },
    Drop(DropPayload),
    /// Load the image catalog; answered with a `catalog` event
    FetchCatalog,
    /// Catalog entry picked; an empty URL closes the catalog
    SelectCatalogImage {
        #[serde(rename = "downloadUrl")]
        download_url: String,
    },
    Reselect,
    AcceptWarning,
    CancelWarning,
    /// A flash started or finished elsewhere in the app
    SetFlashing {
        flashing: bool,
    },
}

/// Files carried by a drop event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropPayload {
    pub files: Vec<DroppedFile>,
}

impl DropPayload {
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DropPayload {
            files: paths
                .into_iter()
                .map(|path| DroppedFile { path: path.into() })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedFile {
    pub path: String,
}

/// Events sent towards the view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum OutboundEvent {
    SourceSelectorReady,
    SelectionChanged(SelectionSnapshot),
    Warning(Warning),
    Catalog(Vec<ImageInfo>),
}

impl OutboundEvent {
    /// Event name on the wire
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::SourceSelectorReady => config::events::SOURCE_SELECTOR_READY,
            OutboundEvent::SelectionChanged(_) => config::events::SELECTION_CHANGED,
            OutboundEvent::Warning(_) => config::events::WARNING,
            OutboundEvent::Catalog(_) => config::events::CATALOG,
        }
    }
}

/// Event sink forwarding to an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelEvents {
    tx: mpsc::UnboundedSender<OutboundEvent>,
}

impl ChannelEvents {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ChannelEvents { tx }), rx)
    }
}

impl EventSink for ChannelEvents {
    fn emit(&self, event: OutboundEvent) {
        if self.tx.send(event).is_err() {
            log_debug!(MODULE, "Event receiver dropped");
        }
    }
}

/// Mount the selector and handle requests until every sender is dropped
///
/// Returns the selector so the caller can inspect the final state.
pub async fn run(
    mut selector: SourceSelector,
    mut requests: mpsc::Receiver<SelectorRequest>,
) -> SourceSelector {
    selector.mount();
    while let Some(request) = requests.recv().await {
        log_debug!(MODULE, "Handling {:?}", request);
        selector.handle(request).await;
    }
    log_debug!(MODULE, "Request channel closed");
    selector
}
