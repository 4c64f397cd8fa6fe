//! Host collaborators
//!
//! The selector talks to the surrounding application through these traits:
//! a native file picker, error dialogs, an exception reporter and an event
//! sink. The defaults here log instead of showing anything and are what the
//! headless binary runs with.

use async_trait::async_trait;

use crate::error::{HostError, UserError};
use crate::ipc::OutboundEvent;
use crate::{log_debug, log_error};

const MODULE: &str = "host";

/// Native single-file picker
#[async_trait]
pub trait FilePicker: Send + Sync {
    /// Picked path, or `None` when the user cancelled
    async fn pick_image(&self) -> Result<Option<String>, HostError>;
}

/// User-facing error dialogs
pub trait Dialogs: Send + Sync {
    fn show_error(&self, error: &UserError);
}

/// Diagnostics sink for non-advisory errors. Must never fail.
pub trait ExceptionReporter: Send + Sync {
    fn report(&self, error: &(dyn std::error::Error + 'static));
}

/// Outbound events towards the view
pub trait EventSink: Send + Sync {
    fn emit(&self, event: OutboundEvent);
}

/// Picker for hosts without one; always cancelled
#[derive(Debug, Default, Clone)]
pub struct NoFilePicker;

#[async_trait]
impl FilePicker for NoFilePicker {
    async fn pick_image(&self) -> Result<Option<String>, HostError> {
        log_debug!(MODULE, "No file picker available");
        Ok(None)
    }
}

#[derive(Debug, Default, Clone)]
pub struct LogDialogs;

impl Dialogs for LogDialogs {
    fn show_error(&self, error: &UserError) {
        log_error!(MODULE, "{}: {}", error.title, error.description);
    }
}

#[derive(Debug, Default, Clone)]
pub struct LogReporter;

impl ExceptionReporter for LogReporter {
    fn report(&self, error: &(dyn std::error::Error + 'static)) {
        let mut message = error.to_string();
        let mut cause = error.source();
        while let Some(e) = cause {
            message.push_str(&format!(": {}", e));
            cause = e.source();
        }
        log_error!(MODULE, "Reported: {}", message);
    }
}

#[derive(Debug, Default, Clone)]
pub struct NullEvents;

impl EventSink for NullEvents {
    fn emit(&self, _event: OutboundEvent) {}
}
