//! Image Source Selector - headless driver
//!
//! Reads one request per line on stdin and writes one event per line on
//! stdout, both as JSON. A line that is not JSON is taken as an image path
//! or URL to select. Logs go to stderr and the session log file.

use std::sync::Arc;

use image_source_selector::config::Settings;
use image_source_selector::ipc::{self, ChannelEvents};
use image_source_selector::{
    log_info, log_warn, logging, HttpCatalog, JsonFileStore, LocalSdk, SelectorRequest,
    SourceSelector,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

const MODULE: &str = "main";

/// Requests buffered between stdin and the selector
const REQUEST_QUEUE: usize = 32;

/// Parse a stdin line into a request
fn parse_request(line: &str) -> Option<SelectorRequest> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line.starts_with('{') {
        match serde_json::from_str(line) {
            Ok(request) => return Some(request),
            Err(e) => {
                log_warn!(MODULE, "Invalid request: {}", e);
                return None;
            }
        }
    }
    Some(SelectorRequest::SelectImage {
        image_path: line.to_string(),
    })
}

#[tokio::main]
async fn main() {
    logging::init();

    log_info!(MODULE, "=== Image Source Selector Starting ===");
    log_info!(MODULE, "Version: {}", env!("CARGO_PKG_VERSION"));
    log_info!(
        MODULE,
        "OS: {} {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );

    if let Some(path) = logging::current_log_path() {
        log_info!(MODULE, "Log file: {}", path.display());
    }

    let store = Arc::new(JsonFileStore::open_default());
    log_info!(MODULE, "Store: {}", store.path().display());

    let settings = Settings::load(store.as_ref());
    if settings.developer_mode {
        log_info!(MODULE, "Developer mode enabled, setting log level to DEBUG");
        logging::set_log_level(true);
    }

    let (events, mut outbound) = ChannelEvents::new();
    let mut selector = SourceSelector::new(Arc::new(LocalSdk), store)
        .with_events(events)
        .on_selected(|options| {
            log_info!(
                MODULE,
                "Image ready for flashing: {} ({:?})",
                options.image_path,
                options.kind
            );
        });
    match settings.catalog_url {
        Some(url) => selector = selector.with_catalog(Arc::new(HttpCatalog::new(url))),
        None => log_info!(MODULE, "No image catalog configured"),
    }

    let (tx, rx) = mpsc::channel(REQUEST_QUEUE);
    let handler = tokio::spawn(ipc::run(selector, rx));

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(event) = outbound.recv().await {
            let line = match serde_json::to_string(&event) {
                Ok(line) => line,
                Err(e) => {
                    log_warn!(MODULE, "Failed to encode event: {}", e);
                    continue;
                }
            };
            if stdout.write_all(format!("{}\n", line).as_bytes()).await.is_err()
                || stdout.flush().await.is_err()
            {
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(request) = parse_request(&line) {
                    if tx.send(request).await.is_err() {
                        break;
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                log_warn!(MODULE, "Failed to read stdin: {}", e);
                break;
            }
        }
    }

    drop(tx);
    match handler.await {
        Ok(selector) => {
            // Dropping the selector closes the event channel and ends the writer
            drop(selector);
            let _ = writer.await;
        }
        Err(e) => log_warn!(MODULE, "Selector task failed: {}", e),
    }

    log_info!(MODULE, "=== Image Source Selector Stopped ===");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        assert_eq!(parse_request("  "), None);
        assert_eq!(
            parse_request("/tmp/os.img\n"),
            Some(SelectorRequest::SelectImage {
                image_path: "/tmp/os.img".to_string()
            })
        );
        assert_eq!(
            parse_request(r#"{"type":"submit-url","url":"https://h/os.img"}"#),
            Some(SelectorRequest::SubmitUrl {
                url: "https://h/os.img".to_string()
            })
        );
        assert_eq!(
            parse_request(r#"{"type":"fetch-catalog"}"#),
            Some(SelectorRequest::FetchCatalog)
        );
        assert_eq!(parse_request("{not json"), None);
    }
}
