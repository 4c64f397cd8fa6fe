//! Logging module
//!
//! Module-tagged log macros writing to stderr and to a per-session log file
//! in the application cache directory. Debug output is only emitted when
//! developer mode raises the level.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::config;
use crate::utils::get_cache_dir;

/// Log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Session log file, opened by `init()`
static LOG_FILE: Lazy<Mutex<Option<(PathBuf, File)>>> = Lazy::new(|| Mutex::new(None));

/// Open the session log file and prune old sessions
///
/// Logging works without calling this; lines then only go to stderr.
pub fn init() {
    let logs_dir = get_cache_dir(config::app::NAME).join("logs");
    if let Err(e) = std::fs::create_dir_all(&logs_dir) {
        eprintln!("Failed to create log directory {}: {}", logs_dir.display(), e);
        return;
    }

    prune_old_logs(&logs_dir);

    let filename = format!(
        "{}-{}.log",
        config::app::NAME,
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    );
    let path = logs_dir.join(filename);

    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            if let Ok(mut guard) = LOG_FILE.lock() {
                *guard = Some((path, file));
            }
        }
        Err(e) => eprintln!("Failed to open log file {}: {}", path.display(), e),
    }
}

/// Keep only the newest log files
fn prune_old_logs(logs_dir: &std::path::Path) {
    let Ok(entries) = std::fs::read_dir(logs_dir) else {
        return;
    };

    let mut logs: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("log"))
        .collect();

    if logs.len() < config::logging::MAX_LOG_FILES {
        return;
    }

    // Timestamped names sort chronologically
    logs.sort();
    let excess = logs.len() + 1 - config::logging::MAX_LOG_FILES;
    for path in logs.into_iter().take(excess) {
        let _ = std::fs::remove_file(path);
    }
}

/// Enable or disable debug output
pub fn set_log_level(debug: bool) {
    DEBUG_ENABLED.store(debug, Ordering::SeqCst);
}

pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::SeqCst)
}

/// Path of the current session log file, if one is open
pub fn current_log_path() -> Option<PathBuf> {
    LOG_FILE
        .lock()
        .ok()
        .and_then(|guard| guard.as_ref().map(|(path, _)| path.clone()))
}

/// Write a log line. Use the `log_*!` macros instead of calling this directly.
pub fn write(level: Level, module: &str, message: &str) {
    if level == Level::Debug && !is_debug_enabled() {
        return;
    }

    let line = format!(
        "[{}] [{}] [{}] {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        level.as_str(),
        module,
        message
    );

    eprintln!("{}", line);

    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some((_, file)) = guard.as_mut() {
            let _ = writeln!(file, "{}", line);
        }
    }
}

#[macro_export]
macro_rules! log_debug {
    ($module:expr, $($arg:tt)*) => {
        $crate::logging::write($crate::logging::Level::Debug, $module, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($module:expr, $($arg:tt)*) => {
        $crate::logging::write($crate::logging::Level::Info, $module, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($module:expr, $($arg:tt)*) => {
        $crate::logging::write($crate::logging::Level::Warn, $module, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($module:expr, $($arg:tt)*) => {
        $crate::logging::write($crate::logging::Level::Error, $module, &format!($($arg)*))
    };
}
