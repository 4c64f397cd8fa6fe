//! Application directory helpers

use std::path::PathBuf;

/// Per-application cache directory (logs)
///
/// Falls back to the system temp directory when the platform has no
/// cache directory.
pub fn get_cache_dir(app_name: &str) -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(app_name)
}

/// Per-application config directory (persisted store)
pub fn get_config_dir(app_name: &str) -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(app_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_end_with_app_name() {
        assert!(get_cache_dir("selector-test").ends_with("selector-test"));
        assert!(get_config_dir("selector-test").ends_with("selector-test"));
    }
}
