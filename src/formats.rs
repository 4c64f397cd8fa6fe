//! Supported image formats and filename heuristics

use crate::utils::basename;

/// Extensions offered by the native file picker
pub const PICKER_EXTENSIONS: &[&str] = &[
    "img", "iso", "raw", "bin", "dsk", "hddimg", "sdcard", "wic", "dmg", "xz", "gz", "bz2", "zst",
];

/// Basename fragments that suggest a Windows installer image
const WINDOWS_IMAGE_PATTERNS: &[&str] = &["windows", "win7", "win8", "win10", "winxp"];

/// Check whether the basename of `image_path` looks like a Windows image
pub fn looks_like_windows_image(image_path: &str) -> bool {
    let name = basename(image_path).to_lowercase();
    WINDOWS_IMAGE_PATTERNS
        .iter()
        .any(|pattern| name.contains(pattern))
}

/// Check whether `path` is an HTTP(S) URL
pub fn is_http_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}
