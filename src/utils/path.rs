//! Path utility functions
//!
//! Helpers shared by local paths and URLs. Both separators are accepted so
//! Windows paths pushed by an external process are handled on any host.

/// Strip compression extension from filename (.xz, .gz, .bz2, .zst)
///
/// # Arguments
/// * `filename` - The filename to strip the extension from
///
/// # Returns
/// The filename without the compression extension, or the original if no match
pub fn strip_compression_ext(filename: &str) -> &str {
    for ext in &[".xz", ".gz", ".bz2", ".zst"] {
        if let Some(stripped) = filename.strip_suffix(ext) {
            return stripped;
        }
    }
    filename
}

/// Last component of a path or URL
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Final extension of a path or URL, without the dot
///
/// Returns an empty string when the basename has no extension or is a
/// dotfile (".bashrc").
pub fn extension(path: &str) -> &str {
    let name = basename(path);
    match name.rfind('.') {
        Some(0) | None => "",
        Some(idx) => &name[idx + 1..],
    }
}
