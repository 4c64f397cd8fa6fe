//! Windows mapped network drives
//!
//! Paths picked from a mapped drive (`Z:\images\os.img`) are rewritten to
//! their UNC form (`\\server\share\images\os.img`) so the image stays
//! reachable from elevated helper processes, which do not see the user's
//! drive mappings. On other platforms paths are returned unchanged.

#[cfg(target_os = "windows")]
use crate::log_debug;

#[cfg(target_os = "windows")]
const MODULE: &str = "network_drive";

/// Split `Z:\rest` into the drive letter and the remainder (`\rest`)
pub fn split_drive_letter(path: &str) -> Option<(char, &str)> {
    let mut chars = path.chars();
    let letter = chars.next().filter(char::is_ascii_alphabetic)?;
    if chars.next() != Some(':') {
        return None;
    }
    let rest = &path[2..];
    if rest.is_empty() || rest.starts_with(['\\', '/']) {
        Some((letter.to_ascii_uppercase(), rest))
    } else {
        None
    }
}

/// Join a UNC remote name with the remainder of a drive path
pub fn join_remote(remote: &str, rest: &str) -> String {
    let remote = remote.trim_end_matches(['\\', '/']);
    if rest.is_empty() {
        remote.to_string()
    } else {
        format!("{}{}", remote, rest.replace('/', "\\"))
    }
}

/// Replace a mapped network drive letter with its UNC remote name
///
/// Paths on local drives, URLs and paths without a drive letter are returned
/// unchanged.
pub fn replace_windows_network_drive_letter(path: &str) -> std::io::Result<String> {
    let Some((letter, rest)) = split_drive_letter(path) else {
        return Ok(path.to_string());
    };

    match remote_name(letter)? {
        Some(remote) => {
            let resolved = join_remote(&remote, rest);
            #[cfg(target_os = "windows")]
            log_debug!(MODULE, "Resolved {} to {}", path, resolved);
            Ok(resolved)
        }
        None => Ok(path.to_string()),
    }
}

#[cfg(target_os = "windows")]
fn remote_name(letter: char) -> std::io::Result<Option<String>> {
    use windows_sys::Win32::Foundation::{ERROR_NOT_CONNECTED, NO_ERROR};
    use windows_sys::Win32::NetworkManagement::WNet::WNetGetConnectionW;

    let local: Vec<u16> = format!("{}:", letter)
        .encode_utf16()
        .chain(std::iter::once(0))
        .collect();
    let mut buffer = vec![0u16; 1024];
    let mut length = buffer.len() as u32;

    // SAFETY: `local` is NUL-terminated and `buffer` holds `length` UTF-16 units
    let status = unsafe { WNetGetConnectionW(local.as_ptr(), buffer.as_mut_ptr(), &mut length) };

    match status {
        NO_ERROR => {
            let end = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
            Ok(Some(String::from_utf16_lossy(&buffer[..end])))
        }
        // Local drive or not a redirected device
        ERROR_NOT_CONNECTED => Ok(None),
        code => Err(std::io::Error::from_raw_os_error(code as i32)),
    }
}

#[cfg(not(target_os = "windows"))]
fn remote_name(_letter: char) -> std::io::Result<Option<String>> {
    Ok(None)
}
