//! User-facing message texts

pub mod warning {
    pub fn looks_like_windows_image() -> String {
        [
            "It looks like you are trying to burn a Windows image.",
            "",
            "Unlike other images, Windows images require special processing to be made bootable. \
             We suggest you use a tool specially designed for this purpose, such as \
             <a href=\"https://rufus.akeo.ie\">Rufus</a> (Windows), \
             <a href=\"https://github.com/slacka/WoeUSB\">WoeUSB</a> (Linux), \
             or Boot Camp Assistant (macOS).",
        ]
        .join("\n")
    }

    pub fn missing_partition_table() -> String {
        [
            "It looks like this is not a bootable image.",
            "",
            "The image does not appear to contain a partition table, \
             and might not be recognized or bootable by your device.",
        ]
        .join("\n")
    }
}

pub mod error {
    pub fn unsupported_protocol() -> String {
        "Only http:// and https:// URLs are supported.".to_string()
    }

    pub fn open_image(image_basename: &str, error_message: &str) -> String {
        format!(
            "Something went wrong while opening {}\n\nError: {}",
            image_basename, error_message
        )
    }
}
