use std::path::Path;

/// Final path component as UTF-8, if it has one.
pub fn file_name_of(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

/// Name to save a download under: the last segment of the reference,
/// without query or fragment.
pub fn download_filename(download_ref: &str) -> Option<&str> {
    let path = download_ref
        .split(['?', '#'])
        .next()
        .unwrap_or(download_ref);

    path.rsplit('/').next().filter(|name| !name.is_empty())
}

/// Human readable byte count, e.g. `512.0 KiB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
