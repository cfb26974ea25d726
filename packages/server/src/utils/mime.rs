/// Pick the content type for an upload: the declared multipart type unless it
/// is absent or generic, otherwise a guess from the filename.
pub fn resolve_content_type(declared: Option<&str>, filename: &str) -> String {
    let declared = declared
        .map(|d| d.split(';').next().unwrap_or(d).trim().to_ascii_lowercase())
        .filter(|d| !d.is_empty() && d != "application/octet-stream");
    match declared {
        Some(d) => d,
        None => mime_guess::from_path(filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

/// Detect a raster image type from its leading bytes.
pub fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("image/png"),
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

/// Returns false when a raster image type is declared but the bytes are
/// something else. Non-raster types are not sniffed.
pub fn content_matches(content_type: &str, bytes: &[u8]) -> bool {
    match content_type {
        "image/jpeg" | "image/png" | "image/gif" | "image/webp" => {
            sniff_image_type(bytes) == Some(content_type)
        }
        "application/pdf" => bytes.starts_with(b"%PDF-"),
        _ => true,
    }
}

/// Types a browser may execute script from when rendered in place.
pub fn is_scriptable(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();
    matches!(
        essence.as_str(),
        "image/svg+xml"
            | "text/html"
            | "application/xhtml+xml"
            | "text/xml"
            | "application/xml"
            | "text/javascript"
            | "application/javascript"
    )
}

/// File extension used in generated storage keys.
pub fn extension_for(content_type: &str, filename: &str) -> String {
    let canonical = match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "application/pdf" => Some("pdf"),
        _ => None,
    };
    canonical
        .map(str::to_string)
        .or_else(|| super::filename::extension_of(filename))
        .unwrap_or_else(|| "bin".to_string())
}
