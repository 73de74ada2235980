use super::path::extension;

// ---------------------------------------------------------------------------
// Content-type resolution & cache policy
// ---------------------------------------------------------------------------

/// Fallback MIME type when nothing better is known.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

// Cache-control TTLs in seconds, by policy tier.
pub const CACHE_TTL_IMMUTABLE: u64 = 31_536_000;
pub const CACHE_TTL_MEDIA: u64 = 604_800;
pub const CACHE_TTL_DOCUMENT: u64 = 86_400;
pub const CACHE_TTL_DEFAULT: u64 = 3_600;
pub const CACHE_TTL_CORS_PREFLIGHT: u64 = 86_400;

/// Map a file extension (lowercased, without the dot) to a MIME type.
fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext {
        // images
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        "tiff" => "image/tiff",
        // video
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        // audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        // documents
        "pdf" => "application/pdf",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" => "text/html",
        // static assets / code
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "ts" | "tsx" => "text/typescript",
        // fonts
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        // archives
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "rar" => "application/vnd.rar",
        "7z" => "application/x-7z-compressed",
        // config formats
        "yaml" | "yml" => "application/x-yaml",
        "toml" => "application/toml",
        _ => return None,
    };
    Some(mime)
}

/// Derive a content type from a key's extension.
pub fn content_type_for_key(key: &str) -> &'static str {
    mime_for_extension(&extension(key)).unwrap_or(DEFAULT_MIME_TYPE)
}

/// Resolve the content type to serve: trust the store's recorded type unless
/// it is absent or the generic fallback, in which case derive from the key.
pub fn resolve_content_type(stored: Option<&str>, key: &str) -> String {
    match stored {
        Some(t) if !t.is_empty() && t != DEFAULT_MIME_TYPE => t.to_string(),
        _ => content_type_for_key(key).to_string(),
    }
}

/// Cache-control policy for a MIME type, evaluated tier by tier:
/// immutable assets, then media, then documents, then everything else.
pub fn cache_control(content_type: &str) -> String {
    if content_type.starts_with("image/")
        || content_type.starts_with("font/")
        || content_type == "application/javascript"
        || content_type == "text/css"
    {
        return format!("public, max-age={CACHE_TTL_IMMUTABLE}, immutable");
    }

    if content_type.starts_with("video/") || content_type.starts_with("audio/") {
        return format!("public, max-age={CACHE_TTL_MEDIA}");
    }

    if content_type == "application/pdf"
        || content_type == "application/json"
        || content_type == "text/plain"
        || content_type == "text/markdown"
    {
        return format!("public, max-age={CACHE_TTL_DOCUMENT}");
    }

    format!("public, max-age={CACHE_TTL_DEFAULT}")
}

/// The cache policy forced onto short-link direct serves: link targets are
/// treated as permanent regardless of their type.
pub fn immutable_cache_control() -> String {
    format!("public, max-age={CACHE_TTL_IMMUTABLE}, immutable")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_lookup() {
        assert_eq!(content_type_for_key("photos/cat.JPG"), "image/jpeg");
        assert_eq!(content_type_for_key("a/b/song.flac"), "audio/flac");
        assert_eq!(content_type_for_key("archive.7z"), "application/x-7z-compressed");
        assert_eq!(content_type_for_key("unknown.xyz"), DEFAULT_MIME_TYPE);
        assert_eq!(content_type_for_key("no_extension"), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_stored_type_trusted_unless_generic() {
        assert_eq!(
            resolve_content_type(Some("image/webp"), "f.bin"),
            "image/webp"
        );
        assert_eq!(
            resolve_content_type(Some(DEFAULT_MIME_TYPE), "f.png"),
            "image/png"
        );
        assert_eq!(resolve_content_type(None, "f.css"), "text/css");
        assert_eq!(resolve_content_type(Some(""), "f.css"), "text/css");
    }

    #[test]
    fn test_cache_tiers() {
        assert_eq!(
            cache_control("image/png"),
            "public, max-age=31536000, immutable"
        );
        assert_eq!(
            cache_control("font/woff2"),
            "public, max-age=31536000, immutable"
        );
        assert_eq!(
            cache_control("application/javascript"),
            "public, max-age=31536000, immutable"
        );
        assert_eq!(cache_control("video/mp4"), "public, max-age=604800");
        assert_eq!(cache_control("audio/mpeg"), "public, max-age=604800");
        assert_eq!(cache_control("application/pdf"), "public, max-age=86400");
        assert_eq!(cache_control("text/markdown"), "public, max-age=86400");
        assert_eq!(cache_control("application/zip"), "public, max-age=3600");
    }

    #[test]
    fn test_tier_precedence_immutable_wins() {
        // text/css is both "text" and a static asset; the immutable tier
        // is evaluated first.
        assert!(cache_control("text/css").contains("immutable"));
    }
}
