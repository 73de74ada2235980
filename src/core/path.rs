use percent_encoding::percent_decode_str;

// ---------------------------------------------------------------------------
// Key codec & validation
// ---------------------------------------------------------------------------
//
// Object keys are slash-delimited hierarchical identifiers with no real
// directory semantics. Everything here is a pure function; the validity
// check below is the sole traversal defense in front of the store.

/// Decode raw (still percent-encoded) route segments into a storage key.
///
/// Each segment is decoded individually, so a `%2F` inside a segment becomes
/// a literal slash character rather than an extra separator. A segment that
/// does not decode to valid UTF-8 is kept raw. Returns `None` when there are
/// no segments to decode.
pub fn decode_segments<I, S>(segments: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let decoded: Vec<String> = segments
        .into_iter()
        .map(|seg| {
            let raw = seg.as_ref();
            percent_decode_str(raw)
                .decode_utf8()
                .map(|c| c.into_owned())
                .unwrap_or_else(|_| raw.to_string())
        })
        .collect();

    if decoded.is_empty() {
        return None;
    }
    Some(decoded.join("/"))
}

/// Decode the remainder of a request path (everything after the route
/// prefix) into a key. Empty remainders yield `None`.
pub fn decode_path(rest: &str) -> Option<String> {
    if rest.is_empty() {
        return None;
    }
    decode_segments(rest.split('/')).filter(|key| !key.is_empty())
}

/// A key is valid iff it is non-empty, does not start with `/`, and contains
/// no `..` anywhere. Rejects `a/../b`, `../etc`, and a bare `..`.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.starts_with('/') && !key.contains("..")
}

/// Normalize a body-supplied key: trim surrounding whitespace and strip one
/// leading slash. Validation happens separately via [`is_valid_key`].
pub fn normalize_key(key: &str) -> String {
    let trimmed = key.trim();
    trimmed.strip_prefix('/').unwrap_or(trimmed).to_string()
}

/// Final path component of a key.
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Containing folder of a key, empty for top-level keys.
pub fn parent_folder(key: &str) -> &str {
    match key.rfind('/') {
        Some(i) => &key[..i],
        None => "",
    }
}

/// Lowercased extension of a key's file name, empty when there is none.
pub fn extension(key: &str) -> String {
    let name = file_name(key);
    match name.rfind('.') {
        Some(i) => name[i + 1..].to_ascii_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_joins_segments() {
        assert_eq!(
            decode_segments(["images", "cat.png"]),
            Some("images/cat.png".to_string())
        );
    }

    #[test]
    fn test_decode_percent_escapes_per_segment() {
        assert_eq!(
            decode_segments(["a%20b", "c%2Fd"]),
            Some("a b/c/d".to_string())
        );
    }

    #[test]
    fn test_decode_invalid_utf8_falls_back_to_raw() {
        // %FF is not valid UTF-8; the raw segment survives untouched.
        assert_eq!(decode_segments(["%FF", "x"]), Some("%FF/x".to_string()));
    }

    #[test]
    fn test_decode_empty_list_is_none() {
        assert_eq!(decode_segments(Vec::<&str>::new()), None);
        assert_eq!(decode_path(""), None);
    }

    #[test]
    fn test_traversal_segments_rejected() {
        for path in ["a/../b", "../etc", "..", "a/..", "../../etc/passwd"] {
            let key = decode_path(path).unwrap();
            assert!(!is_valid_key(&key), "expected {key:?} to be rejected");
        }
    }

    #[test]
    fn test_encoded_traversal_rejected() {
        // %2E%2E decodes to `..` and must still be caught.
        let key = decode_path("a/%2E%2E/b").unwrap();
        assert!(!is_valid_key(&key));
    }

    #[test]
    fn test_leading_slash_and_empty_rejected() {
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("/etc/passwd"));
        assert!(is_valid_key("etc/passwd"));
    }

    #[test]
    fn test_normalize_strips_slash_and_whitespace() {
        assert_eq!(normalize_key("  /images/cat.png "), "images/cat.png");
        assert_eq!(normalize_key("plain.txt"), "plain.txt");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for key in ["  /a/b.png ", "a/b", "/x", " nested/dir/file.tar.gz"] {
            let once = normalize_key(key);
            assert_eq!(normalize_key(&once), once);
        }
    }

    #[test]
    fn test_name_folder_extension_helpers() {
        assert_eq!(file_name("a/b/c.txt"), "c.txt");
        assert_eq!(file_name("c.txt"), "c.txt");
        assert_eq!(parent_folder("a/b/c.txt"), "a/b");
        assert_eq!(parent_folder("c.txt"), "");
        assert_eq!(extension("a/b/ARCHIVE.TAR.GZ"), "gz");
        assert_eq!(extension("a/noext"), "");
        assert_eq!(extension("a.dir/noext"), "");
    }
}
