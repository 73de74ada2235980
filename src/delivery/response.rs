use axum::http::{header, HeaderName, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use serde::Serialize;

use crate::core::auth::REALM;
use crate::core::mime::{cache_control, resolve_content_type, CACHE_TTL_CORS_PREFLIGHT};
use crate::storage::{ObjectBody, ObjectMeta};

// ---------------------------------------------------------------------------
// JSON envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    status: u16,
}

/// Build a JSON error response with a stable machine-readable code.
pub fn error_json(status: StatusCode, error: &str, message: &str) -> Response {
    let body = ErrorResponse {
        error: error.to_string(),
        message: message.to_string(),
        status: status.as_u16(),
    };
    (status, Json(body)).into_response()
}

/// 401 with the Basic challenge header.
pub fn unauthorized() -> Response {
    let mut response = error_json(
        StatusCode::UNAUTHORIZED,
        "unauthorized",
        "Authentication required",
    );
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        format!("Basic realm=\"{}\", charset=\"UTF-8\"", REALM)
            .parse()
            .expect("static challenge header"),
    );
    response
}

// ---------------------------------------------------------------------------
// CORS headers
// ---------------------------------------------------------------------------

/// Headers attached to every file response. Public objects are meant to be
/// embeddable from anywhere.
fn cors_headers() -> [(HeaderName, String); 4] {
    [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
        (
            header::ACCESS_CONTROL_ALLOW_METHODS,
            "GET, HEAD, OPTIONS".to_string(),
        ),
        (
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            "Content-Type, If-None-Match".to_string(),
        ),
        (header::ACCESS_CONTROL_EXPOSE_HEADERS, "ETag".to_string()),
    ]
}

/// 204 preflight response with the CORS header set and a max-age.
pub fn cors_preflight() -> Response {
    let cors = cors_headers();
    (
        StatusCode::NO_CONTENT,
        [
            cors[0].clone(),
            cors[1].clone(),
            cors[2].clone(),
            cors[3].clone(),
            (
                header::ACCESS_CONTROL_MAX_AGE,
                CACHE_TTL_CORS_PREFLIGHT.to_string(),
            ),
        ],
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// File responses
// ---------------------------------------------------------------------------

/// 200 with file bytes. The content type is re-resolved against the key so
/// generic stored types get replaced by the extension-derived MIME; the
/// cache policy derives from the resolved type unless the caller forces one.
pub fn file_response(key: &str, object: ObjectBody, cache_override: Option<String>) -> Response {
    let content_type = resolve_content_type(Some(&object.content_type), key);
    let cache = cache_override.unwrap_or_else(|| cache_control(&content_type));
    let cors = cors_headers();

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, object.content_length.to_string()),
            (header::CACHE_CONTROL, cache),
            (header::ETAG, object.etag),
            cors[0].clone(),
            cors[1].clone(),
            cors[2].clone(),
            cors[3].clone(),
        ],
        object.body,
    )
        .into_response()
}

/// 304 Not Modified: ETag and CORS headers, no body.
pub fn not_modified(etag: &str) -> Response {
    let cors = cors_headers();
    (
        StatusCode::NOT_MODIFIED,
        [
            (header::ETAG, etag.to_string()),
            cors[0].clone(),
            cors[1].clone(),
            cors[2].clone(),
            cors[3].clone(),
        ],
        Bytes::new(),
    )
        .into_response()
}

/// 200 for HEAD: the full header set of [`file_response`] without a body.
pub fn head_response(key: &str, meta: &ObjectMeta, cache_override: Option<String>) -> Response {
    let content_type = resolve_content_type(Some(&meta.content_type), key);
    let cache = cache_override.unwrap_or_else(|| cache_control(&content_type));
    let cors = cors_headers();

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, meta.content_length.to_string()),
            (header::CACHE_CONTROL, cache),
            (header::ETAG, meta.etag.clone()),
            cors[0].clone(),
            cors[1].clone(),
            cors[2].clone(),
            cors[3].clone(),
        ],
        Bytes::new(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_response_headers() {
        let object = ObjectBody {
            body: Bytes::from_static(b"png-bytes"),
            content_type: "application/octet-stream".to_string(),
            content_length: 9,
            etag: "\"abc\"".to_string(),
        };
        let response = file_response("images/cat.png", object, None);
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        // Generic stored type replaced by the extension-derived MIME, and
        // the cache tier follows the resolved type.
        assert_eq!(headers[header::CONTENT_TYPE.as_str()], "image/png");
        assert_eq!(
            headers[header::CACHE_CONTROL.as_str()],
            "public, max-age=31536000, immutable"
        );
        assert_eq!(headers[header::ETAG.as_str()], "\"abc\"");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN.as_str()], "*");
    }

    #[test]
    fn test_cache_override_wins() {
        let object = ObjectBody {
            body: Bytes::from_static(b"data"),
            content_type: "application/zip".to_string(),
            content_length: 4,
            etag: "\"z\"".to_string(),
        };
        let response = file_response("a.zip", object, Some("no-store".to_string()));
        assert_eq!(response.headers()[header::CACHE_CONTROL.as_str()], "no-store");
    }

    #[test]
    fn test_preflight_is_204_with_max_age() {
        let response = cors_preflight();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_MAX_AGE.as_str()],
            "86400"
        );
    }

    #[test]
    fn test_unauthorized_carries_challenge() {
        let response = unauthorized();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response.headers()[header::WWW_AUTHENTICATE.as_str()]
            .to_str()
            .unwrap()
            .to_string();
        assert!(challenge.starts_with("Basic realm="));
    }
}
