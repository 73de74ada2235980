use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::core::path;
use crate::observability::metrics as obs;

use super::objects::authenticate_admin;
use super::response::{
    cors_preflight, error_json, file_response, head_response, not_modified,
};
use super::router::AppState;

// ---------------------------------------------------------------------------
// Public file serving
// ---------------------------------------------------------------------------
//
// `/public/{...path}` is unauthenticated and CORS-open; `/cdn/{...path}` is
// the same serving path gated behind basic auth for private files. Both
// support conditional GET against the store's ETag. There is no cache in
// front of the store: every request reflects its current state.

/// `GET /public/{...path}`
pub async fn serve_public(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    serve_file(&state, &uri, "/public/", &headers, "public").await
}

/// `HEAD /public/{...path}`
pub async fn head_public(State(state): State<AppState>, uri: Uri) -> Response {
    head_file(&state, &uri, "/public/").await
}

/// `GET /cdn/{...path}` — authenticated variant of the same serving path.
pub async fn serve_cdn(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    if let Err(resp) = authenticate_admin(&state, &headers) {
        return resp;
    }
    serve_file(&state, &uri, "/cdn/", &headers, "cdn").await
}

/// `HEAD /cdn/{...path}`
pub async fn head_cdn(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    if let Err(resp) = authenticate_admin(&state, &headers) {
        return resp;
    }
    head_file(&state, &uri, "/cdn/").await
}

/// `OPTIONS` on the file routes — CORS preflight.
pub async fn options_preflight() -> Response {
    cors_preflight()
}

async fn serve_file(
    state: &AppState,
    uri: &Uri,
    prefix: &str,
    request_headers: &HeaderMap,
    route: &'static str,
) -> Response {
    let start = std::time::Instant::now();

    let key = match decode_and_validate(uri, prefix) {
        Ok(key) => key,
        Err(resp) => {
            obs::inc_delivery_request(route, resp.status().as_u16());
            return resp;
        }
    };

    let response = match state.store.get(&key).await {
        Ok(Some(object)) => {
            let if_none_match = request_headers
                .get(header::IF_NONE_MATCH)
                .and_then(|v| v.to_str().ok());

            if if_none_match.is_some_and(|tag| tag == object.etag) {
                not_modified(&object.etag)
            } else {
                obs::add_delivery_bytes_sent(object.body.len() as u64);
                file_response(&key, object, None)
            }
        }
        Ok(None) => error_json(StatusCode::NOT_FOUND, "not_found", "File not found"),
        Err(e) => {
            obs::inc_storage_error("get");
            error!(key, error = %e, "storage error serving file");
            error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "serve_failed",
                &e.to_string(),
            )
        }
    };

    obs::inc_delivery_request(route, response.status().as_u16());
    obs::record_delivery_request_duration(route, start.elapsed().as_secs_f64());
    response
}

async fn head_file(state: &AppState, uri: &Uri, prefix: &str) -> Response {
    let key = match decode_and_validate(uri, prefix) {
        // HEAD errors carry no body, just the status.
        Ok(key) => key,
        Err(resp) => return resp.status().into_response(),
    };

    match state.store.head(&key).await {
        Ok(meta) => head_response(&key, &meta, None),
        Err(e) if e.is_not_found() => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            obs::inc_storage_error("head");
            error!(key, error = %e, "storage error on HEAD");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn decode_and_validate(uri: &Uri, prefix: &str) -> Result<String, Response> {
    let rest = uri.path().strip_prefix(prefix).unwrap_or("");
    let Some(key) = path::decode_path(rest) else {
        return Err(error_json(
            StatusCode::BAD_REQUEST,
            "missing_path",
            "Path is required",
        ));
    };
    if !path::is_valid_key(&key) {
        return Err(error_json(
            StatusCode::BAD_REQUEST,
            "invalid_path",
            "Invalid path",
        ));
    }
    Ok(key)
}
