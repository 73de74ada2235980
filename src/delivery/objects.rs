use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::core::auth::CredentialStatus;
use crate::core::path;
use crate::core::security::{clamp_list_keys, MAX_JSON_BODY_BYTES};
use crate::observability::metrics as obs;
use crate::storage::ObjectRecord;

use super::response::{error_json, unauthorized};
use super::router::AppState;

/// Route prefix stripped from the request path to recover the raw
/// (still percent-encoded) key segments.
const OBJECTS_PREFIX: &str = "/api/objects/";

// ---------------------------------------------------------------------------
// Request/response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub prefix: Option<String>,
    #[serde(rename = "maxKeys")]
    pub max_keys: Option<i32>,
}

#[derive(Debug, Serialize)]
struct ListResponse {
    items: Vec<ObjectRecord>,
    #[serde(rename = "isTruncated")]
    is_truncated: bool,
    #[serde(rename = "keyCount")]
    key_count: usize,
}

#[derive(Debug, Serialize)]
struct HeadResponse {
    key: String,
    #[serde(rename = "contentType")]
    content_type: String,
    #[serde(rename = "contentLength")]
    content_length: u64,
    #[serde(rename = "lastModified")]
    last_modified: Option<chrono::DateTime<chrono::Utc>>,
    etag: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    #[serde(rename = "newKey")]
    new_key: Option<String>,
    key: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /api/objects` — list objects under an optional prefix.
pub async fn list_objects(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    if let Err(resp) = authenticate_admin(&state, &headers) {
        return resp;
    }

    let prefix = query.prefix.unwrap_or_default();
    let max_keys = clamp_list_keys(query.max_keys);

    let start = std::time::Instant::now();
    match state.store.list(&prefix, max_keys).await {
        Ok(listed) => {
            obs::record_storage_op_duration("list", start.elapsed().as_secs_f64());
            Json(ListResponse {
                items: listed.items,
                is_truncated: listed.is_truncated,
                key_count: listed.key_count,
            })
            .into_response()
        }
        Err(e) => {
            obs::inc_storage_error("list");
            error!(prefix, error = %e, "list objects failed");
            error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "list_failed",
                &e.to_string(),
            )
        }
    }
}

/// `GET /api/objects/{...key}` — metadata for one key.
pub async fn head_object(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    if let Err(resp) = authenticate_admin(&state, &headers) {
        return resp;
    }

    let Some(key) = key_from_uri(&uri) else {
        return error_json(StatusCode::BAD_REQUEST, "missing_key", "Missing key");
    };

    match state.store.head(&key).await {
        Ok(meta) => Json(HeadResponse {
            key,
            content_type: meta.content_type,
            content_length: meta.content_length,
            last_modified: meta.last_modified,
            etag: meta.etag,
        })
        .into_response(),
        Err(e) if e.is_not_found() => {
            error_json(StatusCode::NOT_FOUND, "not_found", "Not found")
        }
        Err(e) => {
            obs::inc_storage_error("head");
            error!(key, error = %e, "head object failed");
            error_json(StatusCode::NOT_FOUND, "not_found", "Not found")
        }
    }
}

/// One file extracted from a multipart upload.
struct UploadFile {
    file_name: String,
    content_type: String,
    data: Bytes,
}

/// `POST /api/objects` — create objects.
///
/// Accepts either `multipart/form-data` (`file` fields, one or many, plus an
/// optional `key`) or JSON `{key, body}`. Multi-file batches upload
/// concurrently and fail as a whole on the first error, so a failed batch
/// may still have landed a subset of its files.
pub async fn create_objects(State(state): State<AppState>, request: Request) -> Response {
    if let Err(resp) = authenticate_admin(&state, request.headers()) {
        return resp;
    }

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if content_type.starts_with("multipart/form-data") {
        match Multipart::from_request(request, &()).await {
            Ok(multipart) => create_from_multipart(&state, multipart).await,
            Err(e) => error_json(StatusCode::BAD_REQUEST, "invalid_multipart", &e.to_string()),
        }
    } else {
        let body = match axum::body::to_bytes(request.into_body(), MAX_JSON_BODY_BYTES).await {
            Ok(b) => b,
            Err(e) => {
                return error_json(StatusCode::BAD_REQUEST, "invalid_body", &e.to_string());
            }
        };
        create_from_json(&state, &body).await
    }
}

async fn create_from_multipart(state: &AppState, mut multipart: Multipart) -> Response {
    let mut files: Vec<UploadFile> = Vec::new();
    let mut key_field = String::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return error_json(StatusCode::BAD_REQUEST, "invalid_multipart", &e.to_string());
            }
        };

        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .filter(|t| !t.is_empty())
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = match field.bytes().await {
                    Ok(d) => d,
                    Err(e) => {
                        return error_json(
                            StatusCode::BAD_REQUEST,
                            "invalid_multipart",
                            &e.to_string(),
                        );
                    }
                };
                files.push(UploadFile {
                    file_name,
                    content_type,
                    data,
                });
            }
            Some("key") => {
                key_field = field.text().await.unwrap_or_default();
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return error_json(
            StatusCode::BAD_REQUEST,
            "missing_file",
            "Missing file in form data",
        );
    }

    let key_field = key_field.trim().to_string();

    if files.len() == 1 {
        let file = files.remove(0);
        let key = if key_field.is_empty() {
            file.file_name.clone()
        } else {
            key_field
        };
        let key = path::normalize_key(&key);
        if !path::is_valid_key(&key) {
            return error_json(StatusCode::BAD_REQUEST, "invalid_key", "Invalid key");
        }

        return match put_file(state, key.clone(), file).await {
            Ok(key) => {
                info!(key, "object uploaded");
                Json(serde_json::json!({ "key": key })).into_response()
            }
            Err(resp) => resp,
        };
    }

    // Batch: the key field names a destination folder; each file keeps its
    // own name under it.
    let folder = path::normalize_key(key_field.trim_end_matches('/'));
    let mut uploads = Vec::with_capacity(files.len());
    for file in files {
        let key = if folder.is_empty() {
            path::normalize_key(&file.file_name)
        } else {
            format!("{}/{}", folder, path::normalize_key(&file.file_name))
        };
        if !path::is_valid_key(&key) {
            return error_json(StatusCode::BAD_REQUEST, "invalid_key", "Invalid key");
        }
        uploads.push((key, file));
    }

    // All-or-nothing combinator: every put runs concurrently and the whole
    // batch rejects on the first failure even if other files already landed.
    let puts = uploads
        .into_iter()
        .map(|(key, file)| put_file(state, key, file));

    match try_join_all(puts).await {
        Ok(keys) => {
            info!(count = keys.len(), "object batch uploaded");
            Json(serde_json::json!({ "keys": keys })).into_response()
        }
        Err(resp) => resp,
    }
}

async fn put_file(state: &AppState, key: String, file: UploadFile) -> Result<String, Response> {
    let start = std::time::Instant::now();
    match state
        .store
        .put(&key, file.data, &file.content_type)
        .await
    {
        Ok(()) => {
            obs::record_storage_op_duration("put", start.elapsed().as_secs_f64());
            Ok(key)
        }
        Err(e) => {
            obs::inc_storage_error("put");
            error!(key, error = %e, "upload failed");
            Err(error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "upload_failed",
                &e.to_string(),
            ))
        }
    }
}

async fn create_from_json(state: &AppState, body: &[u8]) -> Response {
    let json: serde_json::Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(_) => {
            return error_json(
                StatusCode::BAD_REQUEST,
                "invalid_body",
                "JSON body must include key",
            );
        }
    };

    let Some(raw_key) = json.get("key").and_then(|k| k.as_str()) else {
        return error_json(
            StatusCode::BAD_REQUEST,
            "invalid_body",
            "JSON body must include key",
        );
    };

    let key = path::normalize_key(raw_key);
    if !path::is_valid_key(&key) {
        return error_json(StatusCode::BAD_REQUEST, "invalid_key", "Invalid key");
    }

    // String bodies upload verbatim; anything else is stored as its JSON
    // serialization, an absent body as the empty string's.
    let data: Bytes = match json.get("body") {
        Some(serde_json::Value::String(s)) => Bytes::from(s.clone()),
        Some(value) => Bytes::from(value.to_string()),
        None => Bytes::from_static(b"\"\""),
    };

    let file = UploadFile {
        file_name: key.clone(),
        content_type: "application/octet-stream".to_string(),
        data,
    };

    match put_file(state, key, file).await {
        Ok(key) => {
            info!(key, "object uploaded");
            Json(serde_json::json!({ "key": key })).into_response()
        }
        Err(resp) => resp,
    }
}

/// `POST /api/objects/{...key}` — creation posts to the collection only.
pub async fn post_with_key(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(resp) = authenticate_admin(&state, &headers) {
        return resp;
    }
    error_json(
        StatusCode::BAD_REQUEST,
        "invalid_request",
        "POST to list only (no key in path)",
    )
}

/// `PUT /api/objects/{...key}` — rename (copy then delete source).
pub async fn rename_object(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Json(body): Json<RenameRequest>,
) -> Response {
    if let Err(resp) = authenticate_admin(&state, &headers) {
        return resp;
    }

    let Some(old_key) = key_from_uri(&uri) else {
        return error_json(StatusCode::BAD_REQUEST, "missing_key", "Missing key");
    };

    let new_key = body
        .new_key
        .or(body.key)
        .map(|k| path::normalize_key(&k))
        .filter(|k| path::is_valid_key(k));

    let Some(new_key) = new_key else {
        return error_json(
            StatusCode::BAD_REQUEST,
            "invalid_key",
            "Body must include newKey (string)",
        );
    };

    let start = std::time::Instant::now();
    match state.store.copy(&old_key, &new_key).await {
        Ok(()) => {
            obs::record_storage_op_duration("copy", start.elapsed().as_secs_f64());
            info!(from = old_key, to = new_key, "object renamed");
            Json(serde_json::json!({ "key": new_key })).into_response()
        }
        Err(e) => {
            obs::inc_storage_error("copy");
            error!(from = old_key, to = new_key, error = %e, "rename failed");
            error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "rename_failed",
                &e.to_string(),
            )
        }
    }
}

/// `DELETE /api/objects/{...key}` — idempotent delete.
pub async fn delete_object(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    if let Err(resp) = authenticate_admin(&state, &headers) {
        return resp;
    }

    let Some(key) = key_from_uri(&uri) else {
        return error_json(StatusCode::BAD_REQUEST, "missing_key", "Missing key");
    };

    let start = std::time::Instant::now();
    match state.store.delete(&key).await {
        Ok(()) => {
            obs::record_storage_op_duration("delete", start.elapsed().as_secs_f64());
            info!(key, "object deleted");
            Json(serde_json::json!({ "deleted": key })).into_response()
        }
        Err(e) => {
            obs::inc_storage_error("delete");
            error!(key, error = %e, "delete failed");
            error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "delete_failed",
                &e.to_string(),
            )
        }
    }
}

/// `PUT`/`DELETE /api/objects` without a key.
pub async fn missing_key(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(resp) = authenticate_admin(&state, &headers) {
        return resp;
    }
    error_json(StatusCode::BAD_REQUEST, "missing_key", "Missing key")
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Recover the object key from the raw request path so each segment is
/// percent-decoded individually by the codec.
fn key_from_uri(uri: &Uri) -> Option<String> {
    let rest = uri.path().strip_prefix(OBJECTS_PREFIX)?;
    path::decode_path(rest)
}

/// Gate an admin handler behind HTTP Basic auth.
pub fn authenticate_admin(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match state.auth.check_header(header) {
        CredentialStatus::Valid => Ok(()),
        CredentialStatus::Missing | CredentialStatus::Invalid => Err(unauthorized()),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use bytes::Bytes;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::delivery::router::test_support::{auth_header, test_state};
    use crate::delivery::router::build_router;
    use crate::storage::ObjectStore;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn authed(builder: axum::http::request::Builder) -> axum::http::request::Builder {
        builder.header(header::AUTHORIZATION, auth_header())
    }

    const BOUNDARY: &str = "depot-test-boundary";

    fn multipart_body(parts: &[(&str, Option<&str>, Option<&str>, &str)]) -> (String, Body) {
        let mut body = String::new();
        for (name, filename, content_type, data) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match filename {
                Some(f) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n"
                )),
            }
            if let Some(ct) = content_type {
                body.push_str(&format!("Content-Type: {ct}\r\n"));
            }
            body.push_str("\r\n");
            body.push_str(data);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        (
            format!("multipart/form-data; boundary={BOUNDARY}"),
            Body::from(body),
        )
    }

    #[tokio::test]
    async fn test_multipart_upload_round_trips_content_type() {
        let (state, store, _) = test_state();
        let router = build_router(state);

        let (content_type, body) = multipart_body(&[
            ("file", Some("cat.png"), Some("image/png"), "PNGDATA"),
            ("key", None, None, "images/cat.png"),
        ]);

        let response = router
            .oneshot(
                authed(Request::builder().method("POST").uri("/api/objects"))
                    .header(header::CONTENT_TYPE, content_type)
                    .body(body)
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["key"], "images/cat.png");

        let meta = store.head("images/cat.png").await.unwrap();
        assert_eq!(meta.content_type, "image/png");
        assert_eq!(meta.content_length, 7);
    }

    #[tokio::test]
    async fn test_multipart_batch_uploads_all_files() {
        let (state, store, _) = test_state();
        let router = build_router(state);

        let (content_type, body) = multipart_body(&[
            ("file", Some("a.txt"), Some("text/plain"), "aaa"),
            ("file", Some("b.txt"), Some("text/plain"), "bbb"),
            ("key", None, None, "docs/"),
        ]);

        let response = router
            .oneshot(
                authed(Request::builder().method("POST").uri("/api/objects"))
                    .header(header::CONTENT_TYPE, content_type)
                    .body(body)
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let keys: Vec<&str> = json["keys"]
            .as_array()
            .unwrap()
            .iter()
            .map(|k| k.as_str().unwrap())
            .collect();
        assert_eq!(keys, vec!["docs/a.txt", "docs/b.txt"]);
        assert!(store.exists("docs/a.txt").await);
        assert!(store.exists("docs/b.txt").await);
    }

    #[tokio::test]
    async fn test_traversal_key_rejected_with_invalid_key() {
        let (state, store, _) = test_state();
        let router = build_router(state);

        let response = router
            .oneshot(
                authed(Request::builder().method("POST").uri("/api/objects"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::json!({ "key": "../etc/passwd", "body": "x" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "Invalid key");
        assert_eq!(store.object_count().await, 0);
    }

    #[tokio::test]
    async fn test_json_upload_without_key_is_400() {
        let (state, _, _) = test_state();
        let router = build_router(state);

        let response = router
            .oneshot(
                authed(Request::builder().method("POST").uri("/api/objects"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::json!({ "body": "x" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["message"],
            "JSON body must include key"
        );
    }

    #[tokio::test]
    async fn test_list_clamps_max_keys() {
        let (state, store, _) = test_state();
        for i in 0..1005 {
            store
                .put(&format!("bulk/{i:04}"), Bytes::from_static(b"x"), "text/plain")
                .await
                .unwrap();
        }
        let router = build_router(state);

        let response = router
            .oneshot(
                authed(
                    Request::builder().uri("/api/objects?prefix=bulk/&maxKeys=5000"),
                )
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["keyCount"], 1000);
        assert_eq!(json["isTruncated"], true);
        assert_eq!(json["items"].as_array().unwrap().len(), 1000);
    }

    #[tokio::test]
    async fn test_head_reports_metadata_and_404() {
        let (state, store, _) = test_state();
        store
            .put("docs/readme.md", Bytes::from_static(b"# hi"), "text/markdown")
            .await
            .unwrap();
        let router = build_router(state);

        let response = router
            .clone()
            .oneshot(
                authed(Request::builder().uri("/api/objects/docs/readme.md"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["key"], "docs/readme.md");
        assert_eq!(json["contentType"], "text/markdown");
        assert_eq!(json["contentLength"], 4);

        let response = router
            .oneshot(
                authed(Request::builder().uri("/api/objects/docs/absent.md"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rename_moves_object() {
        let (state, store, _) = test_state();
        store
            .put("old/name.txt", Bytes::from_static(b"content"), "text/plain")
            .await
            .unwrap();
        let router = build_router(state);

        let response = router
            .oneshot(
                authed(Request::builder().method("PUT").uri("/api/objects/old/name.txt"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::json!({ "newKey": "new/name.txt" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["key"], "new/name.txt");
        assert!(!store.exists("old/name.txt").await);
        assert!(store.exists("new/name.txt").await);
    }

    #[tokio::test]
    async fn test_rename_rejects_traversal_target() {
        let (state, store, _) = test_state();
        store
            .put("old/name.txt", Bytes::from_static(b"content"), "text/plain")
            .await
            .unwrap();
        let router = build_router(state);

        let response = router
            .oneshot(
                authed(Request::builder().method("PUT").uri("/api/objects/old/name.txt"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::json!({ "newKey": "../escape.txt" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(store.exists("old/name.txt").await);
    }

    #[tokio::test]
    async fn test_delete_twice_stays_ok() {
        let (state, store, _) = test_state();
        store
            .put("tmp/x.bin", Bytes::from_static(b"x"), "application/octet-stream")
            .await
            .unwrap();
        let router = build_router(state);

        for _ in 0..2 {
            let response = router
                .clone()
                .oneshot(
                    authed(Request::builder().method("DELETE").uri("/api/objects/tmp/x.bin"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_json(response).await["deleted"], "tmp/x.bin");
        }
        assert!(!store.exists("tmp/x.bin").await);
    }

    #[tokio::test]
    async fn test_admin_routes_require_auth() {
        let (state, _, _) = test_state();
        let router = build_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/objects")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response
            .headers()
            .contains_key(header::WWW_AUTHENTICATE.as_str()));
    }

    #[tokio::test]
    async fn test_post_with_key_in_path_is_400() {
        let (state, _, _) = test_state();
        let router = build_router(state);

        let response = router
            .oneshot(
                authed(Request::builder().method("POST").uri("/api/objects/some/key"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
