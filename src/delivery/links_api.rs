use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use tracing::{error, info};
use url::Url;

use crate::links::{generate_short_code, is_valid_short_code, LinkRecord};

use super::objects::authenticate_admin;
use super::response::error_json;
use super::router::AppState;

// ---------------------------------------------------------------------------
// Link admin API
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    #[serde(rename = "longUrl")]
    long_url: Option<String>,
    #[serde(rename = "shortCode")]
    short_code: Option<String>,
}

fn is_valid_long_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => url.scheme() == "http" || url.scheme() == "https",
        Err(_) => false,
    }
}

/// `GET /api/links` — all records, newest first.
pub async fn list_links(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(resp) = authenticate_admin(&state, &headers) {
        return resp;
    }

    match state.links.list_links().await {
        Ok(links) => Json(serde_json::json!({ "links": links })).into_response(),
        Err(e) => {
            error!(error = %e, "list links failed");
            error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "list_failed",
                &e.to_string(),
            )
        }
    }
}

/// `POST /api/links` — create (or overwrite) a short link.
///
/// Creation is an upsert so retried or duplicate POSTs stay idempotent;
/// clients that need insert-only semantics go through the store's
/// `put_link` instead.
pub async fn create_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateLinkRequest>,
) -> Response {
    if let Err(resp) = authenticate_admin(&state, &headers) {
        return resp;
    }

    let long_url = body.long_url.as_deref().unwrap_or("").trim().to_string();
    if long_url.is_empty() || !is_valid_long_url(&long_url) {
        return error_json(
            StatusCode::BAD_REQUEST,
            "invalid_url",
            "Valid longUrl (http or https) is required",
        );
    }

    let short_code = body.short_code.as_deref().unwrap_or("").trim().to_string();
    let short_code = if short_code.is_empty() {
        generate_short_code()
    } else if is_valid_short_code(&short_code) {
        short_code
    } else {
        return error_json(
            StatusCode::BAD_REQUEST,
            "invalid_short_code",
            "shortCode must be 1-64 chars: letters, numbers, underscore, hyphen",
        );
    };

    match state.links.put_link_overwrite(&short_code, &long_url).await {
        Ok(record) => {
            info!(short_code = %record.short_code, "short link created");
            Json(record).into_response()
        }
        Err(e) => {
            error!(short_code, error = %e, "create link failed");
            error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "create_failed",
                &e.to_string(),
            )
        }
    }
}

/// `GET /api/links/{code}` — one record.
pub async fn get_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> Response {
    if let Err(resp) = authenticate_admin(&state, &headers) {
        return resp;
    }

    match state.links.get_link(&code).await {
        Ok(Some(record)) => Json::<LinkRecord>(record).into_response(),
        Ok(None) => error_json(StatusCode::NOT_FOUND, "not_found", "Not found"),
        Err(e) => {
            error!(code, error = %e, "get link failed");
            error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "get_failed",
                &e.to_string(),
            )
        }
    }
}

/// `DELETE /api/links/{code}` — idempotent delete.
pub async fn delete_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> Response {
    if let Err(resp) = authenticate_admin(&state, &headers) {
        return resp;
    }

    match state.links.delete_link(&code).await {
        Ok(()) => {
            info!(code, "short link deleted");
            Json(serde_json::json!({ "deleted": code })).into_response()
        }
        Err(e) => {
            error!(code, error = %e, "delete link failed");
            error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "delete_failed",
                &e.to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::delivery::router::test_support::{auth_header, test_state};
    use crate::delivery::router::build_router;
    use crate::links::LinkStore;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, auth_header())
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_generates_four_char_code() {
        let (state, _, _) = test_state();
        let router = build_router(state);

        let response = router
            .oneshot(post_json(
                "/api/links",
                serde_json::json!({ "longUrl": "https://example.com/x" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let code = json["shortCode"].as_str().unwrap();
        assert_eq!(code.len(), 4);
        assert!(code.bytes().all(|b| b.is_ascii_alphanumeric()));
        assert_eq!(json["longUrl"], "https://example.com/x");
    }

    #[tokio::test]
    async fn test_create_rejects_bad_url_and_code() {
        let (state, _, _) = test_state();
        let router = build_router(state);

        let response = router
            .clone()
            .oneshot(post_json(
                "/api/links",
                serde_json::json!({ "longUrl": "ftp://example.com/x" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router
            .oneshot(post_json(
                "/api/links",
                serde_json::json!({
                    "longUrl": "https://example.com/x",
                    "shortCode": "bad code!"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_is_idempotent_upsert() {
        let (state, _, links) = test_state();
        let router = build_router(state);

        for _ in 0..2 {
            let response = router
                .clone()
                .oneshot(post_json(
                    "/api/links",
                    serde_json::json!({
                        "longUrl": "https://example.com/x",
                        "shortCode": "abcd"
                    }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let all = links.list_links().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].short_code, "abcd");
    }

    #[tokio::test]
    async fn test_get_and_delete_round_trip() {
        let (state, _, links) = test_state();
        links
            .put_link_overwrite("abcd", "https://example.com/x")
            .await
            .unwrap();
        let router = build_router(state);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/links/abcd")
                    .header(header::AUTHORIZATION, auth_header())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["longUrl"], "https://example.com/x");

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/links/abcd")
                    .header(header::AUTHORIZATION, auth_header())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/links/abcd")
                    .header(header::AUTHORIZATION, auth_header())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_links_api_requires_auth() {
        let (state, _, _) = test_state();
        let router = build_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/links")
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
}
