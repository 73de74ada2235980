use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::core::auth::BasicAuth;
use crate::core::config::AppConfig;
use crate::core::security::MAX_UPLOAD_BODY_BYTES;
use crate::links::LinkStore;
use crate::storage::ObjectStore;

use super::{links_api, objects, public, redirect};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Shared state injected into every handler. The store handles are
/// constructed once at startup; handlers only ever see the traits.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub links: Arc<dyn LinkStore>,
    pub auth: Arc<BasicAuth>,
    pub config: AppConfig,
    pub start_time: Instant,
    pub metrics_handle: PrometheusHandle,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the full router.
///
/// **Admin API (basic auth, checked per handler):**
/// - `GET/POST /api/objects`, `GET/PUT/DELETE /api/objects/{...key}`
/// - `GET/POST /api/links`, `GET/DELETE /api/links/{code}`
/// - `GET/HEAD /cdn/{...path}` — private file serving
///
/// **Public (no auth):**
/// - `GET/HEAD/OPTIONS /public/{...path}` — file serving with CORS
/// - `GET /s/{code}` — short-link resolution
/// - `GET /healthz`, `GET /readyz`, `GET /metrics`
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/objects",
            get(objects::list_objects)
                .post(objects::create_objects)
                .put(objects::missing_key)
                .delete(objects::missing_key),
        )
        .route(
            "/api/objects/{*key}",
            get(objects::head_object)
                .post(objects::post_with_key)
                .put(objects::rename_object)
                .delete(objects::delete_object),
        )
        .route(
            "/api/links",
            get(links_api::list_links).post(links_api::create_link),
        )
        .route(
            "/api/links/{code}",
            get(links_api::get_link).delete(links_api::delete_link),
        )
        .route(
            "/public/{*path}",
            get(public::serve_public)
                .head(public::head_public)
                .options(public::options_preflight),
        )
        .route(
            "/cdn/{*path}",
            get(public::serve_cdn)
                .head(public::head_cdn)
                .options(public::options_preflight),
        )
        .route("/s/{code}", get(redirect::resolve_short_link))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Health & metrics
// ---------------------------------------------------------------------------

/// `GET /healthz` — liveness probe.
async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /readyz` — readiness probe: one cheap storage round trip, plus the
/// auth mode so operators notice a locked deployment.
async fn readyz(State(state): State<AppState>) -> Response {
    let storage_check = state.store.list("", 1).await;
    let ready = storage_check.is_ok();

    let checks = match storage_check {
        Ok(_) => serde_json::json!({ "storage": { "status": "ok" } }),
        Err(e) => serde_json::json!({
            "storage": { "status": "error", "error": e.to_string() }
        }),
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if ready { "ready" } else { "not_ready" },
            "checks": checks,
            "auth_locked": state.auth.is_locked(),
        })),
    )
        .into_response()
}

/// `GET /metrics` — Prometheus text exposition.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.metrics_handle.render(),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------
