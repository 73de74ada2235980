use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, error};
use url::Url;

use crate::core::mime::immutable_cache_control;
use crate::observability::metrics as obs;

use super::response::file_response;
use super::router::AppState;

// ---------------------------------------------------------------------------
// Short-link resolution
// ---------------------------------------------------------------------------
//
// `/s/{code}` is the one route that deliberately degrades instead of
// erroring: a missing code, a missing object, or a backend failure all end
// in a redirect to the site root so shared links never show a 500.

/// `GET /s/{code}`
pub async fn resolve_short_link(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    let code = code.trim();
    if code.is_empty() {
        return redirect_to_root();
    }

    let record = match state.links.get_link(code).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            obs::inc_link_lookup("miss");
            debug!(code, "short link not found");
            return redirect_to_root();
        }
        Err(e) => {
            obs::inc_link_lookup("error");
            error!(code, error = %e, "short link lookup failed");
            return redirect_to_root();
        }
    };

    if is_cdn_url(&record.long_url, &state.config.delivery.cdn_url) {
        if let Some(key) = extract_store_key(&record.long_url) {
            return match state.store.get(&key).await {
                Ok(Some(object)) => {
                    obs::inc_link_lookup("direct_serve");
                    obs::add_delivery_bytes_sent(object.body.len() as u64);
                    // Short-link targets are treated as permanent content.
                    file_response(&key, object, Some(immutable_cache_control()))
                }
                Ok(None) => {
                    obs::inc_link_lookup("object_missing");
                    debug!(code, key, "linked object missing from store");
                    redirect_to_root()
                }
                Err(e) => {
                    obs::inc_link_lookup("error");
                    error!(code, key, error = %e, "store error on short-link serve");
                    redirect_to_root()
                }
            };
        }
    }

    obs::inc_link_lookup("redirect");
    (
        StatusCode::TEMPORARY_REDIRECT,
        [(header::LOCATION, record.long_url)],
    )
        .into_response()
}

fn redirect_to_root() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/".to_string())]).into_response()
}

/// Decide whether a link target is one of our stored objects.
///
/// With a configured CDN URL the decision is an exact host match; without
/// one, fall back to the `cdn.` hostname / `/cdn/` path heuristic.
fn is_cdn_url(raw: &str, cdn_url: &str) -> bool {
    let Ok(parsed) = Url::parse(raw) else {
        return false;
    };

    if !cdn_url.is_empty() {
        let normalized = if cdn_url.starts_with("http") {
            cdn_url.to_string()
        } else {
            format!("https://{}", cdn_url)
        };
        if let Ok(cdn) = Url::parse(&normalized) {
            return parsed.host_str() == cdn.host_str();
        }
        return false;
    }

    parsed.host_str().is_some_and(|h| h.contains("cdn."))
        || parsed.path().starts_with("/cdn/")
}

/// Turn a CDN-flavored URL into an object-store key: strip the leading
/// slash and one `cdn/` path prefix.
fn extract_store_key(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    let path = parsed.path().trim_start_matches('/');
    let key = path.strip_prefix("cdn/").unwrap_or(path);
    if key.is_empty() {
        return None;
    }
    Some(key.to_string())
}
