//! Built-in convenience routes, always present under `/-`.
//!
//! Independent of user-defined routes: a homepage, a status-code echo,
//! a request mirror for debugging clients, and the favicon. User routes
//! claiming the same path take precedence.

use std::collections::{BTreeMap, HashMap};

use axum::extract::{Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use serde::Serialize;
use serde_json::Value;

use super::{cookie_map, ServerEnv};
use crate::registry::RouteTable;

const HOMEPAGE_MD: &str = include_str!("../../README.md");
const FAVICON: &[u8] = include_bytes!("../../assets/favicon.ico");

/// Attach convenience routes, skipping paths the user already claimed.
pub fn register(mut router: Router<ServerEnv>, table: &RouteTable) -> Router<ServerEnv> {
    if !table.has_path("/-") {
        router = router.route("/-", get(homepage));
    }
    if !table.has_path("/-/") {
        router = router.route("/-/", get(homepage));
    }
    if !table.has_path("/-/:code") {
        router = router.route("/-/:code", any(status_echo));
    }
    if !table.has_path("/-/mirror") {
        router = router.route("/-/mirror", any(mirror));
    }
    if !table.has_path("/-/mirror/*rest") {
        router = router.route("/-/mirror/*rest", any(mirror));
    }
    if !table.has_path("/favicon.ico") {
        router = router.route("/favicon.ico", get(favicon));
    }
    router
}

/// The fixed response for anything no route matched.
pub async fn route_not_defined() -> Response {
    (StatusCode::NOT_FOUND, "Route not defined").into_response()
}

/// `GET /-/`: human-readable homepage rendered from bundled markdown.
async fn homepage(State(env): State<ServerEnv>) -> Html<String> {
    Html(env.renderer.render(HOMEPAGE_MD))
}

/// `ALL /-/:code`: respond with the literal status code and its
/// canonical reason phrase. Non-3-digit segments do not match this
/// route's contract and get the unmatched-route response instead.
async fn status_echo(Path(code): Path<String>) -> Response {
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_digit()) {
        return route_not_defined().await;
    }

    let Ok(status) = code.parse::<u16>().map(StatusCode::from_u16) else {
        return route_not_defined().await;
    };
    let Ok(status) = status else {
        return route_not_defined().await;
    };

    let reason = status
        .canonical_reason()
        .map_or_else(|| status.as_u16().to_string(), str::to_string);
    (status, reason).into_response()
}

/// Structured echo of a received request.
#[derive(Debug, Serialize)]
struct MirrorResponse {
    body: Value,
    cookies: HashMap<String, String>,
    headers: BTreeMap<String, String>,
    hostname: String,
    method: String,
    original_url: String,
    params: HashMap<String, String>,
    path: String,
    query: HashMap<String, String>,
}

/// `ALL /-/mirror[/*]`: echo the full request back as JSON.
async fn mirror(
    Path(params): Path<HashMap<String, String>>,
    Query(query): Query<HashMap<String, String>>,
    req: Request,
) -> Response {
    let (parts, body) = req.into_parts();

    let bytes = match axum::body::to_bytes(body, super::BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response();
        }
    };

    // JSON bodies are echoed structurally, everything else as a string
    let body = serde_json::from_slice::<Value>(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

    let headers: BTreeMap<String, String> = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    let hostname = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    axum::Json(MirrorResponse {
        body,
        cookies: cookie_map(&parts.headers),
        headers,
        hostname,
        method: parts.method.to_string(),
        original_url: parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string()),
        params,
        path: parts.uri.path().to_string(),
        query,
    })
    .into_response()
}

/// `GET /favicon.ico`: bundled static icon.
async fn favicon() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/x-icon")], FAVICON)
}
