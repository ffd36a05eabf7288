//! Live server: turns a route table into an axum router with the full
//! middleware chain (CORS, sessions, request logging, optional
//! artificial delay) plus the built-in convenience routes.

pub mod convenience;
pub mod session;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, on};
use axum::Router;
use cookie::Cookie;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::registry::{HandlerFn, RequestContext, RouteMethod, RouteTable};
use crate::render::MarkdownRenderer;
use session::{Session, SessionStore};

/// Largest request body the server buffers (2 MiB).
const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Shared server environment handed to middleware and handlers.
#[derive(Clone)]
pub struct ServerEnv {
    /// Session store.
    pub sessions: SessionStore,
    /// Markdown rendering capability, injected into handler contexts.
    pub renderer: Arc<MarkdownRenderer>,
    /// Artificial per-request delay (zero in build mode).
    pub delay: Duration,
    /// Listener port, used for request log lines.
    pub port: u16,
}

impl ServerEnv {
    /// Create a server environment.
    pub fn new(sessions: SessionStore, renderer: Arc<MarkdownRenderer>, delay: Duration, port: u16) -> Self {
        Self {
            sessions,
            renderer,
            delay,
            port,
        }
    }
}

/// Build the router for a route table.
///
/// User routes are registered first; convenience routes skip any path
/// the user already claimed, so a route table may replace `GET /-/` and
/// friends. Everything unmatched falls through to the fixed 404.
pub fn build_router(table: &RouteTable, env: ServerEnv) -> Router {
    let mut router = Router::new();

    for def in table.routes() {
        router = add_route(router, def.method, &def.path, def.handler.clone());
    }

    router = convenience::register(router, table);
    router = router.fallback(convenience::route_not_defined);

    router
        .layer(middleware::from_fn_with_state(env.clone(), log_request))
        .layer(middleware::from_fn_with_state(env.clone(), delay_request))
        .layer(middleware::from_fn_with_state(
            env.clone(),
            session::session_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(env)
}

fn add_route(
    router: Router<ServerEnv>,
    method: RouteMethod,
    path: &str,
    handler: HandlerFn,
) -> Router<ServerEnv> {
    let service = move |State(env): State<ServerEnv>,
                        Path(params): Path<HashMap<String, String>>,
                        Query(query): Query<HashMap<String, String>>,
                        req: Request| {
        let handler = handler.clone();
        async move { invoke(env, params, query, req, handler).await }
    };

    match method.filter() {
        Some(filter) => router.route(path, on(filter, service)),
        None => router.route(path, any(service)),
    }
}

/// Assemble the request context and run the user handler.
async fn invoke(
    env: ServerEnv,
    params: HashMap<String, String>,
    query: HashMap<String, String>,
    req: Request,
    handler: HandlerFn,
) -> Response {
    let (parts, body) = req.into_parts();

    let body = match axum::body::to_bytes(body, BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response();
        }
    };

    let session = parts
        .extensions
        .get::<Session>()
        .cloned()
        .unwrap_or_else(|| env.sessions.open(None));

    let ctx = RequestContext {
        method: parts.method.clone(),
        path: parts.uri.path().to_string(),
        original_url: parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string()),
        params,
        query,
        cookies: cookie_map(&parts.headers),
        headers: parts.headers,
        session,
        render: env.renderer.clone(),
        body,
    };

    handler(ctx).await
}

/// Collect all request cookies into a name → value map.
pub fn cookie_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(std::result::Result::ok)
        .map(|c| (c.name().to_string(), c.value().to_string()))
        .collect()
}

/// Middleware: one log line per inbound request, before the handler runs.
async fn log_request(State(env): State<ServerEnv>, req: Request, next: Next) -> Response {
    info!(
        "< {} http://localhost:{}{}",
        req.method(),
        env.port,
        req.uri()
    );
    next.run(req).await
}

/// Middleware: artificial delay to simulate a slow network.
async fn delay_request(State(env): State<ServerEnv>, req: Request, next: Next) -> Response {
    if !env.delay.is_zero() {
        tokio::time::sleep(env.delay).await;
    }
    next.run(req).await
}
