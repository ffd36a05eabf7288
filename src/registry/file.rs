//! TOML entrypoint loader: turns a declarative API definition file
//! into a route table.
//!
//! Each `[[route]]` carries a method, a path, and exactly one response
//! form; `[[build]]` entries name the capture targets for build mode.
//! Relative file and output paths resolve against the entrypoint's
//! directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::RegistryError;
use crate::registry::{RequestContext, RouteMethod, RouteTable};

#[derive(Debug, Deserialize)]
struct EntrypointDoc {
    #[serde(default)]
    options: Options,
    #[serde(default, rename = "route")]
    routes: Vec<RouteSpec>,
    #[serde(default, rename = "build")]
    builds: Vec<BuildSpec>,
}

#[derive(Debug, Default, Deserialize)]
struct Options {
    /// Artificial per-request delay to simulate a slow network.
    #[serde(default)]
    delay_ms: u64,
}

#[derive(Debug, Deserialize)]
struct RouteSpec {
    #[serde(default = "default_method")]
    method: String,
    path: String,
    #[serde(flatten)]
    response: ResponseSpec,
}

#[derive(Debug, Deserialize)]
struct BuildSpec {
    #[serde(default = "default_method")]
    method: String,
    path: String,
    out: PathBuf,
}

fn default_method() -> String {
    "GET".to_string()
}

/// The response forms a route may declare. Exactly one per route.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResponseSpec {
    Text {
        text: String,
        #[serde(default)]
        status: Option<u16>,
        #[serde(default)]
        content_type: Option<String>,
    },
    Json {
        json: toml::Value,
    },
    File {
        file: PathBuf,
    },
    Markdown {
        markdown: PathBuf,
    },
    Status {
        status: u16,
    },
    SessionFlag {
        session_flag: String,
    },
}

/// Load a route table from an entrypoint file.
pub fn load(entrypoint: &Path) -> crate::Result<RouteTable> {
    let raw = std::fs::read_to_string(entrypoint).map_err(|source| RegistryError::Read {
        path: entrypoint.to_path_buf(),
        source,
    })?;

    let data_dir = entrypoint.parent().unwrap_or_else(|| Path::new("."));
    parse(&raw, data_dir)
}

/// Parse an entrypoint document, resolving relative paths against
/// `data_dir`.
pub fn parse(raw: &str, data_dir: &Path) -> crate::Result<RouteTable> {
    let doc: EntrypointDoc =
        toml::from_str(raw).map_err(|e| RegistryError::Parse(Box::new(e)))?;

    let mut table = RouteTable::new();
    table.delay_ms = doc.options.delay_ms;

    for spec in doc.routes {
        let method = RouteMethod::parse(&spec.method)?;
        register(&mut table, method, spec.path, spec.response, data_dir)?;
    }

    for spec in doc.builds {
        let method = RouteMethod::parse(&spec.method)?;
        table.capture(method, spec.path, data_dir.join(spec.out))?;
    }

    Ok(table)
}

fn register(
    table: &mut RouteTable,
    method: RouteMethod,
    path: String,
    response: ResponseSpec,
    data_dir: &Path,
) -> Result<(), RegistryError> {
    match response {
        ResponseSpec::Text {
            text,
            status,
            content_type,
        } => {
            let status = resolve_status(status.unwrap_or(200), &path)?;
            let content_type =
                content_type.unwrap_or_else(|| "text/plain; charset=utf-8".to_string());
            table.route(method, path, move |_ctx| {
                let text = text.clone();
                let content_type = content_type.clone();
                async move {
                    (status, [(header::CONTENT_TYPE, content_type)], text).into_response()
                }
            })
        }
        ResponseSpec::Json { json } => {
            let payload: Value = serde_json::to_value(&json).map_err(|source| {
                RegistryError::Json {
                    path: path.clone(),
                    source,
                }
            })?;
            table.route(method, path, move |_ctx| {
                let payload = payload.clone();
                async move { axum::Json(payload).into_response() }
            })
        }
        ResponseSpec::File { file } => {
            let resolved = data_dir.join(file);
            table.route(method, path, move |_ctx| serve_file(resolved.clone()))
        }
        ResponseSpec::Markdown { markdown } => {
            let resolved = data_dir.join(markdown);
            table.route(method, path, move |ctx| serve_markdown(ctx, resolved.clone()))
        }
        ResponseSpec::Status { status } => {
            let status = resolve_status(status, &path)?;
            table.route(method, path, move |_ctx| async move {
                let reason = status
                    .canonical_reason()
                    .map_or_else(|| status.as_u16().to_string(), str::to_string);
                (status, reason).into_response()
            })
        }
        ResponseSpec::SessionFlag { session_flag } => {
            let key: Arc<str> = Arc::from(session_flag.as_str());
            table.route(method, path, move |ctx| session_probe(ctx, key.clone()))
        }
    }
}

fn resolve_status(status: u16, path: &str) -> Result<StatusCode, RegistryError> {
    StatusCode::from_u16(status).map_err(|_| RegistryError::InvalidStatus {
        status,
        path: path.to_string(),
    })
}

async fn serve_file(path: PathBuf) -> Response {
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = content_type_for(&path);
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(e) => {
            warn!("failed to read {}: {}", path.display(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to read file").into_response()
        }
    }
}

async fn serve_markdown(ctx: RequestContext, path: PathBuf) -> Response {
    match ctx.render.render_file(&path).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            warn!("failed to render {}: {}", path.display(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render markdown").into_response()
        }
    }
}

/// Commands accepted by the session login probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionAction {
    /// Report the current flag.
    Status,
    /// Set the flag.
    Login,
    /// Clear the flag.
    Logout,
}

impl FromStr for SessionAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(Self::Login),
            "logout" => Ok(Self::Logout),
            _ => Err(()),
        }
    }
}

/// A fake login endpoint driven by `?action=login|logout`, storing a
/// boolean flag in the caller's session.
async fn session_probe(ctx: RequestContext, key: Arc<str>) -> Response {
    let action = match ctx.query.get("action") {
        None => SessionAction::Status,
        Some(raw) => match raw.parse() {
            Ok(action) => action,
            Err(()) => {
                return (StatusCode::BAD_REQUEST, format!("unknown action {raw:?}"))
                    .into_response();
            }
        },
    };

    match action {
        SessionAction::Status => {
            let flag = ctx
                .session
                .get(&key)
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            format!("logged in: {flag}").into_response()
        }
        SessionAction::Login => {
            ctx.session.insert(key.to_string(), Value::Bool(true));
            "logged in".into_response()
        }
        SessionAction::Logout => {
            ctx.session.insert(key.to_string(), Value::Bool(false));
            "logged out".into_response()
        }
    }
}

/// Content type for a served file, from its extension.
fn content_type_for(path: &Path) -> &'static str {
    let extension = path.extension().and_then(|e| e.to_str());
    match extension {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("txt" | "md") => "text/plain; charset=utf-8",
        Some("xml") => "application/xml",
        Some("js" | "mjs") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
