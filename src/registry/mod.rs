//! The route table: named HTTP endpoints, their handlers, and the
//! capture targets consumed by build mode.
//!
//! The table is a plain value constructed once at startup, either from
//! the TOML entrypoint file ([`file`]) or programmatically, and passed
//! by reference into both the live server and the snapshot builder.

pub mod file;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use axum::routing::MethodFilter;
use futures::future::BoxFuture;

use crate::error::RegistryError;
use crate::render::MarkdownRenderer;
use crate::server::session::Session;

/// HTTP method a route answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    /// GET requests.
    Get,
    /// POST requests.
    Post,
    /// PUT requests.
    Put,
    /// DELETE requests.
    Delete,
    /// PATCH requests.
    Patch,
    /// HEAD requests.
    Head,
    /// OPTIONS requests.
    Options,
    /// Any method.
    Any,
}

impl RouteMethod {
    /// Parse a method name as written in the entrypoint file.
    pub fn parse(s: &str) -> Result<Self, RegistryError> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "ANY" | "ALL" | "*" => Ok(Self::Any),
            _ => Err(RegistryError::UnknownMethod(s.to_string())),
        }
    }

    /// The axum method filter for this route.
    ///
    /// `Any` has no filter; the server registers it with `routing::any`.
    pub fn filter(self) -> Option<MethodFilter> {
        match self {
            Self::Get => Some(MethodFilter::GET),
            Self::Post => Some(MethodFilter::POST),
            Self::Put => Some(MethodFilter::PUT),
            Self::Delete => Some(MethodFilter::DELETE),
            Self::Patch => Some(MethodFilter::PATCH),
            Self::Head => Some(MethodFilter::HEAD),
            Self::Options => Some(MethodFilter::OPTIONS),
            Self::Any => None,
        }
    }

    /// The HTTP method used when capturing this route in build mode.
    ///
    /// `Any` captures as GET, matching what a browser would fetch.
    pub fn as_http(self) -> Method {
        match self {
            Self::Get | Self::Any => Method::GET,
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
            Self::Delete => Method::DELETE,
            Self::Patch => Method::PATCH,
            Self::Head => Method::HEAD,
            Self::Options => Method::OPTIONS,
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Any => "ANY",
        };
        f.write_str(s)
    }
}

/// Everything a handler gets to see about one inbound request.
///
/// Owned by the handler invocation; dropped once the response is
/// produced. The markdown renderer rides along so handlers that render
/// documentation pages do not need any global state.
pub struct RequestContext {
    /// Request method.
    pub method: Method,
    /// Request path (no query string).
    pub path: String,
    /// Path plus query string as received.
    pub original_url: String,
    /// Captured path parameters.
    pub params: HashMap<String, String>,
    /// Query parameters.
    pub query: HashMap<String, String>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Cookies sent by the client.
    pub cookies: HashMap<String, String>,
    /// The caller's session.
    pub session: Session,
    /// Markdown rendering capability.
    pub render: Arc<MarkdownRenderer>,
    /// Raw request body.
    pub body: Bytes,
}

/// A route handler: request context in, response out.
pub type HandlerFn = Arc<dyn Fn(RequestContext) -> BoxFuture<'static, Response> + Send + Sync>;

/// A single registered route. Identity is (method, path).
#[derive(Clone)]
pub struct RouteDefinition {
    /// Method the route answers to.
    pub method: RouteMethod,
    /// Path pattern, literal or parameterized (`/users/:id`).
    pub path: String,
    /// Response-producing logic.
    pub handler: HandlerFn,
}

impl fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// A route slated for static capture during a build pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    /// Method of the loopback request.
    pub method: RouteMethod,
    /// Request path of the loopback request.
    pub path: String,
    /// Destination file for the raw response bytes.
    pub dest: PathBuf,
}

/// The route table shared by both execution modes.
#[derive(Default, Clone)]
pub struct RouteTable {
    routes: Vec<RouteDefinition>,
    build_targets: Vec<BuildTarget>,
    /// Artificial per-request delay in milliseconds (0 = none).
    pub delay_ms: u64,
}

impl RouteTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route.
    pub fn route<H, Fut>(
        &mut self,
        method: RouteMethod,
        path: impl Into<String>,
        handler: H,
    ) -> Result<(), RegistryError>
    where
        H: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(RegistryError::InvalidPath(path));
        }

        let handler: HandlerFn = Arc::new(move |ctx| Box::pin(handler(ctx)));
        self.routes.push(RouteDefinition {
            method,
            path,
            handler,
        });
        Ok(())
    }

    /// Register a capture target for build mode.
    pub fn capture(
        &mut self,
        method: RouteMethod,
        path: impl Into<String>,
        dest: impl Into<PathBuf>,
    ) -> Result<(), RegistryError> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(RegistryError::InvalidPath(path));
        }

        self.build_targets.push(BuildTarget {
            method,
            path,
            dest: dest.into(),
        });
        Ok(())
    }

    /// All registered routes.
    pub fn routes(&self) -> &[RouteDefinition] {
        &self.routes
    }

    /// All registered capture targets.
    pub fn build_targets(&self) -> &[BuildTarget] {
        &self.build_targets
    }

    /// Whether a route with this exact path pattern exists (any method).
    ///
    /// Used to let user routes shadow the built-in convenience routes.
    pub fn has_path(&self, path: &str) -> bool {
        self.routes.iter().any(|r| r.path == path)
    }

    /// Destination paths shared by more than one capture target.
    ///
    /// Concurrent captures racing on the same file are last-writer-wins;
    /// the builder warns about these before firing.
    pub fn duplicate_destinations(&self) -> Vec<&Path> {
        let mut counts: HashMap<&Path, usize> = HashMap::new();
        for target in &self.build_targets {
            *counts.entry(target.dest.as_path()).or_default() += 1;
        }
        let mut dups: Vec<&Path> = counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(p, _)| p)
            .collect();
        dups.sort();
        dups
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table has no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.routes)
            .field("build_targets", &self.build_targets)
            .field("delay_ms", &self.delay_ms)
            .finish()
    }
}
