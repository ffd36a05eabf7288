//! Unified error types for the mock server.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the mock server.
#[derive(Error, Debug)]
pub enum MockError {
    /// Route table / entrypoint error.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Snapshot capture error.
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
}

/// Errors raised while loading or validating the route table.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The entrypoint file could not be read.
    #[error("failed to read entrypoint {path}: {source}")]
    Read {
        /// Path to the entrypoint file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The entrypoint file is not valid TOML.
    #[error("failed to parse entrypoint: {0}")]
    Parse(#[from] Box<toml::de::Error>),

    /// A route declared an HTTP method we do not know.
    #[error("unknown HTTP method {0:?}")]
    UnknownMethod(String),

    /// A route path did not start with '/'.
    #[error("route path must start with '/': {0:?}")]
    InvalidPath(String),

    /// A route declared a status code outside 100..=999.
    #[error("invalid status code {status} for route {path}")]
    InvalidStatus {
        /// The offending status code.
        status: u16,
        /// The route path that declared it.
        path: String,
    },

    /// An inline JSON payload could not be converted.
    #[error("invalid json payload for route {path}: {source}")]
    Json {
        /// The route path that declared it.
        path: String,
        /// Underlying conversion error.
        source: serde_json::Error,
    },
}

/// Errors raised by a single snapshot capture.
///
/// These never abort the build pass; they settle that one capture as
/// failed and are logged by the builder.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The loopback request failed (connection refused, timeout, ...).
    #[error("request {method} {path} failed: {source}")]
    Request {
        /// HTTP method of the capture.
        method: String,
        /// Request path of the capture.
        path: String,
        /// Underlying client error.
        source: reqwest::Error,
    },

    /// Writing the captured bytes to disk failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Destination file path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, MockError>;
