//! Lightweight mock HTTP server with static snapshot builds.
//!
//! The same route table drives two modes: it either serves live HTTP
//! traffic, or it powers a one-shot build pass that requests every
//! registered capture target over loopback and writes the raw response
//! bytes to disk. Because captures are real HTTP requests against the
//! running server, the files on disk are byte-identical to what a live
//! client would receive through the full middleware chain.
//!
//! # Modules
//!
//! - [`config`]: Runtime configuration derived from CLI flags
//! - [`error`]: Unified error types
//! - [`registry`]: The route table and its TOML entrypoint loader
//! - [`server`]: Router construction, middleware, convenience routes
//! - [`build`]: The loopback snapshot builder
//! - [`render`]: Markdown-to-HTML rendering for documentation routes

pub mod build;
pub mod config;
pub mod error;
pub mod registry;
pub mod render;
pub mod server;
pub mod utils;

pub use config::Config;
pub use error::{MockError, Result};
pub use registry::RouteTable;
