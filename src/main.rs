//! Mock server entry point: the mode dispatcher.
//!
//! Loads the route table once, binds the listener, then either serves
//! forever or runs the snapshot build pass against itself and shuts
//! down once every capture has settled.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mocklite::build::{self, BuildSummary};
use mocklite::config::Config;
use mocklite::registry::{file, RouteTable};
use mocklite::render::MarkdownRenderer;
use mocklite::server::session::SessionStore;
use mocklite::server::{build_router, ServerEnv};
use mocklite::utils::shutdown_signal;

/// Lightweight mock HTTP server.
#[derive(Parser, Debug)]
#[command(name = "mocklite")]
#[command(about = "Lightweight mock HTTP server with static snapshot builds")]
#[command(version)]
struct Args {
    /// Build a static representation of the mock definitions, then exit.
    #[arg(short, long)]
    build: bool,

    /// Port of the mock server.
    #[arg(short, long, default_value = "3030")]
    port: u16,

    /// Path to the entrypoint file with your API definitions.
    #[arg(short, long, default_value = "./mock-data/api.toml")]
    entrypoint: PathBuf,

    /// Session idle timeout in seconds.
    #[arg(long, default_value = "60")]
    session_ttl: u64,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("mocklite=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = Config {
        build: args.build,
        port: args.port,
        entrypoint: args.entrypoint,
        session_ttl_secs: args.session_ttl,
        verbose: args.verbose,
    };

    if let Err(e) = config.validate() {
        return Err(anyhow::anyhow!("invalid configuration: {e}"));
    }

    // Load the route table. A missing entrypoint is recoverable: the
    // server still offers the convenience routes. A present-but-broken
    // one is not; serving the wrong table silently would be worse.
    let table = if config.entrypoint.exists() {
        file::load(&config.entrypoint)?
    } else {
        warn!(
            "Entrypoint file ({}) does not exist and thus is ignored.",
            config.entrypoint.display()
        );
        RouteTable::new()
    };
    info!(
        "Loaded {} route(s), {} build target(s)",
        table.len(),
        table.build_targets().len()
    );

    // Build mode never simulates a slow network
    let delay = if config.build {
        Duration::ZERO
    } else {
        Duration::from_millis(table.delay_ms)
    };

    let env = ServerEnv::new(
        SessionStore::new(config.session_ttl()),
        Arc::new(MarkdownRenderer::new()),
        delay,
        config.port,
    );
    let router = build_router(&table, env);

    // Bind failure (port in use) is fatal and unrecoverable
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Mock server listening at http://localhost:{}", config.port);

    if config.build {
        // Serve in the background only for as long as the build needs it
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    tokio::select! {
                        _ = done_rx => {},
                        () = shutdown_signal() => {},
                    }
                })
                .await
        });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let outcomes = build::run(&table, config.port, &client).await;
        let summary = BuildSummary::of(&outcomes);
        info!(
            "Build finished: {} file(s) written, {} failed",
            summary.written, summary.failed
        );

        // Every capture has settled; close the listener. Failed
        // captures were logged and do not change the exit status.
        let _ = done_tx.send(());
        server.await??;
    } else {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    }

    Ok(())
}
