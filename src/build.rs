//! Snapshot builder: captures route responses over loopback HTTP and
//! writes them to disk.
//!
//! Captures are real requests against the already-listening server, so
//! every captured file went through the same middleware chain live
//! traffic goes through. All captures fire concurrently; [`run`]'s
//! `join_all` is the single barrier the mode dispatcher waits on.

use futures::future::join_all;
use tracing::{error, info, warn};

use crate::error::CaptureError;
use crate::registry::{BuildTarget, RouteTable};
use crate::Result;

/// The settled result of one capture.
#[derive(Debug)]
pub struct CaptureOutcome {
    /// The target this capture was for.
    pub target: BuildTarget,
    /// Bytes written on success.
    pub result: Result<u64>,
}

/// Tally of a finished build pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    /// Captures written to disk.
    pub written: usize,
    /// Captures that failed (logged, not fatal).
    pub failed: usize,
}

impl BuildSummary {
    /// Tally a slice of settled captures.
    pub fn of(outcomes: &[CaptureOutcome]) -> Self {
        let written = outcomes.iter().filter(|o| o.result.is_ok()).count();
        Self {
            written,
            failed: outcomes.len() - written,
        }
    }
}

/// Run the build pass: fire every capture concurrently and wait for
/// all of them to settle. Returns one outcome per target, success or
/// failure; individual failures never abort the pass.
pub async fn run(table: &RouteTable, port: u16, client: &reqwest::Client) -> Vec<CaptureOutcome> {
    for dest in table.duplicate_destinations() {
        warn!(
            "multiple build targets write to {}; last writer wins",
            dest.display()
        );
    }

    let outcomes = join_all(
        table
            .build_targets()
            .iter()
            .map(|target| capture(client, port, target.clone())),
    )
    .await;

    for outcome in &outcomes {
        match &outcome.result {
            Ok(_) => info!("> \"{}\"", outcome.target.dest.display()),
            Err(e) => error!("capture failed: {e}"),
        }
    }

    outcomes
}

/// Capture a single target: loopback request, then write the raw
/// response bytes verbatim, creating parent directories as needed.
async fn capture(client: &reqwest::Client, port: u16, target: BuildTarget) -> CaptureOutcome {
    let result = capture_inner(client, port, &target).await;
    CaptureOutcome { target, result }
}

async fn capture_inner(client: &reqwest::Client, port: u16, target: &BuildTarget) -> Result<u64> {
    let url = format!("http://127.0.0.1:{port}{}", target.path);

    let request_err = |source| CaptureError::Request {
        method: target.method.to_string(),
        path: target.path.clone(),
        source,
    };

    let response = client
        .request(target.method.as_http(), &url)
        .send()
        .await
        .map_err(request_err)?;
    let bytes = response.bytes().await.map_err(request_err)?;

    let write_err = |source| CaptureError::Write {
        path: target.dest.clone(),
        source,
    };

    if let Some(parent) = target.dest.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }
    tokio::fs::write(&target.dest, &bytes)
        .await
        .map_err(write_err)?;

    Ok(bytes.len() as u64)
}
