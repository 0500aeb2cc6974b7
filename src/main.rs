//! # triage
//!
//! Interactive symptom-triage client. Wires the HTTP backend client to the
//! session engine and drives it from a line-based prompt.

mod repl;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::broadcast;

use triage_client::HttpTriageApi;
use triage_core::{AnalysisSettings, SessionEvent, TestRegistry, TriageApi};
use triage_engine::Orchestrator;

/// Symptom triage client.
#[derive(Parser, Debug)]
#[command(name = "triage", about = "Interactive symptom triage client")]
struct Cli {
    /// Base URL of the prediction backend.
    #[arg(long, default_value = "http://127.0.0.1:5000")]
    base_url: String,

    /// Per-request timeout in seconds.
    #[arg(long, default_value = "15")]
    request_timeout_secs: u64,

    /// Confidence (percent, 1-100) at which analysis finalizes.
    #[arg(long, default_value = "80")]
    target_confidence: f64,

    /// Maximum prediction rounds per analysis run (1-20).
    #[arg(long, default_value = "5")]
    max_iterations: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();

    let api: Arc<dyn TriageApi> = Arc::new(
        HttpTriageApi::new(&args.base_url)
            .with_request_timeout(Duration::from_secs(args.request_timeout_secs)),
    );
    tracing::info!(base_url = %args.base_url, "backend client ready");

    // The test catalog is loaded once at startup; an unreachable backend
    // just means no specific tests are offered this session.
    let registry = match api.available_tests().await {
        Ok(registry) => {
            tracing::info!(tests = registry.len(), "test catalog loaded");
            registry
        }
        Err(e) => {
            tracing::warn!(error = %e, "test catalog unavailable — continuing without specific tests");
            TestRegistry::default()
        }
    };

    let settings = AnalysisSettings::new(args.target_confidence, args.max_iterations);
    let (event_tx, event_rx) = broadcast::channel::<SessionEvent>(256);
    let orchestrator = Orchestrator::new(api.clone(), registry, settings, event_tx);

    repl::run(orchestrator, api, event_rx).await
}
