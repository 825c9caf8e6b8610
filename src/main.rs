use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use cna_report_gateway::completion::{OpenAiClient, TextGenerator};
use cna_report_gateway::config::Args;
use cna_report_gateway::handlers::router;
use cna_report_gateway::rate_limit::{AdmissionController, Clock, InMemoryWindowStore, SystemClock};
use cna_report_gateway::state::{AppState, StateOptions};

#[tokio::main]
async fn main() -> Result<()> {
    // parse cli arguments
    let settings = Args::parse().validate().context("invalid configuration")?;

    let level = if settings.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    if settings.openai.api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY is not set; report generation will fail");
    }

    let generator: Arc<dyn TextGenerator> = Arc::new(
        OpenAiClient::new(
            &settings.openai.base_url,
            &settings.openai.api_key,
            &settings.openai.model,
            settings.openai.timeout,
        )
        .context("failed to build completion client")?,
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let admission = AdmissionController::with_parts(
        InMemoryWindowStore::default(),
        clock,
        settings.rate_limit,
        settings.rate_window,
    );

    let state = AppState::spawn(
        admission,
        generator,
        StateOptions {
            trust_forwarded_for: settings.trust_forwarded_for,
            admin_token: settings.admin_token.clone(),
            workers: settings.workers,
            queue_capacity: settings.queue_capacity,
        },
    );

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "gateway listening");
    info!(
        url = %settings.openai.base_url,
        model = %settings.openai.model,
        "forwarding to completion service"
    );
    info!(
        limit = settings.rate_limit,
        window_secs = settings.rate_window.num_seconds(),
        "report generation quota per client"
    );
    if settings.admin_token.is_none() {
        info!("admin endpoints disabled (no ADMIN_TOKEN)");
    }

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            // no signal handler means no graceful shutdown; keep serving
            tracing::error!(error = %e, "failed to install ctrl-c handler");
            std::future::pending::<()>().await
        }
    }
}
