//! Peg Orchestrator - two-way peg conversions through competing liquidity providers
//!
//! The daemon hosts one orchestrator session, serves its view over HTTP, and
//! accepts settlement updates from an external chain watcher.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use peg_orchestrator::api;
use peg_orchestrator::chain::EvmChainGateway;
use peg_orchestrator::config::Settings;
use peg_orchestrator::metrics::MetricsServer;
use peg_orchestrator::orchestrator::BridgeOrchestrator;
use peg_orchestrator::provider::HttpProviderClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Peg Orchestrator v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for chain {} with provider API {}",
        settings.chain.chain_id, settings.provider_api.base_url
    );

    let provider_api = Arc::new(HttpProviderClient::new(&settings.provider_api)?);

    let gateway = Arc::new(EvmChainGateway::new(
        &settings.chain,
        settings.bridge.deposit_timeout(),
    )?);
    info!("Deposit wallet {:?}", gateway.wallet_address());

    let orchestrator = Arc::new(BridgeOrchestrator::new(
        provider_api,
        gateway,
        settings.bridge.clone(),
    ));

    match orchestrator.load_providers().await {
        Ok(providers) => info!("Loaded {} liquidity providers", providers.len()),
        Err(e) => warn!("Starting without providers: {}", e),
    }

    // Start API server
    let api_handle = tokio::spawn({
        let config = settings.api.clone();
        let orchestrator = orchestrator.clone();
        async move {
            if let Err(e) = api::run_server(config, orchestrator).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Log orchestrator events
    let events_handle = tokio::spawn({
        let mut events = orchestrator.subscribe();
        async move {
            loop {
                match events.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(json) if event.touches_transactions() => info!("Event: {}", json),
                        Ok(json) => debug!("Event: {}", json),
                        Err(e) => warn!("Failed to encode event {}: {}", event.name(), e),
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Event log lagged, skipped {} events", skipped)
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    });

    info!("Peg Orchestrator is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    api_handle.abort();
    events_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    let pending = orchestrator
        .transactions()
        .await
        .into_iter()
        .filter(|tx| !tx.status.is_terminal())
        .count();
    if pending > 0 {
        warn!("Stopping with {} pending transactions", pending);
    }

    info!("Peg Orchestrator stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,peg_orchestrator=debug,hyper=warn,reqwest=warn"));

    let json = std::env::var("LOG_FORMAT").map_or(false, |f| f.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
