//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Provider directory loads and call latency
//! - Quote flow per direction
//! - Deposits and settlement outcomes
//! - Error rates per operation

use crate::error::BridgeError;
use crate::quote::Direction;
use crate::settlement::TransactionStatus;

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Provider metrics
    pub static ref PROVIDER_LOADS: CounterVec = register_counter_vec!(
        "peg_provider_loads_total",
        "Provider directory loads by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref PROVIDER_CALL_LATENCY: HistogramVec = register_histogram_vec!(
        "peg_provider_call_seconds",
        "Liquidity provider call latency",
        &["operation"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    // Quote metrics
    pub static ref QUOTES_RECEIVED: CounterVec = register_counter_vec!(
        "peg_quotes_received_total",
        "Valid quotes received by direction",
        &["direction"]
    ).unwrap();

    pub static ref QUOTES_DISCARDED: CounterVec = register_counter_vec!(
        "peg_quotes_discarded_total",
        "Quotes dropped before reaching the cache",
        &["reason"]
    ).unwrap();

    pub static ref QUOTES_ACCEPTED: CounterVec = register_counter_vec!(
        "peg_quotes_accepted_total",
        "Quotes bound with their provider",
        &["direction"]
    ).unwrap();

    // Settlement metrics
    pub static ref DEPOSITS: CounterVec = register_counter_vec!(
        "peg_deposits_total",
        "Peg-out deposit submissions by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref TX_FINALIZED: CounterVec = register_counter_vec!(
        "peg_transactions_finalized_total",
        "Bridge transactions reaching a terminal status",
        &["direction", "status"]
    ).unwrap();

    // Error metrics
    pub static ref OPERATION_ERRORS: CounterVec = register_counter_vec!(
        "peg_operation_errors_total",
        "Errors returned from orchestrator operations",
        &["operation", "kind"]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> std::io::Result<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// Helper functions to record metrics

pub fn record_provider_load(success: bool) {
    PROVIDER_LOADS
        .with_label_values(&[if success { "success" } else { "failure" }])
        .inc();
}

pub fn record_provider_call(operation: &str, latency_secs: f64) {
    PROVIDER_CALL_LATENCY
        .with_label_values(&[operation])
        .observe(latency_secs);
}

pub fn record_quotes_received(direction: Direction, count: usize) {
    QUOTES_RECEIVED
        .with_label_values(&[direction.name()])
        .inc_by(count as f64);
}

pub fn record_quote_discarded(reason: &str) {
    QUOTES_DISCARDED.with_label_values(&[reason]).inc();
}

pub fn record_quote_accepted(direction: Direction) {
    QUOTES_ACCEPTED.with_label_values(&[direction.name()]).inc();
}

pub fn record_deposit(outcome: &str) {
    DEPOSITS.with_label_values(&[outcome]).inc();
}

pub fn record_transaction_finalized(direction: Direction, status: TransactionStatus) {
    TX_FINALIZED
        .with_label_values(&[direction.name(), status.name()])
        .inc();
}

pub fn record_error(operation: &str, error: &BridgeError) {
    OPERATION_ERRORS
        .with_label_values(&[operation, error.kind()])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_are_exported() {
        record_quotes_received(Direction::PegIn, 2);
        record_quote_discarded("foreign_provider");

        let body = metrics_handler().await.unwrap();
        assert!(body.contains("peg_quotes_received_total"));
        assert!(body.contains("foreign_provider"));
    }
}
