//! HTTP API for the session view and the settlement hook
//!
//! The UI reads the session through `GET` routes; an external chain watcher
//! finalizes pending transactions through `POST /transactions/:id/status`.

use crate::config::ApiConfig;
use crate::error::StatusUpdateError;
use crate::orchestrator::BridgeOrchestrator;
use crate::settlement::{TransactionSelector, TransactionStatus};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<BridgeOrchestrator>,
}

pub fn router(orchestrator: Arc<BridgeOrchestrator>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/view", get(get_view))
        .route("/providers", get(get_providers))
        .route("/transactions", get(get_transactions))
        .route("/transactions/:id/status", post(mark_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { orchestrator })
}

/// Run the HTTP API server
pub async fn run_server(
    config: ApiConfig,
    orchestrator: Arc<BridgeOrchestrator>,
) -> std::io::Result<()> {
    let app = router(orchestrator);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn get_view(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.orchestrator.snapshot().await)
}

async fn get_providers(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.orchestrator.providers().await)
}

async fn get_transactions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.orchestrator.transactions().await)
}

/// Chain watcher hook. `id` is either the transaction id or its chain hash.
async fn mark_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let selector = match Uuid::parse_str(&id) {
        Ok(uuid) => TransactionSelector::Id(uuid),
        Err(_) => TransactionSelector::TxHash(id),
    };

    let tx = state
        .orchestrator
        .mark_transaction_status(selector, body.status, body.tx_hash)
        .await?;
    Ok(Json(tx))
}

// Request and response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusUpdate {
    status: TransactionStatus,
    #[serde(default)]
    tx_hash: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

struct ApiError(StatusUpdateError);

impl From<StatusUpdateError> for ApiError {
    fn from(e: StatusUpdateError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StatusUpdateError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
            StatusUpdateError::AlreadyFinalized { .. } => StatusCode::CONFLICT,
            StatusUpdateError::NotTerminal(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
