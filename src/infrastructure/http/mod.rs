//! Bridge HTTP transport.
//!
//! A thin axum layer over the command bus: POST `/` dispatches one
//! command request, GET `/health` serves the liveness probe. The
//! transport owns nothing; all semantics live in the dispatcher.

use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::application::SyndicateRuntime;
use crate::services::{CommandRequest, CommandResponse};

/// Builds the bridge router.
pub fn router(runtime: Arc<SyndicateRuntime>) -> Router {
    Router::new()
        .route("/", post(handle_command))
        .route("/health", get(handle_health))
        .with_state(runtime)
}

/// Binds and serves the bridge until the server task is dropped.
pub async fn serve(runtime: Arc<SyndicateRuntime>, listen: &str) -> Result<()> {
    let app = router(runtime);
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind bridge listener on {listen}"))?;
    info!(listen = %listen, "bridge transport listening");
    axum::serve(listener, app).await.context("bridge server failed")?;
    Ok(())
}

async fn handle_command(
    State(runtime): State<Arc<SyndicateRuntime>>,
    Json(request): Json<CommandRequest>,
) -> Json<CommandResponse> {
    Json(runtime.commands.dispatch(request).await)
}

async fn handle_health(State(runtime): State<Arc<SyndicateRuntime>>) -> Json<Value> {
    Json(runtime.health_probe())
}
