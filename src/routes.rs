// Direct-query HTTP routes: both endpoints serve the live snapshot

use axum::{Router, extract::State, http::StatusCode, routing::get};
use std::sync::{Arc, RwLock};
use tower_http::cors::{Any, CorsLayer};

use crate::models::Snapshot;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) snapshot: Arc<RwLock<Snapshot>>,
}

pub fn app(snapshot: Arc<RwLock<Snapshot>>) -> Router {
    Router::new()
        .route("/", get(health_handler)) // GET /
        .route("/system", get(system_handler)) // GET /system
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(AppState { snapshot })
}

/// GET / — liveness check; identical body to /system by contract.
async fn health_handler(
    State(state): State<AppState>,
) -> Result<axum::Json<Snapshot>, StatusCode> {
    tracing::debug!("Health check requested");
    current_snapshot(&state)
}

/// GET /system — the full aggregated snapshot. Keeps serving the last-known
/// data even while the broker is disconnected.
async fn system_handler(
    State(state): State<AppState>,
) -> Result<axum::Json<Snapshot>, StatusCode> {
    tracing::debug!("System info requested");
    current_snapshot(&state)
}

fn current_snapshot(state: &AppState) -> Result<axum::Json<Snapshot>, StatusCode> {
    state
        .snapshot
        .read()
        .map(|s| axum::Json(s.clone()))
        .map_err(|e| {
            tracing::error!(error = %e, "snapshot lock poisoned");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
