use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use folio_shared::types::api::HealthResponse;

use crate::AppState;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy("folio-api", env!("CARGO_PKG_VERSION")))
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
