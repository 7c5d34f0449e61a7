use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use baodao_core::TalkCore;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

pub fn routes(core: Arc<TalkCore>) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/ready", get(readiness))
        .with_state(core)
}

async fn liveness() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now(),
    }))
}

/// Readiness includes a database round-trip.
async fn readiness(State(core): State<Arc<TalkCore>>) -> (StatusCode, Json<Value>) {
    match core.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"status": "ready", "database": "healthy"})),
        ),
        Err(e) => {
            error!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "not_ready", "database": "unhealthy"})),
            )
        }
    }
}
