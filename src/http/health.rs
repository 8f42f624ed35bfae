use crate::models::format_timestamp;
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

pub(crate) async fn banner() -> Json<Value> {
    Json(json!({
        "message": "Task Manager API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": timestamp(),
        "uptime": state.uptime_secs(),
        "environment": state.config.environment.as_str(),
    }))
}

pub(crate) async fn health_detailed(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let connected = store_reachable(&state).await;
    let (status, message, database) = if connected {
        (StatusCode::OK, "OK", "connected")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Database connection issue", "disconnected")
    };

    (
        status,
        Json(json!({
            "uptime": state.uptime_secs(),
            "message": message,
            "timestamp": timestamp(),
            "environment": state.config.environment.as_str(),
            "checks": { "database": database },
        })),
    )
}

pub(crate) async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    if store_reachable(&state).await {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not ready" })),
        )
    }
}

pub(crate) async fn live() -> Json<Value> {
    Json(json!({ "status": "alive" }))
}

async fn store_reachable(state: &AppState) -> bool {
    let db = state.db.clone();
    match tokio::task::spawn_blocking(move || db.ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(error)) => {
            tracing::warn!(error = %error, "store ping failed");
            false
        }
        Err(error) => {
            tracing::warn!(error = %error, "store ping task failed");
            false
        }
    }
}

fn timestamp() -> String {
    format_timestamp(&Utc::now())
}
