mod health;
mod middleware;
mod tasks;

use crate::errors::AppError;
use crate::AppState;
use axum::extract::DefaultBodyLimit;
use axum::http::{Method, Uri};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use axum::Router;

pub use middleware::REQUEST_ID_HEADER;

pub fn build_router(state: AppState) -> Router {
    let task_routes = Router::new()
        .route("/api/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/api/tasks/stats/overview", get(tasks::task_stats))
        .route(
            "/api/tasks/:id",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route_layer(from_fn_with_state(state.clone(), middleware::require_api_token));

    let health_routes = Router::new()
        .route("/", get(health::banner))
        .route("/api/health", get(health::health))
        .route("/api/health/detailed", get(health::health_detailed))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live));

    Router::new()
        .merge(task_routes)
        .merge(health_routes)
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(from_fn_with_state(state.clone(), middleware::cors))
        .layer(from_fn(middleware::security_headers))
        .layer(from_fn_with_state(state.clone(), middleware::request_tracing))
        .with_state(state)
}

async fn route_not_found(method: Method, uri: Uri) -> AppError {
    AppError::NotFound(format!("Route not found: {method} {}", uri.path()))
}
