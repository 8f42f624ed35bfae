#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use task_manager_api_lib::config::{AppConfig, Environment};
use task_manager_api_lib::db::Database;
use task_manager_api_lib::{build_router, AppState};
use tower::ServiceExt;

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        environment: Environment::Test,
        ..AppConfig::default()
    }
}

pub fn app_with(config: AppConfig) -> Router {
    let db = Arc::new(Database::open_in_memory().expect("in-memory db"));
    build_router(AppState::new(db, config))
}

pub fn app_with_db(db: Database, config: AppConfig) -> Router {
    build_router(AppState::new(Arc::new(db), config))
}

pub fn app() -> Router {
    app_with(test_config())
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.expect("router response");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = match to_bytes(response.into_body(), 1024 * 1024).await {
        Ok(bytes) => bytes,
        Err(err) => panic!("failed to read response body: {err}"),
    };
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn get(app: &Router, uri: &str) -> TestResponse {
    let request = Request::builder()
        .uri(uri)
        .method("GET")
        .body(Body::empty())
        .expect("request");
    send(app, request).await
}

pub async fn delete(app: &Router, uri: &str) -> TestResponse {
    let request = Request::builder()
        .uri(uri)
        .method("DELETE")
        .body(Body::empty())
        .expect("request");
    send(app, request).await
}

pub async fn send_json(app: &Router, method: &str, uri: &str, body: &Value) -> TestResponse {
    let request = Request::builder()
        .uri(uri)
        .method(method)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request");
    send(app, request).await
}

pub async fn create_task(app: &Router, body: Value) -> Value {
    let response = send_json(app, "POST", "/api/tasks", &body).await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    response.body["data"].clone()
}
