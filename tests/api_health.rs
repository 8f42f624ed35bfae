mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{app, app_with, app_with_db, get, send, test_config};
use serde_json::json;
use std::time::Duration;
use task_manager_api_lib::config::{AppConfig, Environment};
use task_manager_api_lib::db::Database;

#[tokio::test]
async fn banner_reports_running() {
    let response = get(&app(), "/").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "running");
    assert_eq!(response.body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn health_probes_answer() {
    let app = app();

    let basic = get(&app, "/api/health").await;
    assert_eq!(basic.status, StatusCode::OK);
    assert_eq!(basic.body["status"], "healthy");
    assert_eq!(basic.body["environment"], "test");
    assert!(basic.body["uptime"].is_number());

    let detailed = get(&app, "/api/health/detailed").await;
    assert_eq!(detailed.status, StatusCode::OK);
    assert_eq!(detailed.body["message"], "OK");
    assert_eq!(detailed.body["checks"]["database"], "connected");

    assert_eq!(get(&app, "/api/health/ready").await.body, json!({"status": "ready"}));
    assert_eq!(get(&app, "/api/health/live").await.body, json!({"status": "alive"}));
}

#[tokio::test]
async fn unknown_routes_use_the_error_envelope() {
    let response = get(&app(), "/api/nope").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["status"], "fail");
    assert_eq!(response.body["message"], "Route not found: GET /api/nope");
}

#[tokio::test]
async fn request_id_is_echoed_or_generated() {
    let app = app();
    let request = Request::builder()
        .uri("/api/health/live")
        .header("x-request-id", "req-abc")
        .body(Body::empty())
        .expect("request");
    let echoed = send(&app, request).await;
    assert_eq!(echoed.headers["x-request-id"], "req-abc");

    let generated = get(&app, "/api/health/live").await;
    assert!(generated.headers.contains_key("x-request-id"));
    assert_eq!(generated.headers["x-content-type-options"], "nosniff");
    assert_eq!(generated.headers["x-frame-options"], "DENY");
}

#[tokio::test]
async fn error_detail_is_hidden_in_production() {
    let development = get(&app(), "/api/tasks/not-a-uuid").await;
    assert!(development.body.get("detail").is_some());

    let production = app_with(AppConfig {
        environment: Environment::Production,
        ..test_config()
    });
    let response = get(&production, "/api/tasks/not-a-uuid").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body.get("detail").is_none());
}

#[tokio::test]
async fn store_failures_are_masked_in_production() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("tasks.db");
    let db = Database::open(&db_path, Duration::from_millis(500)).expect("db");
    let app = app_with_db(
        db,
        AppConfig {
            environment: Environment::Production,
            ..test_config()
        },
    );

    let side_channel = rusqlite::Connection::open(&db_path).expect("second connection");
    side_channel
        .execute_batch("DROP TABLE tasks;")
        .expect("drop table");

    let response = get(&app, "/api/tasks").await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.body,
        json!({"status": "error", "message": "Something went wrong!"})
    );
    assert!(!response.body.to_string().contains("no such table"));
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let app = app_with(AppConfig {
        max_body_bytes: 64,
        ..test_config()
    });
    let body = json!({"title": "x".repeat(200)}).to_string();
    let request = Request::builder()
        .uri("/api/tasks")
        .method("POST")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .expect("request");
    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn preflight_from_frontend_origin_is_allowed() {
    let app = app();
    let request = Request::builder()
        .uri("/api/tasks")
        .method("OPTIONS")
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .expect("request");
    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert_eq!(response.headers["access-control-allow-origin"], "http://localhost:3000");
    assert_eq!(response.headers["access-control-allow-credentials"], "true");

    let request = Request::builder()
        .uri("/api/tasks")
        .method("OPTIONS")
        .header("origin", "https://evil.example")
        .body(Body::empty())
        .expect("request");
    let response = send(&app, request).await;
    assert!(!response.headers.contains_key("access-control-allow-origin"));
}
