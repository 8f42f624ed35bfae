use crate::errors::{AppError, AppResult, FieldViolation};
use crate::models::Task;
use crate::validation::{parse_task_id, validate_create, validate_list_query, validate_update};
use crate::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;

pub(crate) async fn list_tasks(
    State(state): State<AppState>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let Query(params) = query.map_err(|rejection| {
        AppError::Validation(vec![FieldViolation::new("query", rejection.body_text())])
    })?;
    let query = validate_list_query(&params)?;
    let page = state.tasks.list(query).await?;

    let now = Utc::now();
    let data: Vec<_> = page.items.iter().map(|task| task.view_at(now)).collect();
    Ok(Json(json!({
        "success": true,
        "count": data.len(),
        "total": page.total,
        "page": page.page,
        "pages": page.page_count,
        "data": data,
    })))
}

pub(crate) async fn get_task(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = parse_task_id(&raw_id)?;
    let task = state.tasks.get(id).await?;
    Ok(task_envelope(&task))
}

pub(crate) async fn create_task(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let body = read_body(payload)?;
    let input = validate_create(&body)?;
    let task = state.tasks.create(input).await?;
    Ok((StatusCode::CREATED, task_envelope(&task)))
}

pub(crate) async fn update_task(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let id = parse_task_id(&raw_id)?;
    let body = read_body(payload)?;
    let patch = validate_update(&body)?;
    let task = state.tasks.update(id, patch).await?;
    Ok(task_envelope(&task))
}

pub(crate) async fn delete_task(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = parse_task_id(&raw_id)?;
    state.tasks.delete(id).await?;
    Ok(Json(json!({ "success": true, "data": {} })))
}

pub(crate) async fn task_stats(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let stats = state.tasks.stats().await?;
    Ok(Json(json!({ "success": true, "data": stats })))
}

fn task_envelope(task: &Task) -> Json<Value> {
    Json(json!({ "success": true, "data": task.view() }))
}

fn read_body(payload: Result<Json<Value>, JsonRejection>) -> AppResult<Value> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(AppError::PayloadTooLarge)
        }
        Err(rejection) => Err(AppError::MalformedBody(rejection.body_text())),
    }
}
