use crate::config::ApiToken;
use crate::errors::{AppError, AppResult, NormalizedError};
use crate::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_LENGTH, ORIGIN};
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_REQUEST_ID_LEN: usize = 128;
const ALLOWED_METHODS: &str = "GET,POST,PUT,DELETE,OPTIONS";
const ALLOWED_HEADERS: &str = "authorization,content-type";

/// Wraps each request in an `http.request` span, echoes the request id and
/// logs normalized failures attached by the error renderer.
pub(crate) async fn request_tracing(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = tracing::info_span!(
        "http.request",
        request_id = %request_id,
        method = %method,
        route = %path,
    );

    async move {
        let started = Instant::now();
        let mut response = next.run(request).await;

        if let Some(normalized) = response.extensions().get::<NormalizedError>().cloned() {
            report_failure(&normalized, &method, &path);
            if state.config.environment.exposes_error_detail() {
                attach_detail(&mut response, &normalized);
            }
        }

        tracing::info!(
            status = response.status().as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
    .instrument(span)
    .await
}

fn report_failure(normalized: &NormalizedError, method: &Method, path: &str) {
    if normalized.operational {
        tracing::warn!(
            status = normalized.status.as_u16(),
            method = %method,
            path = %path,
            message = %normalized.message,
            "request failed"
        );
    } else {
        tracing::error!(
            status = normalized.status.as_u16(),
            method = %method,
            path = %path,
            detail = %normalized.detail,
            "unexpected failure"
        );
    }
}

fn attach_detail(response: &mut Response, normalized: &NormalizedError) {
    let Ok(bytes) = serde_json::to_vec(&normalized.envelope(true)) else {
        return;
    };
    response.headers_mut().remove(CONTENT_LENGTH);
    *response.body_mut() = Body::from(bytes);
}

pub(crate) async fn security_headers(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    response
}

pub(crate) async fn cors(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let allowed_origin = request
        .headers()
        .get(ORIGIN)
        .and_then(|value| value.to_str().ok())
        .filter(|origin| origin.trim_end_matches('/') == state.config.frontend_url)
        .and_then(|origin| HeaderValue::from_str(origin).ok());

    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        if let Some(origin) = allowed_origin {
            let headers = response.headers_mut();
            headers.insert("access-control-allow-origin", origin);
            headers.insert(
                "access-control-allow-methods",
                HeaderValue::from_static(ALLOWED_METHODS),
            );
            headers.insert(
                "access-control-allow-headers",
                HeaderValue::from_static(ALLOWED_HEADERS),
            );
            headers.insert(
                "access-control-allow-credentials",
                HeaderValue::from_static("true"),
            );
            headers.insert("vary", HeaderValue::from_static("Origin"));
        }
        return response;
    }

    let mut response = next.run(request).await;
    if let Some(origin) = allowed_origin {
        let headers = response.headers_mut();
        headers.insert("access-control-allow-origin", origin);
        headers.insert(
            "access-control-allow-credentials",
            HeaderValue::from_static("true"),
        );
        headers.insert("vary", HeaderValue::from_static("Origin"));
    }
    response
}

/// No-op unless `API_TOKEN` is configured.
pub(crate) async fn require_api_token(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(token) = &state.config.api_token {
        check_bearer(request.headers(), token, Utc::now())?;
    }
    Ok(next.run(request).await)
}

fn check_bearer(headers: &HeaderMap, token: &ApiToken, now: DateTime<Utc>) -> AppResult<()> {
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    if presented != Some(token.secret.as_str()) {
        return Err(AppError::InvalidToken);
    }
    if token.expires_at.is_some_and(|expires_at| now >= expires_at) {
        return Err(AppError::TokenExpired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn bearer(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).expect("header"));
        headers
    }

    #[test]
    fn bearer_must_match_secret() {
        let token = ApiToken {
            secret: "s3cret".to_string(),
            expires_at: None,
        };
        let now = Utc::now();
        assert!(check_bearer(&bearer("Bearer s3cret"), &token, now).is_ok());
        assert!(matches!(
            check_bearer(&bearer("Bearer nope"), &token, now),
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(
            check_bearer(&bearer("s3cret"), &token, now),
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(
            check_bearer(&HeaderMap::new(), &token, now),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn matching_token_past_expiry_is_expired() {
        let now = Utc::now();
        let token = ApiToken {
            secret: "s3cret".to_string(),
            expires_at: Some(now - Duration::minutes(1)),
        };
        assert!(matches!(
            check_bearer(&bearer("Bearer s3cret"), &token, now),
            Err(AppError::TokenExpired)
        ));
        assert!(matches!(
            check_bearer(&bearer("Bearer wrong"), &token, now),
            Err(AppError::InvalidToken)
        ));
    }
}
