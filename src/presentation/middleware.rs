//! HTTP middleware for the web server

use axum::{
    http::{HeaderValue, Request, header},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use std::time::Instant;
use uuid::Uuid;

use crate::application::errors::ApplicationError;
use crate::presentation::models::{ErrorBody, ErrorResponse};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Error envelope with the wire error code and an optional retry hint
impl IntoResponse for ApplicationError {
    fn into_response(self) -> Response {
        let code = self.code();
        let status = code.status();

        if status.is_server_error() {
            tracing::error!(error = %self, code = code.as_str(), "Request failed");
        } else {
            tracing::debug!(error = %self, code = code.as_str(), "Request rejected");
        }

        let retry_after = self.retry_after_secs();
        let body = ErrorResponse {
            success: false,
            error: ErrorBody {
                code,
                message: self.public_message(),
                retry_after,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Request logging middleware with timing and request ID
pub async fn logging_middleware(request: Request<axum::body::Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let start_time = Instant::now();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        "Processing request"
    );

    let mut response = next.run(request).await;
    let duration = start_time.elapsed();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = duration.as_millis() as u64,
        "Request completed"
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
