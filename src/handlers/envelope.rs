//! Every failed request leaves as status 400 with
//! `{"message": "Failed to execute: <METHOD>: <URL>. Detail: <cause>"}`.

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::{AppError, FailureDetail};
use crate::response::Pretty;

/// Largest error body read back when a layer or extractor failed without a
/// [`FailureDetail`].
const MAX_DETAIL_BYTES: usize = 16 * 1024;

pub async fn failure_envelope(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost")
        .to_string();
    let url = format!("http://{}{}", host, request.uri());

    let response = next.run(request).await;
    let status = response.status();
    if status.is_success() {
        return response;
    }

    let detail = response.extensions().get::<FailureDetail>().map(|d| d.0.clone());
    let detail = match detail {
        Some(detail) => detail,
        None => body_text(status, response.into_body()).await,
    };
    tracing::warn!(%method, %url, %status, %detail, "request failed");

    let message = format!("Failed to execute: {}: {}. Detail: {}", method, url, detail);
    (StatusCode::BAD_REQUEST, Pretty(json!({ "message": message }))).into_response()
}

async fn body_text(status: StatusCode, body: Body) -> String {
    let text = to_bytes(body, MAX_DETAIL_BYTES)
        .await
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
        .unwrap_or_default();
    if text.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        text
    }
}

/// Unmatched paths.
pub async fn fallback(uri: Uri) -> AppError {
    AppError::NotFound {
        kind: "route".into(),
        id: uri.path().to_string(),
    }
}
