use axum::{
    Json,
    body::{Body, Bytes},
    extract::State,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::info;

use super::{
    error::ApiError,
    models::{DownloadPayload, HealthResponse},
    state::AppState,
    utils::{content_disposition, ensure_json_content_type},
};
use crate::jobs::{JobRequest, TargetFormat};

/// Download endpoint (POST /download)
///
/// Runs one job to completion and streams the artifact back as an
/// attachment. The job directory is released once the body is dropped,
/// which makes every artifact servable exactly once.
///
/// ## Flow:
/// 1. Check Content-Type and parse `{url, format}`
/// 2. Hand the request to the orchestrator (validation, cooldown, extraction)
/// 3. Open the resolved file and stream it with download headers
pub async fn download(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    ensure_json_content_type(content_type)?;

    let payload: DownloadPayload = if body.is_empty() {
        DownloadPayload::default()
    } else {
        serde_json::from_slice(&body)?
    };

    let target_format = match payload.format.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<TargetFormat>()
                .map_err(|e| ApiError::InvalidPayload(e.to_string()))?,
        ),
    };
    let request = JobRequest::new(payload.url.unwrap_or_default(), target_format);

    let result = state.orchestrator.run_job(request).await?;
    let lease = result.lease;

    let file = tokio::fs::File::open(&result.file_path)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to open artifact: {e}")))?;

    // The lease rides along with the stream and is dropped with the body
    let stream = ReaderStream::new(file).map(move |chunk| {
        let _lease = &lease;
        chunk
    });

    let mut response_headers = HeaderMap::new();
    response_headers.insert(CONTENT_TYPE, HeaderValue::from_static(result.media_type));
    response_headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&content_disposition(&result.suggested_filename))
            .map_err(|e| ApiError::Internal(format!("invalid Content-Disposition: {e}")))?,
    );
    if let Some(size) = result.size_bytes {
        response_headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
    }

    info!(
        job_id = %result.job_id,
        filename = %result.suggested_filename,
        "Streaming artifact"
    );

    Ok((StatusCode::OK, response_headers, Body::from_stream(stream)).into_response())
}

/// Health check endpoint (GET /health)
///
/// Always 200 while the process serves requests; includes job counters.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        jobs: state.metrics.snapshot(),
    };

    (StatusCode::OK, Json(response))
}
