use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::IntoResponse,
};
use thiserror::Error;
use tracing::error;

use super::models::ErrorResponse;
use crate::jobs::JobError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Job(#[from] JobError),
    #[error("{0}")]
    InvalidPayload(String),
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Job(err) => match err {
                JobError::InvalidRequest(_)
                | JobError::VideoUnavailable
                | JobError::NoSuitableStream(_) => StatusCode::BAD_REQUEST,
                JobError::TooManyRequests { .. } | JobError::UpstreamThrottled => {
                    StatusCode::TOO_MANY_REQUESTS
                }
                JobError::ArtifactMissing
                | JobError::ExtractionUnknown(_)
                | JobError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            ApiError::Job(JobError::TooManyRequests { wait_seconds }) => Some(*wait_seconds),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if let ApiError::Internal(detail) = &self {
            error!(%detail, "Request failed with internal error");
        }

        let status = self.status_code();
        let retry_after = self.retry_after();
        let body = ErrorResponse {
            error: self.to_string(),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::InvalidPayload(format!("Invalid JSON body: {value}"))
    }
}
