//! Wire types for the HTTP surface.
//!
//! `POST /download` accepts:
//!
//! ```json
//! { "url": "https://www.youtube.com/watch?v=abc", "format": "mp3" }
//! ```
//!
//! Both fields are optional at the deserialization level so that a missing
//! field produces the same `400 {"error": "URL and format are required"}`
//! as an empty one.

use serde::{Deserialize, Serialize};

use crate::observability::MetricsSnapshot;

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct DownloadPayload {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub jobs: MetricsSnapshot,
}
