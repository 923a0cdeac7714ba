use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::workspace::ArtifactLease;

/// Output format requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum TargetFormat {
    /// Standalone audio container (`mp3`)
    #[serde(rename = "mp3")]
    AudioOnly,
    /// Pre-muxed audio+video container (`mp4`)
    #[serde(rename = "mp4")]
    VideoContainer,
}

impl TargetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::AudioOnly => "mp3",
            TargetFormat::VideoContainer => "mp4",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            TargetFormat::AudioOnly => "audio/mp3",
            TargetFormat::VideoContainer => "video/mp4",
        }
    }

    /// Human label used in user-facing messages ("audio", "video")
    pub fn stream_label(&self) -> &'static str {
        match self {
            TargetFormat::AudioOnly => "audio",
            TargetFormat::VideoContainer => "video",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Error)]
#[error("unsupported format '{0}', expected 'mp3' or 'mp4'")]
pub struct UnknownFormat(pub String);

impl FromStr for TargetFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(TargetFormat::AudioOnly),
            "mp4" => Ok(TargetFormat::VideoContainer),
            other => Err(UnknownFormat(other.to_string())),
        }
    }
}

/// A single download job as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub source_url: String,
    pub target_format: Option<TargetFormat>,
}

impl JobRequest {
    pub fn new(source_url: impl Into<String>, target_format: Option<TargetFormat>) -> Self {
        Self {
            source_url: source_url.into(),
            target_format,
        }
    }
}

/// A produced artifact, ready to be streamed once.
///
/// `lease` owns `job_dir`: the directory is removed when the lease is dropped,
/// so whoever consumes the result decides how long the file lives.
#[derive(Debug)]
pub struct JobResult {
    pub job_id: Uuid,
    pub file_path: PathBuf,
    pub suggested_filename: String,
    pub media_type: &'static str,
    pub size_bytes: Option<u64>,
    pub job_dir: PathBuf,
    pub lease: ArtifactLease,
}

/// Classified job failures. Display strings are safe to show to callers.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Please wait {wait_seconds} seconds before downloading again")]
    TooManyRequests { wait_seconds: u64 },
    #[error("Too many requests. Please try again in a few minutes")]
    UpstreamThrottled,
    #[error("This video is unavailable")]
    VideoUnavailable,
    #[error("No {0} stream available")]
    NoSuitableStream(&'static str),
    #[error("The downloaded file could not be found")]
    ArtifactMissing,
    #[error("Error downloading the requested media")]
    ExtractionUnknown(String),
    #[error("Internal server error")]
    Internal(String),
}

impl JobError {
    pub fn missing_fields() -> Self {
        JobError::InvalidRequest("URL and format are required".to_string())
    }

    /// Stable identifier used in logs
    pub fn code(&self) -> &'static str {
        match self {
            JobError::InvalidRequest(_) => "invalid_request",
            JobError::TooManyRequests { .. } => "cooldown_active",
            JobError::UpstreamThrottled => "upstream_throttled",
            JobError::VideoUnavailable => "video_unavailable",
            JobError::NoSuitableStream(_) => "no_suitable_stream",
            JobError::ArtifactMissing => "artifact_missing",
            JobError::ExtractionUnknown(_) => "extraction_unknown",
            JobError::Internal(_) => "internal_error",
        }
    }
}

impl From<std::io::Error> for JobError {
    fn from(value: std::io::Error) -> Self {
        JobError::Internal(value.to_string())
    }
}
