use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Instrument, error, info, info_span, warn};
use url::Url;
use uuid::Uuid;

use super::admission::{Admission, AdmissionGate};
use super::extractor::{ExtractionOutcome, Extractor, FailureKind};
use super::resolver::{resolve, sanitize_title};
use super::types::{JobError, JobRequest, JobResult, TargetFormat};
use super::workspace::{ArtifactLease, WorkspaceManager};
use crate::observability::Metrics;

/// Single entry point for download jobs.
///
/// ## Flow:
/// 1. Validate the request (url present and http/https, format set)
/// 2. Admission check against the global cooldown; rejection has no side effects
/// 3. Prepare an isolated, empty job directory
/// 4. Run the extractor; classified failures end the job
/// 5. Resolve the produced artifact on disk
/// 6. Build the result with a sanitized suggested filename
///
/// Nothing is retried. A failed job releases its directory before returning;
/// a job whose future is dropped mid-flight releases it on drop and counts as failed.
pub struct JobOrchestrator {
    gate: Arc<AdmissionGate>,
    workspace: WorkspaceManager,
    extractor: Arc<dyn Extractor>,
    metrics: Arc<Metrics>,
}

impl JobOrchestrator {
    pub fn new(
        gate: Arc<AdmissionGate>,
        workspace: WorkspaceManager,
        extractor: Arc<dyn Extractor>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            gate,
            workspace,
            extractor,
            metrics,
        }
    }

    pub fn workspace(&self) -> &WorkspaceManager {
        &self.workspace
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub async fn run_job(&self, request: JobRequest) -> Result<JobResult, JobError> {
        let (url, format) = validate_request(&request)?;

        if let Admission::Rejected { wait_seconds } = self.gate.try_admit().await {
            self.metrics.job_rejected();
            return Err(JobError::TooManyRequests { wait_seconds });
        }
        self.metrics.job_admitted();

        let job_id = Uuid::now_v7();
        let span = info_span!("job", %job_id, %format, extractor = self.extractor.name());

        let outcome = JobOutcome::new(&self.metrics, job_id);
        let result = self.execute(job_id, url, format).instrument(span).await;
        outcome.settle(result.is_ok());
        result
    }

    async fn execute(&self, job_id: Uuid, url: &str, format: TargetFormat) -> Result<JobResult, JobError> {
        info!(url, "Job admitted");

        let workspace = self.workspace.prepare(job_id).await.map_err(|e| {
            error!(error = %e, "Failed to prepare job directory");
            JobError::Internal(format!("failed to prepare job directory: {e}"))
        })?;
        // Owns the directory from here on, also if this future is dropped
        let lease = ArtifactLease::new(workspace.path().to_path_buf());

        let (title, file_path) = match self.extract_and_resolve(url, format, workspace.path()).await {
            Ok(found) => found,
            Err(err) => {
                lease.release().await;
                return Err(err);
            }
        };

        let size_bytes = tokio::fs::metadata(&file_path).await.ok().map(|m| m.len());
        info!(file = %file_path.display(), ?size_bytes, "Job completed");

        Ok(JobResult {
            job_id,
            suggested_filename: format!("{}.{}", sanitize_title(&title), format.extension()),
            media_type: format.media_type(),
            size_bytes,
            job_dir: workspace.path().to_path_buf(),
            file_path,
            lease,
        })
    }

    /// Title and resolved artifact path for a finished extraction
    async fn extract_and_resolve(
        &self,
        url: &str,
        format: TargetFormat,
        work_dir: &Path,
    ) -> Result<(String, PathBuf), JobError> {
        let (title, produced_path) = match self.extractor.extract(url, format, work_dir).await {
            ExtractionOutcome::Success {
                title,
                produced_path,
                produced_ext,
            } => {
                info!(%title, produced = %produced_path.display(), %produced_ext, "Extraction finished");
                (title, produced_path)
            }
            ExtractionOutcome::Failure { kind, message } => {
                let err = map_failure(kind, message, format);
                warn!(code = err.code(), diagnostic = ?err, "Extraction failed");
                return Err(err);
            }
        };

        let file_path = resolve(work_dir, Some(&produced_path), &title, format)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to scan job directory");
                JobError::Internal(format!("failed to scan job directory: {e}"))
            })?
            .ok_or_else(|| {
                warn!(%title, "Extraction reported success but no artifact was found");
                JobError::ArtifactMissing
            })?;

        Ok((title, file_path))
    }
}

/// Settles the job counters exactly once.
///
/// Dropped unsettled when the caller abandons the job mid-flight, which
/// counts as a failure.
struct JobOutcome<'a> {
    metrics: &'a Metrics,
    job_id: Uuid,
    settled: bool,
}

impl<'a> JobOutcome<'a> {
    fn new(metrics: &'a Metrics, job_id: Uuid) -> Self {
        Self {
            metrics,
            job_id,
            settled: false,
        }
    }

    fn settle(mut self, succeeded: bool) {
        self.settled = true;
        if succeeded {
            self.metrics.job_completed();
        } else {
            self.metrics.job_failed();
        }
    }
}

impl Drop for JobOutcome<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(job_id = %self.job_id, "Job abandoned before completion");
            self.metrics.job_failed();
        }
    }
}

fn validate_request(request: &JobRequest) -> Result<(&str, TargetFormat), JobError> {
    let url = request.source_url.trim();
    let format = match (url.is_empty(), request.target_format) {
        (false, Some(format)) => format,
        _ => return Err(JobError::missing_fields()),
    };

    let parsed = Url::parse(url).map_err(|_| JobError::InvalidRequest("Invalid URL".to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(JobError::InvalidRequest(
            "URL must be an http or https link".to_string(),
        ));
    }

    Ok((url, format))
}

fn map_failure(kind: FailureKind, message: String, format: TargetFormat) -> JobError {
    match kind {
        FailureKind::UpstreamThrottled => JobError::UpstreamThrottled,
        FailureKind::VideoUnavailable => JobError::VideoUnavailable,
        FailureKind::NoSuitableStream => JobError::NoSuitableStream(format.stream_label()),
        FailureKind::Unknown => JobError::ExtractionUnknown(message),
    }
}
