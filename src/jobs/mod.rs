//! Download-job orchestration
//!
//! ## Key Components
//!
//! - [`JobOrchestrator`] - single entry point, runs one job end to end
//! - [`AdmissionGate`] - global cooldown between job starts
//! - [`WorkspaceManager`] - staging root and isolated per-job directories
//! - [`Extractor`] - external download capability, [`YtDlpExtractor`] in production
//! - [`resolver`] - finds the artifact the extractor actually wrote
//!
//! ## Example
//!
//! ```rust,ignore
//! use mediagrab::jobs::{JobRequest, TargetFormat};
//!
//! let request = JobRequest::new("https://example.com/watch?v=abc", Some(TargetFormat::AudioOnly));
//! let result = orchestrator.run_job(request).await?;
//! println!("{} -> {}", result.suggested_filename, result.file_path.display());
//! ```

mod admission;
mod extractor;
mod orchestrator;
pub mod resolver;
mod types;
mod workspace;

pub use admission::{Admission, AdmissionGate};
pub use extractor::{
    ExtractionOptions, ExtractionOutcome, Extractor, FailureKind, YtDlpExtractor, classify_failure,
};
pub use orchestrator::JobOrchestrator;
pub use resolver::sanitize_title;
pub use types::{JobError, JobRequest, JobResult, TargetFormat, UnknownFormat};
pub use workspace::{ArtifactLease, JobWorkspace, WorkspaceManager, release};
