//! Staging directory ownership
//!
//! Every job writes into its own `<staging>/<job_id>` directory. Directories
//! are released once the artifact has been streamed (or the job failed), and a
//! periodic sweep removes anything left behind by crashed jobs.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the staging root if it does not exist yet
    pub async fn ensure_root(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        info!(path = %self.root.display(), "Staging directory ready");
        Ok(())
    }

    pub fn staging_dir(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, empty directory for `job_id`
    pub async fn prepare(&self, job_id: Uuid) -> std::io::Result<JobWorkspace> {
        let dir = self.root.join(job_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;

        let workspace = JobWorkspace { dir };
        workspace.reset().await;
        Ok(workspace)
    }

    /// Remove job directories whose last modification is older than `older_than`.
    ///
    /// Returns the number of entries removed.
    pub async fn sweep_stale(&self, older_than: Duration) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(error) => {
                if error.kind() != ErrorKind::NotFound {
                    warn!(path = %self.root.display(), %error, "Failed to open staging directory for sweep");
                }
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(error) => {
                    warn!(%error, "Failed to iterate staging directory");
                    break;
                }
            };

            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(error) => {
                    warn!(path = %path.display(), %error, "Failed to read metadata");
                    continue;
                }
            };

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < older_than {
                continue;
            }

            let result = if metadata.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };

            match result {
                Ok(()) => removed += 1,
                Err(error) if error.kind() == ErrorKind::NotFound => {}
                Err(error) => warn!(path = %path.display(), %error, "Failed to remove stale entry"),
            }
        }

        if removed > 0 {
            info!(removed, "Swept stale job directories");
        }
        removed
    }
}

/// Directory owned by a single job
#[derive(Debug, Clone)]
pub struct JobWorkspace {
    dir: PathBuf,
}

impl JobWorkspace {
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Best-effort removal of everything inside the job directory.
    ///
    /// A single entry that cannot be removed is logged and skipped.
    pub async fn reset(&self) {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(error) => {
                warn!(path = %self.dir.display(), %error, "Failed to open job directory for reset");
                return;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(error) => {
                    warn!(path = %self.dir.display(), %error, "Failed to iterate job directory");
                    break;
                }
            };

            let path = entry.path();
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            let result = if is_dir {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };

            if let Err(error) = result
                && error.kind() != ErrorKind::NotFound
            {
                warn!(path = %path.display(), %error, "Failed to delete leftover file");
            }
        }
    }

}

/// Remove a job directory; a directory that is already gone is fine
pub async fn release(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!(path = %dir.display(), "Released job directory"),
        Err(error) if error.kind() == ErrorKind::NotFound => {}
        Err(error) => warn!(path = %dir.display(), %error, "Failed to release job directory"),
    }
}

/// Releases a job directory when dropped.
///
/// Held by the response body so the directory lives exactly as long as the
/// artifact is being streamed.
#[derive(Debug)]
pub struct ArtifactLease {
    dir: Option<PathBuf>,
}

impl ArtifactLease {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir: Some(dir) }
    }

    pub fn path(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Remove the directory now instead of on drop
    pub async fn release(mut self) {
        if let Some(dir) = self.dir.take() {
            release(&dir).await;
        }
    }
}

impl Drop for ArtifactLease {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { release(&dir).await });
            }
            Err(_) => {
                if let Err(error) = std::fs::remove_dir_all(&dir)
                    && error.kind() != ErrorKind::NotFound
                {
                    warn!(path = %dir.display(), %error, "Failed to release job directory");
                }
            }
        }
    }
}
