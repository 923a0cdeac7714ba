//! Global cooldown between job starts

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Result of an admission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected { wait_seconds: u64 },
}

/// Enforces a minimum interval between admitted jobs.
///
/// One instance is created at startup and shared through application state.
/// The check and the update of `last_job_started_at` happen under a single
/// lock, so concurrent callers can never both be admitted inside one window.
#[derive(Debug)]
pub struct AdmissionGate {
    cooldown: Duration,
    last_job_started_at: Mutex<Option<Instant>>,
}

impl AdmissionGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_job_started_at: Mutex::new(None),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub async fn try_admit(&self) -> Admission {
        self.try_admit_at(Instant::now()).await
    }

    pub async fn try_admit_at(&self, now: Instant) -> Admission {
        let mut last = self.last_job_started_at.lock().await;

        if let Some(started) = *last {
            let elapsed = now.saturating_duration_since(started);
            if elapsed < self.cooldown {
                let wait_seconds = ceil_secs(self.cooldown - elapsed);
                debug!(wait_seconds, "Admission rejected, cooldown active");
                return Admission::Rejected { wait_seconds };
            }
        }

        *last = Some(now);
        Admission::Admitted
    }
}

/// Whole seconds, rounded up; never zero for a non-zero remainder
fn ceil_secs(remaining: Duration) -> u64 {
    let secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 { secs + 1 } else { secs }
}
