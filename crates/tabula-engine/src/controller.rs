//! Job orchestration: validation, the job loop, progress and reporting.

use crate::error::{Result, ScrapeError};
use crate::iterator::EnrollmentIterator;
use crate::outcome::AttemptOutcome;
use crate::session::SessionPool;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tabula_captcha::CaptchaReader;
use tabula_core::config::ScrapeConfig;
use tabula_core::{Branch, EnrollmentId, JobParams};
use tabula_export::{ExportArtifact, ExportError, ResultSink};
use tokio_util::sync::CancellationToken;

/// Validate raw job parameters before anything is created for the job.
///
/// # Errors
/// Returns [`ScrapeError::InvalidJobParameters`] for an unknown branch, a
/// malformed year, a bad semester, or an inverted/oversized range. No
/// session, sink or browser resource exists yet when this rejects.
pub fn validate_params(
    branch: &str,
    year: &str,
    semester: u8,
    start: u32,
    end: u32,
) -> Result<JobParams> {
    let branch = branch
        .parse::<Branch>()
        .map_err(|e| ScrapeError::InvalidJobParameters(e.to_string()))?;
    JobParams::new(branch, year, semester, start, end)
        .map_err(|e| ScrapeError::InvalidJobParameters(e.to_string()))
}

/// File stem the job's artifacts are written under.
#[must_use]
pub fn artifact_stem(params: &JobParams) -> String {
    format!("{}_sem{}_result", params.branch, params.semester)
}

/// Point-in-time view of a running job, safe to read from other tasks.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobProgress {
    /// Whether the job loop is still running
    pub running: bool,
    /// Identifiers visited so far
    pub processed: u32,
    /// Identifiers the job will visit in total
    pub total: u32,
    /// Result rows written to the sink
    pub rows_written: u32,
    /// Identifiers recorded as unresolved
    pub unresolved: u32,
    /// Most recent attempt-level error, if any
    pub last_error: Option<String>,
}

/// Shared handle for polling progress and requesting cancellation.
///
/// Cancellation is cooperative: the job loop checks at the top of each
/// identifier, so at most one in-flight attempt completes afterwards.
#[derive(Clone)]
pub struct JobMonitor {
    progress: Arc<RwLock<JobProgress>>,
    cancel: CancellationToken,
}

impl JobMonitor {
    /// Clone the current progress snapshot.
    #[must_use]
    pub fn snapshot(&self) -> JobProgress {
        self.progress.read().expect("progress lock poisoned").clone()
    }

    /// Request cooperative cancellation of the job.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Final result of one job.
///
/// When at least one row succeeded the partial artifact is always present,
/// even if the job later failed or was cancelled.
#[derive(Debug)]
pub struct JobReport {
    /// Identifier for correlating logs and status queries
    pub job_id: String,
    /// Export artifact; `None` only when zero rows were written
    pub artifact: Option<ExportArtifact>,
    /// Identifiers that produced no row, in visit order
    pub unresolved: Vec<EnrollmentId>,
    /// Job-level failure, if the loop aborted early
    pub failure: Option<String>,
    /// RFC3339 start timestamp
    pub started_at: String,
    /// RFC3339 completion timestamp
    pub finished_at: String,
}

/// Orchestrates one scrape job.
///
/// Owns the session pool and the sink for the job's lifetime; state is
/// mutated only inside [`run`](Self::run) and published to pollers through
/// cloned [`JobProgress`] snapshots. The caller is responsible for running
/// the job off its own request path (e.g. `tokio::spawn`) and for keeping
/// the [`JobMonitor`] around for polling.
pub struct ScrapeController {
    job_id: String,
    params: JobParams,
    pool: SessionPool,
    sink: ResultSink,
    captcha: Arc<dyn CaptchaReader>,
    config: ScrapeConfig,
    progress: Arc<RwLock<JobProgress>>,
    cancel: CancellationToken,
}

impl ScrapeController {
    /// Assemble a controller from validated parameters and owned resources.
    #[must_use]
    pub fn new(
        params: JobParams,
        pool: SessionPool,
        sink: ResultSink,
        captcha: Arc<dyn CaptchaReader>,
        config: ScrapeConfig,
    ) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            params,
            pool,
            sink,
            captcha,
            config,
            progress: Arc::new(RwLock::new(JobProgress::default())),
            cancel: CancellationToken::new(),
        }
    }

    /// Handle for progress polling and cancellation.
    #[must_use]
    pub fn monitor(&self) -> JobMonitor {
        JobMonitor {
            progress: Arc::clone(&self.progress),
            cancel: self.cancel.clone(),
        }
    }

    /// Job identifier, stable for the controller's lifetime.
    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Run the job to completion.
    ///
    /// Failures are folded into the report rather than returned: whatever
    /// rows were collected before an abort are finalized into the partial
    /// artifact, and the unresolved list is always complete up to the stop
    /// point.
    pub async fn run(mut self) -> JobReport {
        let total = self.params.span();
        let started_at = chrono::Utc::now().to_rfc3339();
        {
            let mut p = self.progress.write().expect("progress lock poisoned");
            p.running = true;
            p.total = total;
        }
        tracing::info!(
            "Job {} started: {} sem {} seq {}..={}",
            self.job_id,
            self.params.branch,
            self.params.semester,
            self.params.start,
            self.params.end
        );

        let mut unresolved: Vec<EnrollmentId> = Vec::new();
        let mut failure: Option<String> = None;
        let mut iterator = EnrollmentIterator::new(
            Arc::clone(&self.captcha),
            self.config.clone(),
            self.params.semester,
            self.cancel.clone(),
        );

        for seq in self.params.start..=self.params.end {
            if self.cancel.is_cancelled() {
                tracing::info!("Job {} cancelled before seq {}", self.job_id, seq);
                break;
            }

            let id = self.params.enrollment_id(seq);
            tracing::info!("Processing {}", id);

            let session = match self.pool.acquire().await {
                Ok(session) => session,
                Err(e) => {
                    tracing::error!("Session acquisition failed: {}", e);
                    failure = Some(e.to_string());
                    break;
                }
            };

            let outcome = match iterator.process_identifier(&id, session).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Job {} aborting: {}", self.job_id, e);
                    failure = Some(e.to_string());
                    break;
                }
            };

            match outcome {
                AttemptOutcome::Success(row) => {
                    let write = self
                        .sink
                        .record_header_if_absent(&row.subjects)
                        .and_then(|()| self.sink.append_row(&row).map(|_| ()));
                    if let Err(e) = write {
                        tracing::error!("Export sink failed: {}", e);
                        failure = Some(e.to_string());
                        break;
                    }
                }
                AttemptOutcome::RecordNotFound => {
                    unresolved.push(id);
                }
                AttemptOutcome::SolveOrSubmitFailure { reason } => {
                    tracing::warn!("Recording {} as unresolved: {}", id, reason);
                    unresolved.push(id);
                    self.progress
                        .write()
                        .expect("progress lock poisoned")
                        .last_error = Some(reason);
                }
            }

            if let Err(e) = self.pool.mark_processed().await {
                tracing::error!("Session rotation failed: {}", e);
                failure = Some(e.to_string());
                break;
            }

            let mut p = self.progress.write().expect("progress lock poisoned");
            p.processed = seq - self.params.start + 1;
            p.rows_written = self.sink.rows_written();
            p.unresolved = u32::try_from(unresolved.len()).unwrap_or(u32::MAX);
        }

        if let Err(e) = self.pool.release().await {
            tracing::warn!("Failed to release session pool: {}", e);
        }

        let artifact = match self.sink.finalize() {
            Ok(artifact) => Some(artifact),
            Err(ExportError::NoDataWritten) => {
                tracing::warn!("Job {} yielded no rows", self.job_id);
                if failure.is_none() {
                    failure = Some(ExportError::NoDataWritten.to_string());
                }
                None
            }
            Err(e) => {
                tracing::error!("Artifact finalize failed: {}", e);
                if failure.is_none() {
                    failure = Some(e.to_string());
                }
                None
            }
        };

        {
            let mut p = self.progress.write().expect("progress lock poisoned");
            p.running = false;
            if let Some(f) = &failure {
                p.last_error = Some(f.clone());
            }
        }

        let finished_at = chrono::Utc::now().to_rfc3339();
        tracing::info!(
            "Job {} finished: {} rows, {} unresolved{}",
            self.job_id,
            artifact.as_ref().map_or(0, |a| a.rows_written),
            unresolved.len(),
            failure.as_deref().map_or_else(String::new, |f| format!(", failure: {f}"))
        );

        JobReport {
            job_id: self.job_id,
            artifact,
            unresolved,
            failure,
            started_at,
            finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_params_accepts_known_branch() {
        let params = validate_params("cs", "21", 3, 1, 40).expect("valid params");
        assert_eq!(params.branch, Branch::Cs);
        assert_eq!(params.span(), 40);
    }

    #[test]
    fn test_validate_params_rejects_unknown_branch() {
        let err = validate_params("CE", "21", 3, 1, 40).expect_err("should reject");
        assert!(matches!(err, ScrapeError::InvalidJobParameters(_)));
    }

    #[test]
    fn test_validate_params_rejects_oversized_range() {
        let err = validate_params("CS", "21", 3, 1, 200).expect_err("should reject");
        assert!(matches!(err, ScrapeError::InvalidJobParameters(_)));
    }

    #[test]
    fn test_artifact_stem() {
        let params = validate_params("CS", "21", 3, 1, 10).expect("valid params");
        assert_eq!(artifact_stem(&params), "CS_sem3_result");
    }
}
