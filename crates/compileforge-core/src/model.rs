//! Core data types shared by the lifecycle manager, worker pool,
//! orchestrator, sandbox backends, and job store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque job identifier, unique for the lifetime of the store.
pub type JobId = Uuid;

/// What a client submits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationRequest {
    /// Base64-encoded source text
    pub code: String,
    pub language: String,
    pub compiler: String,
    #[serde(default)]
    pub standard: Option<String>,
    #[serde(default)]
    pub architecture: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub env: Vec<(String, String)>,
    /// Requested per-job timeout in seconds; clamped to 30s by the backend.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Lifecycle status of a `CompilationJob`. Exactly four states; once
/// terminal (`Completed`/`Failed`) a job never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(crate::Error::store(format!("unknown job status: {other}"))),
        }
    }
}

/// A compilation job tracked through its lifecycle. Mutated only by the
/// worker that owns it; persisted on every state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationJob {
    pub id: JobId,
    pub request: CompilationRequest,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Populated when admission is rejected or the backend fails before a
    /// result could be produced.
    pub error_message: Option<String>,
}

impl CompilationJob {
    pub fn new(id: JobId, request: CompilationRequest) -> Self {
        Self {
            id,
            request,
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    pub fn mark_processing(&mut self) {
        self.status = JobStatus::Processing;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(message.into());
    }
}

/// Written exactly once, after sandbox termination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationResult {
    pub job_id: JobId,
    /// The service executed the sandbox without infrastructure error,
    /// irrespective of compile outcome.
    pub success: bool,
    /// The compile process exited 0 and was not killed for timeout.
    pub compiled: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: std::time::Duration,
    pub timed_out: bool,
    pub error_message: Option<String>,
}

/// Built per execution from a validated request; never persisted.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub job_id: JobId,
    pub image_tag: String,
    pub source: String,
    pub source_extension: String,
    pub working_dir: String,
    pub env: Vec<(String, String)>,
    pub timeout: std::time::Duration,
}

/// Transient output of a sandbox execution, consumed by the orchestrator.
#[derive(Debug, Clone)]
pub struct SandboxOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: std::time::Duration,
    pub timed_out: bool,
}

/// Static catalog entry describing one supported compile target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub language: String,
    pub compilers: Vec<String>,
    pub standards: Vec<String>,
    pub os: Vec<String>,
    pub architectures: Vec<String>,
}

/// Derived view of the stats registry, exposed at `/api/v1/workers/stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStats {
    pub max_workers: usize,
    pub active_workers: usize,
    pub available_slots: usize,
    pub queued_jobs: usize,
    pub total_processed: u64,
    pub total_successful: u64,
    pub total_failed: u64,
    pub total_timeout: u64,
    pub total_errors: u64,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_lifecycle() {
        let req = CompilationRequest {
            code: "".into(),
            language: "cpp".into(),
            compiler: "gcc-13".into(),
            standard: Some("c++20".into()),
            architecture: None,
            os: None,
            env: vec![],
            timeout_secs: None,
        };
        let mut job = CompilationJob::new(Uuid::new_v4(), req);
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.started_at.is_none());

        job.mark_processing();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.started_at.is_some());
        assert!(!job.status.is_terminal());

        job.mark_completed();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.status.is_terminal());
        assert!(job.created_at <= job.started_at.unwrap());
        assert!(job.started_at.unwrap() <= job.completed_at.unwrap());
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            let parsed: JobStatus = s.to_string().parse().unwrap();
            assert_eq!(parsed, s);
        }
    }
}
