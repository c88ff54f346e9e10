//! Batch jobs: status model, in-memory job table and the background runner.
//!
//! A job moves strictly `pending → in_progress → completed | failed`.
//! Results are appended one file at a time while the job is in progress, so
//! a poll mid-batch sees the files finished so far in submission order.

use crate::output::TaskResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod runner;
pub mod store;

pub use runner::run_job;
pub use store::JobStore;

/// Lifecycle status of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::InProgress)
                | (JobStatus::InProgress, JobStatus::Completed)
                | (JobStatus::InProgress, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Snapshot of one batch job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    /// Number of files submitted.
    pub total_files: usize,
    /// One result per processed file, in submission order.
    pub results: Vec<TaskResult>,
    /// When the job was accepted.
    pub started_at: DateTime<Utc>,
    /// Set once the job is terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// `ended_at - started_at`, set once the job is terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Set only on a runner-level failure, never for individual file errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    pub(crate) fn new(job_id: String, total_files: usize) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            total_files,
            results: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            error: None,
        }
    }

    /// Files whose result has been appended so far.
    pub fn processed_files(&self) -> usize {
        self.results.len()
    }

    /// Files whose task ended with an error.
    pub fn failed_files(&self) -> usize {
        self.results.iter().filter(|r| r.is_error()).count()
    }
}

/// Immediate answer to a batch submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub job_id: String,
    /// Always [`JobStatus::Pending`] at submission time.
    pub status: JobStatus,
}
