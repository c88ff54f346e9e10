//! In-memory job table shared between the submitter and background runners.

use super::{Job, JobStatus};
use crate::error::OcrError;
use crate::output::TaskResult;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// Thread-safe map of job id → [`Job`].
///
/// Cloning is cheap and every clone sees the same table. Readers always get
/// an owned snapshot, never a view that changes underneath them. Only the
/// job runner mutates existing entries.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Job>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Job table lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Job>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Job table lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Register a new PENDING job with a fresh unique id.
    pub(crate) fn create(&self, total_files: usize) -> Job {
        let mut jobs = self.write();
        let job_id = loop {
            let id = uuid::Uuid::new_v4().to_string();
            if !jobs.contains_key(&id) {
                break id;
            }
        };
        let job = Job::new(job_id.clone(), total_files);
        jobs.insert(job_id.clone(), job.clone());
        debug!("Created job {} with {} files", job_id, total_files);
        job
    }

    /// Snapshot of a job.
    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.read().get(job_id).cloned()
    }

    /// Snapshot of a job, or [`OcrError::JobNotFound`].
    pub fn status(&self, job_id: &str) -> Result<Job, OcrError> {
        self.get(job_id).ok_or_else(|| OcrError::JobNotFound {
            job_id: job_id.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Ids of every known job, sorted.
    pub fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn update<T>(
        &self,
        job_id: &str,
        f: impl FnOnce(&mut Job) -> Result<T, OcrError>,
    ) -> Result<T, OcrError> {
        let mut jobs = self.write();
        let job = jobs.get_mut(job_id).ok_or_else(|| OcrError::JobNotFound {
            job_id: job_id.to_string(),
        })?;
        f(job)
    }

    fn transition(job: &mut Job, next: JobStatus) -> Result<(), OcrError> {
        if !job.status.can_transition_to(next) {
            return Err(OcrError::InvalidTransition {
                job_id: job.job_id.clone(),
                from: job.status.to_string(),
                to: next.to_string(),
            });
        }
        job.status = next;
        Ok(())
    }

    pub(crate) fn mark_in_progress(&self, job_id: &str) -> Result<(), OcrError> {
        self.update(job_id, |job| Self::transition(job, JobStatus::InProgress))
    }

    /// Append one file's result; returns the number of results so far.
    pub(crate) fn append_result(&self, job_id: &str, result: TaskResult) -> Result<usize, OcrError> {
        self.update(job_id, |job| {
            if job.status != JobStatus::InProgress {
                return Err(OcrError::InvalidTransition {
                    job_id: job.job_id.clone(),
                    from: job.status.to_string(),
                    to: "append".to_string(),
                });
            }
            job.results.push(result);
            Ok(job.results.len())
        })
    }

    pub(crate) fn complete(&self, job_id: &str) -> Result<Job, OcrError> {
        self.finish(job_id, JobStatus::Completed, None)
    }

    pub(crate) fn fail(&self, job_id: &str, error: impl Into<String>) -> Result<Job, OcrError> {
        self.finish(job_id, JobStatus::Failed, Some(error.into()))
    }

    fn finish(&self, job_id: &str, status: JobStatus, error: Option<String>) -> Result<Job, OcrError> {
        self.update(job_id, |job| {
            Self::transition(job, status)?;
            let ended = Utc::now();
            job.duration_ms = Some((ended - job.started_at).num_milliseconds().max(0) as u64);
            job.ended_at = Some(ended);
            job.error = error;
            Ok(job.clone())
        })
    }
}
