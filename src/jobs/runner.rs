//! Background execution of one batch job.

use super::{JobStatus, JobStore};
use crate::descriptor::FileDescriptor;
use crate::error::OcrError;
use crate::progress::JobProgressCallback;
use crate::task::{panic_message, TaskProcessor};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::{error, info};

/// Process `files` sequentially under `job_id` and drive the job to a
/// terminal status.
///
/// Each file's result is appended as soon as it is ready. A per-file failure
/// never stops the batch; only a failure of the runner itself (including a
/// panic) marks the job FAILED, keeping whatever results were appended.
pub async fn run_job(
    job_id: String,
    files: Vec<FileDescriptor>,
    processor: &TaskProcessor,
    store: &JobStore,
    progress: Option<&dyn JobProgressCallback>,
) -> JobStatus {
    let outcome = AssertUnwindSafe(run_files(&job_id, &files, processor, store, progress))
        .catch_unwind()
        .await;

    let finished = match outcome {
        Ok(Ok(())) => store.complete(&job_id),
        Ok(Err(e)) => {
            error!("Job {} failed: {}", job_id, e);
            store.fail(&job_id, format!("Job processing failed: {e}"))
        }
        Err(panic) => {
            let msg = panic_message(panic.as_ref());
            error!("Job {} panicked: {}", job_id, msg);
            store.fail(&job_id, format!("Job processing failed: {msg}"))
        }
    };

    match finished {
        Ok(job) => {
            info!(
                "Job {} {}: {}/{} files, {} failed, {}ms",
                job.job_id,
                job.status,
                job.processed_files(),
                job.total_files,
                job.failed_files(),
                job.duration_ms.unwrap_or(0)
            );
            if let Some(cb) = progress {
                cb.on_job_complete(&job_id, job.status);
            }
            job.status
        }
        Err(e) => {
            error!("Job {} could not be finalised: {}", job_id, e);
            JobStatus::Failed
        }
    }
}

async fn run_files(
    job_id: &str,
    files: &[FileDescriptor],
    processor: &TaskProcessor,
    store: &JobStore,
    progress: Option<&dyn JobProgressCallback>,
) -> Result<(), OcrError> {
    let total = files.len();
    store.mark_in_progress(job_id)?;
    info!("Job {} started: {} files", job_id, total);
    if let Some(cb) = progress {
        cb.on_job_start(job_id, total);
    }

    for (index, descriptor) in files.iter().enumerate() {
        if let Some(cb) = progress {
            cb.on_file_start(job_id, index, total);
        }

        let result = processor.process(descriptor).await;
        match progress {
            Some(cb) => {
                store.append_result(job_id, result.clone())?;
                cb.on_file_complete(job_id, index, total, &result);
            }
            None => {
                store.append_result(job_id, result)?;
            }
        }
    }
    Ok(())
}
