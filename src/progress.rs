//! Progress-callback trait for batch job events.
//!
//! Inject an [`Arc<dyn JobProgressCallback>`] via
//! [`crate::config::OcrConfigBuilder::progress_callback`] to receive events
//! as a background worker moves through a batch.
//!
//! Callers can forward events to a channel, a WebSocket, or a terminal
//! progress bar without the library knowing how the host application
//! communicates. The trait is `Send + Sync` because workers run on
//! `tokio::spawn`ed tasks and several batches may be active at once.
//!
//! # Example
//!
//! ```rust
//! use ocr_batch::{JobProgressCallback, OcrConfig, TaskResult};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl JobProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, _job_id: &str, index: usize, total: usize, result: &TaskResult) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {}", index + 1, total, result.filename);
//!     }
//! }
//!
//! let config = OcrConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::jobs::JobStatus;
use crate::output::TaskResult;
use std::sync::Arc;

/// Called by the job runner as it processes each file of a batch.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events for different jobs may interleave.
pub trait JobProgressCallback: Send + Sync {
    /// Called once when the runner picks the job up (PENDING → IN_PROGRESS).
    fn on_job_start(&self, job_id: &str, total_files: usize) {
        let _ = (job_id, total_files);
    }

    /// Called before a file is handed to the task processor.
    ///
    /// `index` is 0-based in submission order.
    fn on_file_start(&self, job_id: &str, index: usize, total_files: usize) {
        let _ = (job_id, index, total_files);
    }

    /// Called after the file's result was appended to the job.
    fn on_file_complete(&self, job_id: &str, index: usize, total_files: usize, result: &TaskResult) {
        let _ = (job_id, index, total_files, result);
    }

    /// Called once the job reached a terminal status.
    fn on_job_complete(&self, job_id: &str, status: JobStatus) {
        let _ = (job_id, status);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl JobProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::OcrConfig`].
pub type ProgressCallback = Arc<dyn JobProgressCallback>;
