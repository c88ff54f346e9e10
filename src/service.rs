//! The public entry point: single-file recognition and asynchronous batches.
//!
//! [`OcrService::submit`] validates a batch, registers a PENDING job and
//! returns immediately; a background tokio task then runs the batch while
//! callers poll [`OcrService::status`]. Any number of batches may run at
//! once, each with its own job id and result list, optionally bounded by
//! [`OcrConfig::max_concurrent_jobs`].

use crate::config::OcrConfig;
use crate::descriptor::{parse_batch_json, validate_batch, FileDescriptor, RawFileInput};
use crate::engine::{self, RecognitionEngine, TesseractEngine};
use crate::error::OcrError;
use crate::jobs::{runner, Job, JobStatus, JobStore, SubmitReceipt};
use crate::output::TaskResult;
use crate::pipeline::render::{PdfiumRasterizer, Rasterizer};
use crate::task::TaskProcessor;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Polling interval used by [`OcrService::wait_for_job`].
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Recognition service owning the job table and the background workers.
pub struct OcrService {
    config: Arc<OcrConfig>,
    processor: Arc<TaskProcessor>,
    store: JobStore,
    workers: Mutex<JoinSet<()>>,
    job_slots: Option<Arc<Semaphore>>,
}

impl OcrService {
    /// A service backed by the `tesseract` CLI and pdfium.
    pub fn new(config: OcrConfig) -> Result<Self, OcrError> {
        let engine = Arc::new(TesseractEngine::new(config.tesseract_cmd.clone()));
        let rasterizer = Arc::new(PdfiumRasterizer::new(config.max_rendered_pixels));
        Self::with_components(config, engine, rasterizer)
    }

    /// A service with caller-supplied engine and rasteriser.
    ///
    /// Creates the upload directory if it does not exist.
    pub fn with_components(
        config: OcrConfig,
        engine: Arc<dyn RecognitionEngine>,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> Result<Self, OcrError> {
        std::fs::create_dir_all(&config.upload_dir)
            .map_err(|e| OcrError::io(&config.upload_dir, e))?;

        let job_slots = config
            .max_concurrent_jobs
            .map(|n| Arc::new(Semaphore::new(n)));
        let config = Arc::new(config);
        let processor = Arc::new(TaskProcessor::new(config.clone(), engine, rasterizer));

        Ok(Self {
            config,
            processor,
            store: JobStore::new(),
            workers: Mutex::new(JoinSet::new()),
            job_slots,
        })
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    /// The job table; every clone observes the same jobs.
    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Recognise one file and wait for the result.
    pub async fn recognize(&self, descriptor: &FileDescriptor) -> TaskResult {
        self.processor.process(descriptor).await
    }

    /// Recognise one loosely-typed input and wait for the result.
    pub async fn recognize_input(&self, raw: &RawFileInput) -> TaskResult {
        self.processor.process_input(raw).await
    }

    /// Accept a validated batch and start processing it in the background.
    ///
    /// Must be called from within a tokio runtime. Returns as soon as the
    /// job is registered; no file work happens before this returns.
    pub fn submit(&self, files: Vec<FileDescriptor>) -> Result<SubmitReceipt, OcrError> {
        if files.is_empty() {
            return Err(OcrError::EmptyBatch);
        }
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| OcrError::Internal(format!("no tokio runtime: {e}")))?;

        let job = self.store.create(files.len());
        let job_id = job.job_id.clone();
        info!("Accepted job {} with {} files", job_id, files.len());

        let processor = self.processor.clone();
        let store = self.store.clone();
        let progress = self.config.progress_callback.clone();
        let slots = self.job_slots.clone();
        let worker_id = job_id.clone();

        let mut workers = self.workers();
        while let Some(done) = workers.try_join_next() {
            log_worker_exit(done);
        }
        workers.spawn_on(
            async move {
                let _permit = match slots {
                    Some(slots) => match slots.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(e) => {
                            warn!("Job {}: concurrency limiter closed: {}", worker_id, e);
                            None
                        }
                    },
                    None => None,
                };
                runner::run_job(
                    worker_id,
                    files,
                    &processor,
                    &store,
                    progress.as_deref(),
                )
                .await;
            },
            &handle,
        );

        Ok(SubmitReceipt {
            job_id,
            status: JobStatus::Pending,
        })
    }

    /// Validate loosely-typed inputs, then [`submit`](Self::submit) them.
    ///
    /// Nothing is registered when any entry is invalid.
    pub fn submit_raw(&self, files: Vec<RawFileInput>) -> Result<SubmitReceipt, OcrError> {
        self.submit(validate_batch(files)?)
    }

    /// Accept a JSON batch payload: a bare array or `{"files": [...]}`.
    pub fn submit_json(&self, payload: serde_json::Value) -> Result<SubmitReceipt, OcrError> {
        self.submit(parse_batch_json(payload)?)
    }

    /// Snapshot of a job. Polling never alters the job.
    pub fn status(&self, job_id: &str) -> Result<Job, OcrError> {
        self.store.status(job_id)
    }

    /// Poll until the job is terminal or `timeout` elapses.
    ///
    /// Returns the latest snapshot either way; check its status.
    pub async fn wait_for_job(&self, job_id: &str, timeout: Duration) -> Result<Job, OcrError> {
        let deadline = Instant::now() + timeout;
        loop {
            let job = self.status(job_id)?;
            if job.status.is_terminal() || Instant::now() >= deadline {
                return Ok(job);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait for every background worker spawned so far to exit.
    pub async fn drain(&self) {
        let mut workers = std::mem::take(&mut *self.workers());
        while let Some(done) = workers.join_next().await {
            log_worker_exit(done);
        }
    }

    /// Background workers that have not been reaped yet.
    pub fn active_workers(&self) -> usize {
        self.workers().len()
    }

    /// Engine language codes installed on this host.
    pub async fn languages(&self) -> Result<Vec<String>, OcrError> {
        self.processor.engine().languages().await
    }

    /// Engine version, `"Not Installed"`, or `"Error: …"`.
    pub async fn engine_version(&self) -> String {
        engine::version_string(self.processor.engine()).await
    }

    fn workers(&self) -> MutexGuard<'_, JoinSet<()>> {
        match self.workers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Worker set lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

fn log_worker_exit(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        error!("Batch worker exited abnormally: {}", e);
    }
}

/// Synchronous wrapper: recognise one file on a private runtime.
///
/// Must not be called from inside an async context.
pub fn recognize_file_sync(
    config: OcrConfig,
    descriptor: &FileDescriptor,
) -> Result<TaskResult, OcrError> {
    let service = OcrService::new(config)?;
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| OcrError::Internal(format!("Failed to create tokio runtime: {}", e)))?;
    Ok(runtime.block_on(service.recognize(descriptor)))
}
