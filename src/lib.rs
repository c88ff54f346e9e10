//! # ocr-batch
//!
//! Optical character recognition for images and PDFs, one file at a time or
//! as asynchronous batches with pollable job status.
//!
//! ## Pipeline Overview
//!
//! ```text
//! FileDescriptor (path | URL | base64)
//!  │
//!  ├─ 1. Resolve    local path as-is; URL/base64 into an owned temp file
//!  ├─ 2. Validate   extension against the configured format set
//!  ├─ 3. Render     PDF pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 4. Recognise  engine text + word boxes per page, blank words dropped
//!  └─ 5. Result     TaskResult with timings and engine version; temp removed
//! ```
//!
//! Batches run the same pipeline per file on a background tokio task; the
//! [`Job`] snapshot returned by [`OcrService::status`] gains one
//! [`TaskResult`] per finished file, in submission order.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr_batch::{FileDescriptor, OcrConfig, OcrService};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = OcrService::new(OcrConfig::default())?;
//!
//!     let result = service.recognize(&FileDescriptor::path("scan.png")).await;
//!     match &result.error {
//!         None => println!("{}", result.text.unwrap_or_default()),
//!         Some(e) => eprintln!("failed: {e}"),
//!     }
//!
//!     let receipt = service.submit(vec![
//!         FileDescriptor::path("a.pdf"),
//!         FileDescriptor::url("https://example.com/b.jpg").with_language("de"),
//!     ])?;
//!     let job = service.wait_for_job(&receipt.job_id, Duration::from_secs(300)).await?;
//!     println!("{}: {} results", job.status, job.results.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr-batch` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! ocr-batch = { version = "0.3", default-features = false }
//! ```
//!
//! ## Runtime Requirements
//!
//! The default engine shells out to `tesseract` (with the traineddata packs
//! for the languages you request); PDF input needs the pdfium shared
//! library, found via `PDFIUM_LIB_PATH`, the working directory, or the
//! system library path. A missing engine is reported per file with
//! [`ErrorKind::EngineUnavailable`] rather than failing the batch.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod language;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod service;
pub mod task;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OcrConfig, OcrConfigBuilder};
pub use descriptor::{FileDescriptor, RawFileInput};
pub use engine::{RecognitionEngine, TesseractEngine};
pub use error::{ErrorKind, OcrError};
pub use jobs::{Job, JobStatus, JobStore, SubmitReceipt};
pub use output::{PageResult, TaskResult, WordBox};
pub use pipeline::render::{PdfiumRasterizer, Rasterizer};
pub use progress::{JobProgressCallback, NoopProgressCallback, ProgressCallback};
pub use service::{recognize_file_sync, OcrService};
pub use task::TaskProcessor;
