//! Error types for the ocr-batch library.
//!
//! A single error enum, [`OcrError`], covers every failure the engine can
//! observe. Most of them never reach a caller as `Err`: the task processor
//! folds them into [`crate::output::TaskResult::error`] so one bad file
//! cannot abort a batch. Only boundary validation (bad batch payloads),
//! job lookups and configuration errors are returned directly.
//!
//! [`ErrorKind`] is the coarse classification that travels with a failed
//! `TaskResult`. It separates deployment problems
//! ([`ErrorKind::EngineUnavailable`]) from bad user input so operators can
//! alert on the former without drowning in the latter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the ocr-batch library.
#[derive(Debug, Error)]
pub enum OcrError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The descriptor matched none of the path / URL / inline variants.
    #[error("Invalid file input: {reason}")]
    InvalidInput { reason: String },

    /// A batch submission carried no files.
    #[error("Invalid batch: 'files' must be a non-empty list")]
    EmptyBatch,

    /// One entry of a batch submission is malformed.
    #[error("Invalid batch entry #{index}: {reason}")]
    InvalidBatchEntry { index: usize, reason: String },

    /// The language code has no engine equivalent.
    #[error("Unsupported language '{language}'")]
    UnsupportedLanguage { language: String },

    // ── Download errors ───────────────────────────────────────────────────
    /// URL fetch failed (network error or non-2xx status).
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// Download body exceeded the configured size cap.
    #[error("Download of '{url}' exceeds the {limit} byte limit")]
    DownloadTooLarge { url: String, limit: u64 },

    // ── Format errors ─────────────────────────────────────────────────────
    /// The resolved file's extension is not in the supported set.
    #[error("File format not supported")]
    UnsupportedFormat { extension: String },

    // ── Deployment errors ─────────────────────────────────────────────────
    /// The recognition engine binary is missing or misconfigured.
    #[error("Recognition engine '{engine}' is unavailable: {detail}")]
    EngineUnavailable { engine: String, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH or install libpdfium on the library search path."
    )]
    RasterizerUnavailable(String),

    // ── Processing errors ─────────────────────────────────────────────────
    /// The engine ran but reported a failure for this input.
    #[error("Recognition failed: {detail}")]
    RecognitionFailed { detail: String },

    /// The file could not be decoded as an image.
    #[error("Cannot decode image '{path}': {detail}")]
    ImageDecode { path: PathBuf, detail: String },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// File system error on a known path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Job table errors ──────────────────────────────────────────────────
    /// No job with this id exists.
    #[error("Job {job_id} not found.")]
    JobNotFound { job_id: String },

    /// A lifecycle transition that the state machine forbids.
    #[error("Job {job_id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: String,
        to: String,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Unexpected error: {0}")]
    Internal(String),
}

impl OcrError {
    /// Classify this error for callers and operators.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OcrError::InvalidInput { .. }
            | OcrError::EmptyBatch
            | OcrError::InvalidBatchEntry { .. }
            | OcrError::UnsupportedLanguage { .. }
            | OcrError::InvalidConfig(_) => ErrorKind::Validation,
            OcrError::DownloadFailed { .. }
            | OcrError::DownloadTimeout { .. }
            | OcrError::DownloadTooLarge { .. } => ErrorKind::Download,
            OcrError::UnsupportedFormat { .. } => ErrorKind::Format,
            OcrError::EngineUnavailable { .. } | OcrError::RasterizerUnavailable(_) => {
                ErrorKind::EngineUnavailable
            }
            OcrError::RecognitionFailed { .. }
            | OcrError::ImageDecode { .. }
            | OcrError::CorruptPdf { .. }
            | OcrError::RasterisationFailed { .. }
            | OcrError::Io { .. } => ErrorKind::Processing,
            OcrError::JobNotFound { .. }
            | OcrError::InvalidTransition { .. }
            | OcrError::Internal(_) => ErrorKind::Unexpected,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OcrError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Coarse failure classification attached to a failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed descriptor, bad batch payload, unknown language.
    Validation,
    /// URL fetch failure.
    Download,
    /// Unsupported file extension.
    Format,
    /// Recognition engine or rasteriser missing: a deployment problem.
    EngineUnavailable,
    /// The input could not be decoded or recognised.
    Processing,
    /// Anything else, including panics caught at the task boundary.
    Unexpected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Download => "download",
            ErrorKind::Format => "format",
            ErrorKind::EngineUnavailable => "engine_unavailable",
            ErrorKind::Processing => "processing",
            ErrorKind::Unexpected => "unexpected",
        };
        f.write_str(s)
    }
}
