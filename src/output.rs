//! Result types returned to callers.

use crate::error::{ErrorKind, OcrError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recognised word and its pixel-space bounding box.
///
/// Only emitted for non-empty, non-whitespace text; see
/// [`crate::pipeline::recognize::filter_words`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordBox {
    pub level: u32,
    pub page_num: u32,
    pub block_num: u32,
    pub par_num: u32,
    pub line_num: u32,
    pub word_num: u32,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    /// Engine confidence 0–100; `None` when the engine reported none.
    pub confidence: Option<f32>,
    /// Trimmed word text.
    pub text: String,
}

/// Recognition output for one page (or for a single-image input).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_number: usize,
    pub text: String,
    pub words: Vec<WordBox>,
    pub image_width: u32,
    pub image_height: u32,
}

/// Outcome of processing exactly one file.
///
/// Either `text` is set and `error` is `None`, or `error` is set, `text` is
/// `None` and `pages` is empty. Callers must check `error` explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub filename: String,
    /// Resolved URL, `filepath://…`, `base64_data`, or the permanent PDF copy.
    pub source: String,
    pub language: String,
    /// Page texts joined with `\n`.
    pub text: Option<String>,
    pub pages: Vec<PageResult>,
    /// `data:image/{ext};base64,…` for single-page image inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_preview: Option<String>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub engine_version: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl TaskResult {
    /// A result with identity fields filled and nothing recognised yet.
    pub fn pending(
        filename: impl Into<String>,
        source: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            filename: filename.into(),
            source: source.into(),
            language: language.into(),
            text: None,
            pages: Vec::new(),
            image_preview: None,
            error: None,
            error_kind: None,
            engine_version: String::new(),
            started_at: now,
            ended_at: now,
            duration_ms: 0,
        }
    }

    /// Whether the task failed.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Record `err`, discarding any partial output.
    pub fn set_error(&mut self, err: &OcrError) {
        self.text = None;
        self.pages.clear();
        self.image_preview = None;
        self.error = Some(err.to_string());
        self.error_kind = Some(err.kind());
    }

    /// Total recognised words across all pages.
    pub fn word_count(&self) -> usize {
        self.pages.iter().map(|p| p.words.len()).sum()
    }
}
