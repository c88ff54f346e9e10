//! Recognition-engine interface.
//!
//! The engine is an opaque black box: given one image file and an engine
//! language code it returns the page text plus raw word rows. Everything
//! above it (filtering, page numbering, result shaping) lives in
//! [`crate::pipeline::recognize`] and [`crate::task`], so a test double or a
//! different backend only has to implement [`RecognitionEngine`].

use crate::error::OcrError;
use async_trait::async_trait;
use std::path::Path;
use tracing::warn;

pub mod tesseract;

pub use tesseract::TesseractEngine;

/// Reported engine version when the engine binary cannot be found.
pub const NOT_INSTALLED: &str = "Not Installed";

/// Raw output of one recognition call, before filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecognition {
    /// Full page text as the engine laid it out.
    pub text: String,
    /// One row per layout element (page, block, paragraph, line, word).
    pub rows: Vec<RawWordRow>,
}

/// One layout row as reported by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawWordRow {
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
    /// `None` when the engine reported no confidence (tesseract uses `-1`).
    pub conf: Option<f32>,
    pub text: Option<String>,
}

/// A text-recognition backend.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Short engine name used in logs and errors.
    fn name(&self) -> &str;

    /// Recognise the image at `image_path` using engine language `language`.
    ///
    /// Must return [`OcrError::EngineUnavailable`] when the engine itself is
    /// missing or misconfigured, as opposed to failing on this input.
    async fn recognize(&self, image_path: &Path, language: &str) -> Result<RawRecognition, OcrError>;

    /// The engine's version string.
    async fn version(&self) -> Result<String, OcrError>;

    /// Installed engine language codes.
    async fn languages(&self) -> Result<Vec<String>, OcrError>;
}

/// Best-effort version string that never fails.
///
/// Degrades to [`NOT_INSTALLED`] when the engine is unavailable and to
/// `"Error: …"` for anything else.
pub async fn version_string(engine: &dyn RecognitionEngine) -> String {
    match engine.version().await {
        Ok(v) => v,
        Err(OcrError::EngineUnavailable { .. }) => NOT_INSTALLED.to_string(),
        Err(e) => {
            warn!("{}: version lookup failed: {}", engine.name(), e);
            format!("Error: {e}")
        }
    }
}

/// Parse tesseract TSV output (`level page_num … conf text`) into rows.
///
/// Columns are located by header name. A missing or unparsable numeric
/// column yields `0` rather than dropping the row; a negative confidence
/// means "not a word" and becomes `None`.
pub fn parse_tsv(tsv: &str) -> Vec<RawWordRow> {
    let mut lines = tsv.lines();
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let columns: Vec<&str> = header.split('\t').map(str::trim).collect();
    let col = |name: &str| columns.iter().position(|c| *c == name);

    let idx = [
        col("level"),
        col("page_num"),
        col("block_num"),
        col("par_num"),
        col("line_num"),
        col("word_num"),
        col("left"),
        col("top"),
        col("width"),
        col("height"),
    ];
    let conf_idx = col("conf");
    let text_idx = col("text");

    lines
        .filter(|l| !l.is_empty())
        .map(|line| {
            let fields: Vec<&str> = line.splitn(columns.len().max(1), '\t').collect();
            let get = |i: Option<usize>| i.and_then(|i| fields.get(i).copied());
            let num = |i: Option<usize>| -> u32 {
                get(i)
                    .and_then(|v| v.trim().parse::<i64>().ok())
                    .map(|v| v.clamp(0, u32::MAX as i64) as u32)
                    .unwrap_or(0)
            };

            RawWordRow {
                level: num(idx[0]),
                page_num: num(idx[1]),
                block_num: num(idx[2]),
                par_num: num(idx[3]),
                line_num: num(idx[4]),
                word_num: num(idx[5]),
                left: num(idx[6]),
                top: num(idx[7]),
                width: num(idx[8]),
                height: num(idx[9]),
                conf: get(conf_idx)
                    .and_then(|v| v.trim().parse::<f32>().ok())
                    .filter(|c| *c >= 0.0),
                text: get(text_idx).map(|t| t.to_string()),
            }
        })
        .collect()
}
