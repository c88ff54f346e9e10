//! Recognition engine wrapping the `tesseract` CLI tool.
//!
//! One process run produces both the plain text and the TSV word table
//! (`tesseract IN OUTBASE -l LANG txt tsv`), so text and boxes always come
//! from the same recognition pass.

use super::{parse_tsv, RawRecognition, RecognitionEngine};
use crate::error::OcrError;
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

/// stderr fragments that mean the deployment, not the input, is broken.
const MISCONFIGURED_MARKERS: &[&str] = &[
    "Failed loading language",
    "Error opening data file",
    "Could not initialize tesseract",
];

/// OCR engine backed by the `tesseract` executable.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    cmd: String,
}

impl TesseractEngine {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    async fn run(&self, args: &[&OsStr]) -> Result<Output, OcrError> {
        Command::new(&self.cmd)
            .args(args)
            .output()
            .await
            .map_err(|e| OcrError::EngineUnavailable {
                engine: self.cmd.clone(),
                detail: if e.kind() == std::io::ErrorKind::NotFound {
                    "executable not found on PATH".to_string()
                } else {
                    e.to_string()
                },
            })
    }

    fn check_for_failure(&self, output: &Output) -> Result<(), OcrError> {
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let detail = if stderr.is_empty() {
            format!("{} exited with {}", self.cmd, output.status)
        } else {
            stderr
        };
        if MISCONFIGURED_MARKERS.iter().any(|m| detail.contains(m)) {
            Err(OcrError::EngineUnavailable {
                engine: self.cmd.clone(),
                detail,
            })
        } else {
            Err(OcrError::RecognitionFailed { detail })
        }
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

#[async_trait]
impl RecognitionEngine for TesseractEngine {
    fn name(&self) -> &str {
        &self.cmd
    }

    async fn recognize(&self, image_path: &Path, language: &str) -> Result<RawRecognition, OcrError> {
        let tmpdir = tempfile::TempDir::with_prefix("tesseract")
            .map_err(|e| OcrError::Internal(format!("tempdir: {e}")))?;
        let out_base = tmpdir.path().join("output");

        let output = self
            .run(&[
                image_path.as_os_str(),
                out_base.as_os_str(),
                OsStr::new("-l"),
                OsStr::new(language),
                OsStr::new("txt"),
                OsStr::new("tsv"),
            ])
            .await?;
        self.check_for_failure(&output)?;

        let txt_path = out_base.with_extension("txt");
        let tsv_path = out_base.with_extension("tsv");
        let text = tokio::fs::read_to_string(&txt_path)
            .await
            .map_err(|e| OcrError::io(&txt_path, e))?;
        let tsv = tokio::fs::read_to_string(&tsv_path)
            .await
            .map_err(|e| OcrError::io(&tsv_path, e))?;

        let rows = parse_tsv(&tsv);
        debug!(
            "tesseract: {} chars, {} rows for {}",
            text.len(),
            rows.len(),
            image_path.display()
        );
        Ok(RawRecognition { text, rows })
    }

    async fn version(&self) -> Result<String, OcrError> {
        let output = self.run(&[OsStr::new("--version")]).await?;
        self.check_for_failure(&output)?;
        // Old releases print the banner on stderr.
        let banner = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).to_string()
        } else {
            String::from_utf8_lossy(&output.stdout).to_string()
        };
        parse_version(&banner).ok_or_else(|| OcrError::RecognitionFailed {
            detail: format!("unrecognised version banner: {:?}", banner.trim()),
        })
    }

    async fn languages(&self) -> Result<Vec<String>, OcrError> {
        let output = self.run(&[OsStr::new("--list-langs")]).await?;
        self.check_for_failure(&output)?;
        let mut listing = String::from_utf8_lossy(&output.stdout).to_string();
        listing.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(parse_language_list(&listing))
    }
}

/// `"tesseract 5.3.0\n leptonica-1.82.0 …"` → `"5.3.0"`.
fn parse_version(banner: &str) -> Option<String> {
    let first = banner.lines().find(|l| !l.trim().is_empty())?;
    let version = first.trim().strip_prefix("tesseract")?.trim();
    let version = version.strip_prefix('v').unwrap_or(version);
    (!version.is_empty()).then(|| version.to_string())
}

/// Skip the "List of available languages …" banner, keep one code per line.
fn parse_language_list(listing: &str) -> Vec<String> {
    let mut langs: Vec<String> = listing
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("List of available languages"))
        .filter(|l| l.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .map(|l| l.to_string())
        .collect();
    langs.sort();
    langs.dedup();
    langs
}
