//! Configuration for the OCR engine.
//!
//! All behaviour is controlled through [`OcrConfig`], built via its
//! [`OcrConfigBuilder`]. One struct makes it trivial to share the config
//! between the synchronous request path and every background worker.

use crate::error::OcrError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Extensions accepted by default (case-insensitive, without the dot).
pub const DEFAULT_SUPPORTED_FORMATS: &[&str] = &[
    "png", "jpeg", "jpg", "bmp", "pnm", "gif", "tiff", "webp", "pdf",
];

/// Configuration for recognition tasks and batch jobs.
///
/// # Example
/// ```rust
/// use ocr_batch::OcrConfig;
///
/// let config = OcrConfig::builder()
///     .upload_dir("/tmp/ocr-uploads")
///     .default_language("de")
///     .download_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert!(config.is_supported("PNG"));
/// ```
#[derive(Clone)]
pub struct OcrConfig {
    /// Directory for temp files and permanent PDF copies. Created if absent.
    /// Default: `./static/uploads`.
    pub upload_dir: PathBuf,

    /// Lowercase extensions (no dot) a task accepts.
    pub supported_formats: Vec<String>,

    /// Extensions that are rasterised page by page instead of decoded as a
    /// single image. Default: `pdf`.
    pub paged_formats: Vec<String>,

    /// Language used when a descriptor omits one. Default: `en`.
    pub default_language: String,

    /// Timeout for URL downloads in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Maximum accepted download size in bytes. Default: 10 MiB.
    pub max_download_bytes: u64,

    /// Command used to invoke tesseract. Default: `tesseract`.
    pub tesseract_cmd: String,

    /// Longest rendered edge of a rasterised PDF page. Default: 2000.
    ///
    /// Caps memory on oversized pages while staying well above the
    /// resolution tesseract needs for body text.
    pub max_rendered_pixels: u32,

    /// URL prefix under which permanent PDF copies are served.
    ///
    /// When set, a PDF task's `source` is `{prefix}/{unique_name}`; when
    /// unset it is the copy's file-system path.
    pub public_prefix: Option<String>,

    /// Upper bound on simultaneously running batch workers. Default: none.
    pub max_concurrent_jobs: Option<usize>,

    /// Receives per-job and per-file events from background workers.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./static/uploads"),
            supported_formats: DEFAULT_SUPPORTED_FORMATS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            paged_formats: vec!["pdf".to_string()],
            default_language: "en".to_string(),
            download_timeout_secs: 120,
            max_download_bytes: 10 * 1024 * 1024,
            tesseract_cmd: "tesseract".to_string(),
            max_rendered_pixels: 2000,
            public_prefix: None,
            max_concurrent_jobs: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("upload_dir", &self.upload_dir)
            .field("supported_formats", &self.supported_formats)
            .field("paged_formats", &self.paged_formats)
            .field("default_language", &self.default_language)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("max_download_bytes", &self.max_download_bytes)
            .field("tesseract_cmd", &self.tesseract_cmd)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("public_prefix", &self.public_prefix)
            .field("max_concurrent_jobs", &self.max_concurrent_jobs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn JobProgressCallback>"),
            )
            .finish()
    }
}

impl OcrConfig {
    /// Create a new builder for `OcrConfig`.
    pub fn builder() -> OcrConfigBuilder {
        OcrConfigBuilder {
            config: Self::default(),
        }
    }

    /// Whether `extension` (with or without a leading dot) is accepted.
    pub fn is_supported(&self, extension: &str) -> bool {
        let ext = normalise_extension(extension);
        self.supported_formats.iter().any(|f| *f == ext)
    }

    /// Whether `extension` names a multi-page document format.
    pub fn is_paged(&self, extension: &str) -> bool {
        let ext = normalise_extension(extension);
        self.paged_formats.iter().any(|f| *f == ext)
    }
}

fn normalise_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_lowercase()
}

/// Builder for [`OcrConfig`].
pub struct OcrConfigBuilder {
    config: OcrConfig,
}

impl fmt::Debug for OcrConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OcrConfigBuilder").field(&self.config).finish()
    }
}

impl OcrConfigBuilder {
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn supported_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.supported_formats = formats
            .into_iter()
            .map(|f| normalise_extension(f.as_ref()))
            .collect();
        self
    }

    pub fn paged_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.paged_formats = formats
            .into_iter()
            .map(|f| normalise_extension(f.as_ref()))
            .collect();
        self
    }

    pub fn default_language(mut self, language: impl Into<String>) -> Self {
        self.config.default_language = language.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_download_bytes(mut self, bytes: u64) -> Self {
        self.config.max_download_bytes = bytes;
        self
    }

    pub fn tesseract_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.config.tesseract_cmd = cmd.into();
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn public_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.public_prefix = Some(prefix.into().trim_end_matches('/').to_string());
        self
    }

    pub fn max_concurrent_jobs(mut self, n: usize) -> Self {
        self.config.max_concurrent_jobs = Some(n);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OcrConfig, OcrError> {
        let c = &self.config;
        if c.supported_formats.is_empty() {
            return Err(OcrError::InvalidConfig(
                "supported_formats must not be empty".into(),
            ));
        }
        if let Some(paged) = c.paged_formats.iter().find(|p| !c.is_supported(p)) {
            return Err(OcrError::InvalidConfig(format!(
                "paged format '{}' is not in supported_formats",
                paged
            )));
        }
        if c.default_language.trim().is_empty() {
            return Err(OcrError::InvalidConfig(
                "default_language must not be empty".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(OcrError::InvalidConfig(
                "download_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.max_concurrent_jobs == Some(0) {
            return Err(OcrError::InvalidConfig(
                "max_concurrent_jobs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
