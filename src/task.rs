//! Single-file recognition: one [`FileDescriptor`] in, one [`TaskResult`] out.
//!
//! ## Why never `Err`?
//!
//! A batch must report every file, including the ones that failed, so
//! [`TaskProcessor::process`] folds every failure (validation, download,
//! format, engine, processing, even a panic) into the result's
//! `error`/`error_kind` instead of propagating it. Callers check
//! [`TaskResult::is_error`].

use crate::config::OcrConfig;
use crate::descriptor::{secure_filename, FileDescriptor, RawFileInput, UNKNOWN_FILENAME};
use crate::engine::{self, RecognitionEngine};
use crate::error::OcrError;
use crate::language;
use crate::output::TaskResult;
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::recognize::{recognize_file, recognize_page};
use crate::pipeline::render::Rasterizer;
use crate::pipeline::encode;
use chrono::Utc;
use futures::FutureExt;
use image::{DynamicImage, ImageReader};
use std::any::Any;
use std::io::Cursor;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Recognises single files with a fixed engine, rasteriser and config.
pub struct TaskProcessor {
    config: Arc<OcrConfig>,
    engine: Arc<dyn RecognitionEngine>,
    rasterizer: Arc<dyn Rasterizer>,
}

impl TaskProcessor {
    pub fn new(
        config: Arc<OcrConfig>,
        engine: Arc<dyn RecognitionEngine>,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> Self {
        Self {
            config,
            engine,
            rasterizer,
        }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    pub fn engine(&self) -> &dyn RecognitionEngine {
        self.engine.as_ref()
    }

    /// Validate a loosely-typed input, then process it.
    ///
    /// An input naming no source still yields a result, with a validation
    /// error and no text.
    pub async fn process_input(&self, raw: &RawFileInput) -> TaskResult {
        match FileDescriptor::try_from(raw.clone()) {
            Ok(descriptor) => self.process(&descriptor).await,
            Err(e) => {
                let started = Instant::now();
                let language = raw
                    .language
                    .clone()
                    .unwrap_or_else(|| self.config.default_language.clone());
                let mut result =
                    TaskResult::pending(raw.display_filename(), raw.display_source(), language);
                warn!("Rejected input {}: {}", result.filename, e);
                result.set_error(&e);
                self.finish(result, started).await
            }
        }
    }

    /// Recognise one file. Never fails; see the module docs.
    pub async fn process(&self, descriptor: &FileDescriptor) -> TaskResult {
        let started = Instant::now();
        let language = descriptor
            .language()
            .unwrap_or(&self.config.default_language)
            .to_string();
        let mut result = TaskResult::pending(
            descriptor.display_filename(),
            descriptor.display_source(),
            &language,
        );
        info!("Processing {} ({})", result.filename, result.source);

        let outcome = AssertUnwindSafe(self.run(descriptor, &language, &mut result))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("{}: {}", result.filename, e);
                result.set_error(&e);
            }
            Err(panic) => {
                let e = OcrError::Internal(panic_message(panic.as_ref()));
                warn!("{}: {}", result.filename, e);
                result.set_error(&e);
            }
        }

        self.finish(result, started).await
    }

    async fn run(
        &self,
        descriptor: &FileDescriptor,
        language: &str,
        result: &mut TaskResult,
    ) -> Result<(), OcrError> {
        let engine_language = language::to_engine_code(language)?;

        // ── Step 1: Resolve input ────────────────────────────────────────
        let resolved = input::materialize(descriptor, &self.config).await?;
        result.filename = resolved.filename.clone();
        result.source = resolved.source.clone();

        // ── Step 2: Recognise ────────────────────────────────────────────
        let outcome = self.recognize_resolved(&resolved, &engine_language, result).await;

        // ── Step 3: Release engine-owned files ───────────────────────────
        if let Err(e) = resolved.cleanup() {
            warn!("Failed to remove temp file: {}", e);
        }
        outcome
    }

    async fn recognize_resolved(
        &self,
        resolved: &ResolvedInput,
        engine_language: &str,
        result: &mut TaskResult,
    ) -> Result<(), OcrError> {
        input::check_format(resolved, &self.config)?;
        let extension = resolved.extension();

        if self.config.is_paged(&extension) {
            let images = self.rasterizer.rasterize(resolved.path()).await?;
            info!("{}: rasterised {} pages", resolved.filename, images.len());

            let mut pages = Vec::with_capacity(images.len());
            for (idx, image) in images.iter().enumerate() {
                pages.push(recognize_page(self.engine(), image, idx + 1, engine_language).await?);
            }
            let text = pages
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");

            result.source = self.persist_copy(resolved).await?;
            result.text = Some(text);
            result.pages = pages;
        } else {
            let path = resolved.path();
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| OcrError::io(path, e))?;
            let image = decode_image(bytes.clone(), path.to_path_buf()).await?;
            let page = recognize_file(self.engine(), path, &image, 1, engine_language).await?;

            result.text = Some(page.text.clone());
            result.pages = vec![page];
            result.image_preview = Some(encode::data_url(&bytes, &extension));
        }
        Ok(())
    }

    /// Copy a paged document to a uniquely named permanent file in the
    /// upload directory and return the source to report for it.
    async fn persist_copy(&self, resolved: &ResolvedInput) -> Result<String, OcrError> {
        let upload_dir = &self.config.upload_dir;
        tokio::fs::create_dir_all(upload_dir)
            .await
            .map_err(|e| OcrError::io(upload_dir, e))?;

        let stem = match secure_filename(&resolved.filename) {
            name if name.is_empty() => UNKNOWN_FILENAME.to_string(),
            name => name,
        };
        let name = format!("ocr_{}_{}", uuid::Uuid::new_v4().simple(), stem);
        let target = upload_dir.join(&name);
        tokio::fs::copy(resolved.path(), &target)
            .await
            .map_err(|e| OcrError::io(&target, e))?;
        debug!("Stored permanent copy at {}", target.display());

        Ok(match &self.config.public_prefix {
            Some(prefix) => format!("{}/{}", prefix, name),
            None => target.display().to_string(),
        })
    }

    async fn finish(&self, mut result: TaskResult, started: Instant) -> TaskResult {
        result.engine_version = engine::version_string(self.engine()).await;
        result.ended_at = Utc::now();
        result.duration_ms = started.elapsed().as_millis() as u64;
        match &result.error {
            None => info!(
                "{}: {} pages, {} words in {}ms",
                result.filename,
                result.pages.len(),
                result.word_count(),
                result.duration_ms
            ),
            Some(e) => info!("{}: failed in {}ms: {}", result.filename, result.duration_ms, e),
        }
        result
    }
}

/// Decode image bytes off the async workers, sniffing the real format.
async fn decode_image(bytes: Vec<u8>, path: PathBuf) -> Result<DynamicImage, OcrError> {
    tokio::task::spawn_blocking(move || decode_image_blocking(&bytes, &path))
        .await
        .map_err(|e| OcrError::Internal(format!("Decode task panicked: {}", e)))?
}

fn decode_image_blocking(bytes: &[u8], path: &Path) -> Result<DynamicImage, OcrError> {
    let decode_err = |detail: String| OcrError::ImageDecode {
        path: path.to_path_buf(),
        detail,
    };
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| decode_err(e.to_string()))?
        .decode()
        .map_err(|e| decode_err(e.to_string()))
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
