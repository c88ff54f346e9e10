//! Page recognition: one image in, one [`PageResult`] out.

use super::encode::encode_png;
use crate::engine::{RawWordRow, RecognitionEngine};
use crate::error::OcrError;
use crate::output::{PageResult, WordBox};
use image::DynamicImage;
use std::path::Path;
use tracing::debug;

/// Keep only rows whose text is non-empty after trimming; trim the text.
pub fn filter_words(rows: Vec<RawWordRow>) -> Vec<WordBox> {
    rows.into_iter()
        .filter_map(|row| {
            let text = row.text.as_deref().map(str::trim).unwrap_or("");
            if text.is_empty() {
                return None;
            }
            Some(WordBox {
                level: row.level,
                page_num: row.page_num,
                block_num: row.block_num,
                par_num: row.par_num,
                line_num: row.line_num,
                word_num: row.word_num,
                left: row.left,
                top: row.top,
                width: row.width,
                height: row.height,
                confidence: row.conf,
                text: text.to_string(),
            })
        })
        .collect()
}

/// Recognise one in-memory page image.
///
/// The image is written as PNG to a private temp dir for the engine and the
/// dir is removed before returning. `page_number` is 1-based.
pub async fn recognize_page(
    engine: &dyn RecognitionEngine,
    image: &DynamicImage,
    page_number: usize,
    engine_language: &str,
) -> Result<PageResult, OcrError> {
    let png = encode_png(image).map_err(|e| OcrError::RecognitionFailed {
        detail: format!("page {page_number}: PNG encode failed: {e}"),
    })?;

    let workdir = tempfile::TempDir::with_prefix("ocr_page")
        .map_err(|e| OcrError::Internal(format!("tempdir: {e}")))?;
    let page_path = workdir.path().join(format!("page_{page_number}.png"));
    tokio::fs::write(&page_path, &png)
        .await
        .map_err(|e| OcrError::io(&page_path, e))?;

    let page = recognize_file(engine, &page_path, image, page_number, engine_language).await?;
    drop(workdir);
    Ok(page)
}

/// Recognise an image already on disk whose decoded form is `image`.
pub(crate) async fn recognize_file(
    engine: &dyn RecognitionEngine,
    path: &Path,
    image: &DynamicImage,
    page_number: usize,
    engine_language: &str,
) -> Result<PageResult, OcrError> {
    let raw = engine.recognize(path, engine_language).await?;
    let words = filter_words(raw.rows);
    debug!(
        "{}: page {} → {} words",
        engine.name(),
        page_number,
        words.len()
    );

    Ok(PageResult {
        page_number,
        text: raw.text,
        words,
        image_width: image.width(),
        image_height: image.height(),
    })
}
