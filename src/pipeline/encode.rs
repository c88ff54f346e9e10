//! Image encoding: page images to PNG bytes, file bytes to preview data-URLs.
//!
//! PNG is used for everything handed to the engine because it is lossless;
//! JPEG artefacts around glyph edges measurably hurt recognition.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} image → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// `data:image/{subtype};base64,…` preview of an image file's raw bytes.
///
/// `extension` is the file's lowercase extension; `jpg` and `tif` are
/// normalised to their registered media subtypes.
pub fn data_url(bytes: &[u8], extension: &str) -> String {
    let subtype = match extension {
        "jpg" => "jpeg",
        "tif" => "tiff",
        other => other,
    };
    format!("data:image/{};base64,{}", subtype, STANDARD.encode(bytes))
}
