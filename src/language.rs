//! Caller language codes → recognition-engine language codes.
//!
//! Callers speak ISO 639-1 (`en`, `de`); tesseract's traineddata files are
//! named by ISO 639-2/T (`eng`, `deu`). Three-letter codes pass through
//! untouched so callers can name any installed pack directly, and
//! `+`-joined combinations (`en+de`) map element-wise.

use crate::error::OcrError;

const ISO_639_1_TO_3: &[(&str, &str)] = &[
    ("af", "afr"),
    ("ar", "ara"),
    ("bg", "bul"),
    ("bn", "ben"),
    ("ca", "cat"),
    ("cs", "ces"),
    ("da", "dan"),
    ("de", "deu"),
    ("el", "ell"),
    ("en", "eng"),
    ("es", "spa"),
    ("et", "est"),
    ("fa", "fas"),
    ("fi", "fin"),
    ("fr", "fra"),
    ("he", "heb"),
    ("hi", "hin"),
    ("hr", "hrv"),
    ("hu", "hun"),
    ("id", "ind"),
    ("it", "ita"),
    ("ja", "jpn"),
    ("ko", "kor"),
    ("lt", "lit"),
    ("lv", "lav"),
    ("nl", "nld"),
    ("no", "nor"),
    ("pl", "pol"),
    ("pt", "por"),
    ("ro", "ron"),
    ("ru", "rus"),
    ("sk", "slk"),
    ("sl", "slv"),
    ("sr", "srp"),
    ("sv", "swe"),
    ("th", "tha"),
    ("tr", "tur"),
    ("uk", "ukr"),
    ("vi", "vie"),
    ("zh", "chi_sim"),
];

/// Map a caller language code to the engine's code.
///
/// Region subtags (`en-US`, `pt_BR`) are ignored except for Chinese, where
/// `zh-TW`/`zh-Hant` select the traditional-script pack.
pub fn to_engine_code(language: &str) -> Result<String, OcrError> {
    let parts = language
        .split('+')
        .map(|part| map_single(part.trim(), language))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join("+"))
}

fn map_single(code: &str, original: &str) -> Result<String, OcrError> {
    let unsupported = || OcrError::UnsupportedLanguage {
        language: original.to_string(),
    };

    let lower = code.to_ascii_lowercase();
    let (primary, region) = match lower.split_once(['-', '_']) {
        Some((p, r)) => (p, Some(r)),
        None => (lower.as_str(), None),
    };

    if primary == "zh" && matches!(region, Some("tw" | "hk" | "hant")) {
        return Ok("chi_tra".to_string());
    }

    match primary.len() {
        2 => ISO_639_1_TO_3
            .iter()
            .find(|(two, _)| *two == primary)
            .map(|(_, three)| three.to_string())
            .ok_or_else(unsupported),
        // Already an engine code (`eng`, `chi_sim`, `osd`).
        3 if primary.chars().all(|c| c.is_ascii_alphabetic()) => Ok(lower),
        _ if lower.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') && lower.len() > 3 => {
            Ok(lower)
        }
        _ => Err(unsupported()),
    }
}
