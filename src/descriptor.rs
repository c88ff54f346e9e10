//! Input descriptors: where one file comes from and which language it is in.
//!
//! [`FileDescriptor`] is the validated, three-variant form the engine works
//! with. [`RawFileInput`] is the loose shape transports receive
//! (`{filepath?, url?, base64?, filename?, language?}`); converting it is
//! where "no variant matched" gets rejected, once, at the boundary.

use crate::error::OcrError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Fallback display name when a descriptor carries none.
pub const UNKNOWN_FILENAME: &str = "unknown_file";

/// Display source for inline payloads.
pub const INLINE_SOURCE: &str = "base64_data";

/// A caller-supplied description of one input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileDescriptor {
    /// A file already on local disk. The engine never deletes it.
    Path {
        filepath: PathBuf,
        filename: Option<String>,
        language: Option<String>,
    },
    /// A remote http(s) resource, downloaded to a temp file.
    Url { url: String, language: Option<String> },
    /// A base64 payload, decoded to a temp file named after `filename`.
    Inline {
        base64: String,
        filename: String,
        language: Option<String>,
    },
}

impl FileDescriptor {
    pub fn path(filepath: impl Into<PathBuf>) -> Self {
        FileDescriptor::Path {
            filepath: filepath.into(),
            filename: None,
            language: None,
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        FileDescriptor::Url {
            url: url.into(),
            language: None,
        }
    }

    pub fn inline(base64: impl Into<String>, filename: impl Into<String>) -> Self {
        FileDescriptor::Inline {
            base64: base64.into(),
            filename: filename.into(),
            language: None,
        }
    }

    /// Set the recognition language.
    pub fn with_language(mut self, lang: impl Into<String>) -> Self {
        let lang = Some(lang.into());
        match &mut self {
            FileDescriptor::Path { language, .. }
            | FileDescriptor::Url { language, .. }
            | FileDescriptor::Inline { language, .. } => *language = lang,
        }
        self
    }

    /// Override the display filename of a path descriptor.
    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        if let FileDescriptor::Path { filename, .. } = &mut self {
            *filename = Some(name.into());
        }
        self
    }

    pub fn language(&self) -> Option<&str> {
        match self {
            FileDescriptor::Path { language, .. }
            | FileDescriptor::Url { language, .. }
            | FileDescriptor::Inline { language, .. } => language.as_deref(),
        }
    }

    /// The filename reported before the source is resolved.
    pub fn display_filename(&self) -> String {
        match self {
            FileDescriptor::Path {
                filepath, filename, ..
            } => filename
                .clone()
                .or_else(|| last_segment(filepath))
                .unwrap_or_else(|| UNKNOWN_FILENAME.to_string()),
            FileDescriptor::Url { .. } => UNKNOWN_FILENAME.to_string(),
            FileDescriptor::Inline { filename, .. } => filename.clone(),
        }
    }

    /// The source string reported before the source is resolved.
    pub fn display_source(&self) -> String {
        match self {
            FileDescriptor::Path { filepath, .. } => {
                format!("filepath://{}", filepath.display())
            }
            FileDescriptor::Url { url, .. } => url.clone(),
            FileDescriptor::Inline { .. } => INLINE_SOURCE.to_string(),
        }
    }
}

fn last_segment(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string())
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// The loose wire shape of a descriptor, as transports receive it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFileInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl RawFileInput {
    /// Best-effort filename for error results of unresolvable inputs.
    pub fn display_filename(&self) -> String {
        self.filename
            .clone()
            .unwrap_or_else(|| UNKNOWN_FILENAME.to_string())
    }

    /// Best-effort source for error results of unresolvable inputs.
    pub fn display_source(&self) -> String {
        if let Some(path) = non_empty(&self.filepath) {
            format!("filepath://{path}")
        } else if let Some(url) = non_empty(&self.url) {
            url.to_string()
        } else {
            INLINE_SOURCE.to_string()
        }
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl TryFrom<RawFileInput> for FileDescriptor {
    type Error = OcrError;

    /// Variant precedence: `filepath`, then `url`, then `base64` + `filename`.
    fn try_from(raw: RawFileInput) -> Result<Self, Self::Error> {
        let language = non_empty(&raw.language).map(|s| s.to_string());

        if let Some(path) = non_empty(&raw.filepath) {
            return Ok(FileDescriptor::Path {
                filepath: PathBuf::from(path),
                filename: non_empty(&raw.filename).map(|s| s.to_string()),
                language,
            });
        }

        if let Some(url) = non_empty(&raw.url) {
            if !is_url(url) {
                return Err(OcrError::InvalidInput {
                    reason: format!("'{url}' is not an http(s) URL"),
                });
            }
            return Ok(FileDescriptor::Url {
                url: url.to_string(),
                language,
            });
        }

        match (non_empty(&raw.base64), non_empty(&raw.filename)) {
            (Some(payload), Some(filename)) => Ok(FileDescriptor::Inline {
                base64: payload.to_string(),
                filename: filename.to_string(),
                language,
            }),
            (Some(_), None) => Err(OcrError::InvalidInput {
                reason: "a base64 payload requires a filename".into(),
            }),
            _ => Err(OcrError::InvalidInput {
                reason: "expected one of 'filepath', 'url' or 'base64' + 'filename'".into(),
            }),
        }
    }
}

/// Validate a batch before any job exists.
///
/// Rejects an empty batch and reports the first malformed entry by index.
pub fn validate_batch(files: Vec<RawFileInput>) -> Result<Vec<FileDescriptor>, OcrError> {
    if files.is_empty() {
        return Err(OcrError::EmptyBatch);
    }
    files
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            FileDescriptor::try_from(raw).map_err(|e| OcrError::InvalidBatchEntry {
                index,
                reason: match e {
                    OcrError::InvalidInput { reason } => reason,
                    other => other.to_string(),
                },
            })
        })
        .collect()
}

/// Parse and validate a JSON batch payload (`[{…}, …]` or `{"files": [{…}, …]}`).
pub fn parse_batch_json(payload: serde_json::Value) -> Result<Vec<FileDescriptor>, OcrError> {
    let files = match payload {
        serde_json::Value::Object(mut map) => map.remove("files").ok_or(OcrError::EmptyBatch)?,
        other => other,
    };
    let raw: Vec<RawFileInput> = match files {
        serde_json::Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value(item).map_err(|e| OcrError::InvalidBatchEntry {
                    index,
                    reason: e.to_string(),
                })
            })
            .collect::<Result<_, _>>()?,
        serde_json::Value::Null => Vec::new(),
        _ => {
            return Err(OcrError::InvalidInput {
                reason: "'files' must be a list".into(),
            })
        }
    };
    validate_batch(raw)
}

static RE_UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.-]").unwrap());

/// Reduce a caller-supplied filename to a safe, flat ASCII name.
///
/// Non-ASCII characters are dropped, path separators become spaces,
/// whitespace runs become `_`, anything outside `[A-Za-z0-9_.-]` is removed
/// and leading/trailing dots and underscores are stripped. May return an
/// empty string.
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    RE_UNSAFE_FILENAME_CHARS
        .replace_all(&joined, "")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}
