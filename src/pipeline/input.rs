//! Source resolution: turn any [`FileDescriptor`] into a local, decodable file.
//!
//! ## Who owns the file?
//!
//! A caller-supplied path is never touched: no I/O here, and nothing ever
//! deletes it. URL and inline inputs are materialised into a
//! [`NamedTempFile`] inside the upload directory; the handle lives inside
//! [`ResolvedInput`], so the file disappears when the input is dropped on
//! every exit path, including early returns and unwinding panics.
//!
//! Format validation runs strictly after materialisation and compares the
//! lowercase extension against the configured set.

use crate::config::OcrConfig;
use crate::descriptor::{secure_filename, FileDescriptor, INLINE_SOURCE, UNKNOWN_FILENAME};
use crate::error::OcrError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// A resolved input: a local path plus the display fields for the result.
#[derive(Debug)]
pub struct ResolvedInput {
    path: PathBuf,
    /// Display filename (sanitised for URL and inline inputs).
    pub filename: String,
    /// Display source: the URL, `filepath://…` or `base64_data`.
    pub source: String,
    /// Present iff the engine created the file.
    temp: Option<NamedTempFile>,
}

impl ResolvedInput {
    /// Path to the local file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the engine created this file and must delete it.
    pub fn owns_file(&self) -> bool {
        self.temp.is_some()
    }

    /// Lowercase extension without the dot; empty when there is none.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default()
    }

    /// Delete an owned temp file now, reporting failures.
    ///
    /// Caller-supplied paths are left untouched. Dropping the input without
    /// calling this also deletes an owned file, silently.
    pub fn cleanup(self) -> std::io::Result<()> {
        match self.temp {
            Some(temp) => {
                debug!("Removing temp file {}", self.path.display());
                temp.close()
            }
            None => Ok(()),
        }
    }
}

/// Resolve `descriptor` and validate its format.
///
/// On a format error any temp file created along the way is already gone
/// by the time this returns.
pub async fn resolve(
    descriptor: &FileDescriptor,
    config: &OcrConfig,
) -> Result<ResolvedInput, OcrError> {
    let resolved = materialize(descriptor, config).await?;
    check_format(&resolved, config)?;
    Ok(resolved)
}

/// Resolve `descriptor` to a local file without checking its format.
pub async fn materialize(
    descriptor: &FileDescriptor,
    config: &OcrConfig,
) -> Result<ResolvedInput, OcrError> {
    match descriptor {
        FileDescriptor::Path {
            filepath, filename, ..
        } => Ok(resolve_local(filepath, filename.as_deref())),
        FileDescriptor::Url { url, .. } => {
            ensure_upload_dir(config).await?;
            download_url(url, config).await
        }
        FileDescriptor::Inline {
            base64, filename, ..
        } => {
            ensure_upload_dir(config).await?;
            decode_inline(base64, filename, config).await
        }
    }
}

/// Fail with [`OcrError::UnsupportedFormat`] unless the extension is accepted.
pub fn check_format(resolved: &ResolvedInput, config: &OcrConfig) -> Result<(), OcrError> {
    let extension = resolved.extension();
    if config.is_supported(&extension) {
        Ok(())
    } else {
        Err(OcrError::UnsupportedFormat { extension })
    }
}

async fn ensure_upload_dir(config: &OcrConfig) -> Result<(), OcrError> {
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .map_err(|e| OcrError::io(&config.upload_dir, e))
}

fn new_temp_file(config: &OcrConfig, suffix: &str) -> Result<NamedTempFile, OcrError> {
    tempfile::Builder::new()
        .prefix("ocr_")
        .suffix(suffix)
        .tempfile_in(&config.upload_dir)
        .map_err(|e| OcrError::io(&config.upload_dir, e))
}

/// A caller-supplied path: no I/O, not owned.
fn resolve_local(filepath: &Path, filename: Option<&str>) -> ResolvedInput {
    let filename = filename
        .map(|s| s.to_string())
        .or_else(|| {
            filepath
                .file_name()
                .and_then(|n| n.to_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| UNKNOWN_FILENAME.to_string());

    debug!("Resolved local file: {}", filepath.display());
    ResolvedInput {
        path: filepath.to_path_buf(),
        filename,
        source: format!("filepath://{}", filepath.display()),
        temp: None,
    }
}

/// Stream-download `url` into a temp file inside the upload directory.
async fn download_url(url: &str, config: &OcrConfig) -> Result<ResolvedInput, OcrError> {
    info!("Downloading {}", url);
    let timeout_secs = config.download_timeout_secs;
    let limit = config.max_download_bytes;
    let failed = |reason: String| OcrError::DownloadFailed {
        url: url.to_string(),
        reason,
    };
    let classify = |e: reqwest::Error| {
        if e.is_timeout() {
            OcrError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(classify)?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }
    if response.content_length().is_some_and(|len| len > limit) {
        return Err(OcrError::DownloadTooLarge {
            url: url.to_string(),
            limit,
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_lowercase());
    let (segment, suffix) = url_name_and_suffix(url, content_type.as_deref());

    let temp = new_temp_file(config, &suffix)?;
    let path = temp.path().to_path_buf();
    let handle = temp
        .as_file()
        .try_clone()
        .map_err(|e| OcrError::io(&path, e))?;
    let mut out = tokio::fs::File::from_std(handle);

    let mut written: u64 = 0;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(classify)?;
        written += chunk.len() as u64;
        if written > limit {
            return Err(OcrError::DownloadTooLarge {
                url: url.to_string(),
                limit,
            });
        }
        out.write_all(&chunk)
            .await
            .map_err(|e| OcrError::io(&path, e))?;
    }
    out.flush().await.map_err(|e| OcrError::io(&path, e))?;

    let filename = match secure_filename(&segment) {
        name if name.is_empty() => format!("download{suffix}"),
        name => name,
    };
    info!("Downloaded {} bytes to {}", written, path.display());

    Ok(ResolvedInput {
        path,
        filename,
        source: url.to_string(),
        temp: Some(temp),
    })
}

/// Last path segment of `url` and the temp-file suffix for it.
///
/// The suffix comes from the segment's extension, or failing that from the
/// response content type (`pdf` → `.pdf`, any `image` → `.png`).
fn url_name_and_suffix(url: &str, content_type: Option<&str>) -> (String, String) {
    let segment = reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(|s| s.to_string()))
        })
        .unwrap_or_default();

    let from_path = Path::new(&segment)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()));

    let suffix = from_path.unwrap_or_else(|| match content_type {
        Some(ct) if ct.contains("pdf") => ".pdf".to_string(),
        Some(ct) if ct.contains("image") => ".png".to_string(),
        _ => String::new(),
    });
    (segment, suffix)
}

/// Decode an inline base64 payload into a temp file named after `filename`.
async fn decode_inline(
    payload: &str,
    filename: &str,
    config: &OcrConfig,
) -> Result<ResolvedInput, OcrError> {
    // Accept `data:…;base64,` URLs as well as bare payloads.
    let payload = match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| OcrError::InvalidInput {
            reason: format!("invalid base64 payload: {e}"),
        })?;

    let filename = match secure_filename(filename) {
        name if name.is_empty() => UNKNOWN_FILENAME.to_string(),
        name => name,
    };
    let suffix = Path::new(&filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default();

    let temp = new_temp_file(config, &suffix)?;
    let path = temp.path().to_path_buf();
    let handle = temp
        .as_file()
        .try_clone()
        .map_err(|e| OcrError::io(&path, e))?;
    let mut out = tokio::fs::File::from_std(handle);
    out.write_all(&bytes)
        .await
        .map_err(|e| OcrError::io(&path, e))?;
    out.flush().await.map_err(|e| OcrError::io(&path, e))?;
    debug!("Decoded {} inline bytes to {}", bytes.len(), path.display());

    Ok(ResolvedInput {
        path,
        filename,
        source: INLINE_SOURCE.to_string(),
        temp: Some(temp),
    })
}
