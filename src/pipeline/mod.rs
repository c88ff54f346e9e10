//! Pipeline stages for recognising one file.
//!
//! Each submodule implements exactly one transformation step, so each is
//! independently testable and the rasteriser or engine can be swapped
//! without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ recognize ──▶ encode
//! (path/URL/  (pdfium,   (engine +     (preview
//!  base64)    PDF only)  word filter)   data-URL)
//! ```
//!
//! 1. [`input`]  — resolve a descriptor to a local file, owning any temp file
//!    it had to create, and validate the format
//! 2. [`render`] — rasterise every PDF page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`recognize`] — hand each page image to the engine and keep only
//!    non-blank words
//! 4. [`encode`] — PNG encoding for the engine and data-URL previews for
//!    image inputs

pub mod encode;
pub mod input;
pub mod recognize;
pub mod render;
