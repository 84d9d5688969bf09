//! Error types for the cbr2pdf library.
//!
//! Two distinct error types reflect two distinct failure scopes:
//!
//! * [`Cbr2PdfError`] — **Fatal**: the run cannot produce a document
//!   (bad configuration, unreadable archive, no pages, write failure).
//!   Returned as `Err(Cbr2PdfError)` from the top-level `convert*` functions.
//!
//! * [`PageError`] — a single page could not be read, decoded, resampled,
//!   encoded or appended. Under the default
//!   [`crate::config::FailurePolicy::Abort`] it is wrapped into
//!   [`Cbr2PdfError::PageFailed`] and ends the run; under
//!   [`crate::config::FailurePolicy::SkipPage`] it is stored inside
//!   [`crate::output::PageResult`] instead.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the cbr2pdf library.
#[derive(Debug, Error)]
pub enum Cbr2PdfError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// An environment override is present but is not an unsigned integer.
    #[error("{key} has invalid value: {value}")]
    InvalidEnvironment { key: String, value: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Validation errors ─────────────────────────────────────────────────
    /// Source and destination name the same file.
    #[error("Source file must not be equal to destination file: '{path}'")]
    SameSourceAndDestination { path: PathBuf },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// Source archive does not exist.
    #[error("Archive not found: '{path}'\nCheck the path exists and is readable.")]
    ArchiveNotFound { path: PathBuf },

    /// The file exists but is neither a ZIP nor a RAR container.
    #[error("Unsupported archive format: '{path}'\nFirst bytes: {magic:?}")]
    UnsupportedArchive { path: PathBuf, magic: Vec<u8> },

    /// The extractor failed (corrupt archive, I/O error while unpacking).
    #[error("Failed to extract '{path}': {detail}")]
    ExtractionFailed { path: PathBuf, detail: String },

    /// The run-scoped scratch directory could not be created.
    #[error("Failed to create scratch workspace: {source}")]
    ScratchUnavailable {
        #[source]
        source: std::io::Error,
    },

    // ── Locate errors ─────────────────────────────────────────────────────
    /// Walking the extracted tree failed.
    #[error("Failed to scan extracted files under '{root}': {source}")]
    LocateFailed {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// The archive extracted fine but holds no supported images.
    #[error("'{path}' contains no pages (no .jpg/.jpeg/.png images found)")]
    EmptyArchive { path: PathBuf },

    // ── Page errors ───────────────────────────────────────────────────────
    /// A page failed and the failure policy is `Abort`.
    #[error("Failed to add image '{path}' (page {page}/{total}): {source}")]
    PageFailed {
        page: usize,
        total: usize,
        path: PathBuf,
        #[source]
        source: PageError,
    },

    /// Every page was skipped under `SkipPage`; there is nothing to write.
    #[error("All {total} pages failed; no document was written.\nFirst error: {first_error}")]
    NoPagesRendered { total: usize, first_error: String },

    // ── Finalize errors ───────────────────────────────────────────────────
    /// The document could not be serialised.
    #[error("Failed to generate document '{path}': {detail}")]
    FinalizeFailed { path: PathBuf, detail: String },

    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Cbr2PdfError {
    /// `true` for errors raised before any conversion work begins because
    /// the configuration itself is unusable.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Cbr2PdfError::InvalidEnvironment { .. } | Cbr2PdfError::InvalidConfig(_)
        )
    }
}

/// A failure confined to one source image.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The image file could not be read from the scratch workspace.
    #[error("cannot read {path:?}: {detail}")]
    Read { path: PathBuf, detail: String },

    /// The image bytes are not a decodable picture.
    #[error("cannot decode {path:?}: {detail}")]
    Decode { path: PathBuf, detail: String },

    /// Resampling to the target dimensions failed.
    #[error("cannot resample {path:?}: {detail}")]
    Resample { path: PathBuf, detail: String },

    /// Re-encoding the resampled pixels failed.
    #[error("cannot encode {path:?}: {detail}")]
    Encode { path: PathBuf, detail: String },

    /// The document writer rejected the page.
    #[error("cannot append {path:?}: {detail}")]
    Append { path: PathBuf, detail: String },
}

impl PageError {
    /// Path of the source image this error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            PageError::Read { path, .. }
            | PageError::Decode { path, .. }
            | PageError::Resample { path, .. }
            | PageError::Encode { path, .. }
            | PageError::Append { path, .. } => path,
        }
    }
}
