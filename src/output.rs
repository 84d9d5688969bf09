//! Result types returned by the conversion entry points.
//!
//! Everything here is `Serialize` so the CLI can emit it with `--json` and
//! library callers can log or persist a run summary.

use crate::error::PageError;
use crate::pipeline::render::RenderedPageInfo;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of one source image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed position in reading order.
    pub page_num: usize,
    /// Path of the image inside the archive.
    pub source: PathBuf,
    /// Dimensions of the appended page; `None` if the page was skipped.
    pub info: Option<RenderedPageInfo>,
    /// Why the page was skipped (only under `FailurePolicy::SkipPage`).
    pub error: Option<PageError>,
}

impl PageResult {
    pub fn is_appended(&self) -> bool {
        self.error.is_none()
    }
}

/// Counters and timings for a finished run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Supported images found in the archive.
    pub total_images: usize,
    /// Pages present in the written document.
    pub appended_pages: usize,
    /// Images left out under `FailurePolicy::SkipPage`.
    pub skipped_pages: usize,
    /// Size of the written PDF.
    pub output_bytes: u64,
    pub extract_duration_ms: u64,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// A successful conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub destination: PathBuf,
    pub pages: Vec<PageResult>,
    pub stats: ConversionStats,
}

/// Pages of an archive in reading order, without rendering anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveInspection {
    pub source: PathBuf,
    /// Archive-internal image paths, in page order.
    pub pages: Vec<PathBuf>,
}

impl ArchiveInspection {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}
