//! Conversion entry points: the run-level state machine.
//!
//! ```text
//! VALIDATE → EXTRACT → LOCATE → RENDER_APPEND(1..n) → FINALIZE → DONE
//!     │          │         │             │                 │
//!     └──────────┴─────────┴─────────────┴─────────────────┴──▶ FAILED
//! ```
//!
//! Pages are rendered and appended strictly one at a time in locator
//! order, so only one decoded image is alive at any instant and the page
//! order of the document is exactly the locator order. The scratch
//! workspace is released on every exit path from EXTRACT onward.

use crate::config::{ConversionConfig, FailurePolicy};
use crate::error::Cbr2PdfError;
use crate::output::{ArchiveInspection, ConversionOutput, ConversionStats, PageResult};
use crate::pipeline::assemble::Document;
use crate::pipeline::extract::ScratchWorkspace;
use crate::pipeline::locate::{locate_images, ImageReference};
use crate::pipeline::render::render_page;
use crate::progress::{ConversionProgressCallback, NoopProgressCallback};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// File extension of the produced document.
pub const OUTPUT_EXTENSION: &str = "pdf";

/// Destination used when the caller names none: the source with its
/// extension replaced by `.pdf` (or `.pdf` appended if it has none).
pub fn default_destination(source: impl AsRef<Path>) -> PathBuf {
    source.as_ref().with_extension(OUTPUT_EXTENSION)
}

/// Reject a destination that would overwrite the source archive.
///
/// The lexical comparison needs no filesystem access. When both paths
/// already exist they are also compared after canonicalisation, which
/// catches `./book.cbz` vs `book.cbz` and symlinks.
pub fn validate_paths(source: &Path, destination: &Path) -> Result<(), Cbr2PdfError> {
    let same = source == destination
        || matches!(
            (source.canonicalize(), destination.canonicalize()),
            (Ok(a), Ok(b)) if a == b
        );
    if same {
        return Err(Cbr2PdfError::SameSourceAndDestination {
            path: destination.to_path_buf(),
        });
    }
    Ok(())
}

/// Convert a comic archive to a PDF at `destination`.
///
/// The blocking pipeline runs on tokio's blocking pool; see
/// [`convert_sync`] for the semantics.
pub async fn convert(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Cbr2PdfError> {
    let source = source.as_ref().to_path_buf();
    let destination = destination.as_ref().to_path_buf();
    let config = config.clone();

    tokio::task::spawn_blocking(move || convert_sync(&source, &destination, &config))
        .await
        .map_err(|e| Cbr2PdfError::Internal(format!("Conversion task panicked: {}", e)))?
}

/// Convert a comic archive to a PDF at `destination`, blocking the
/// current thread.
///
/// # Errors
/// Every failure is fatal to the run and no document is written:
/// - source equals destination
/// - the archive is missing, unsupported, or corrupt
/// - the archive contains no supported images
/// - a page fails to render (unless `FailurePolicy::SkipPage` is set)
/// - the document cannot be serialised or written
pub fn convert_sync(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Cbr2PdfError> {
    let total_start = Instant::now();
    let source = source.as_ref();
    let destination = destination.as_ref();

    // ── VALIDATE ─────────────────────────────────────────────────────────
    validate_paths(source, destination)?;
    info!(
        "Converting {} → {} at {}",
        source.display(),
        destination.display(),
        config.resolution
    );

    // ── EXTRACT .. FINALIZE inside a scoped workspace ───────────────────
    let scratch = ScratchWorkspace::create(config.scratch_root.as_deref(), source)?;
    let result = run_in_workspace(source, destination, &scratch, config, total_start);
    scratch.close();
    result
}

/// List the pages of an archive in reading order without rendering them.
pub async fn inspect(
    source: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ArchiveInspection, Cbr2PdfError> {
    let source = source.as_ref().to_path_buf();
    let config = config.clone();

    tokio::task::spawn_blocking(move || inspect_blocking(&source, &config))
        .await
        .map_err(|e| Cbr2PdfError::Internal(format!("Inspect task panicked: {}", e)))?
}

fn inspect_blocking(
    source: &Path,
    config: &ConversionConfig,
) -> Result<ArchiveInspection, Cbr2PdfError> {
    let scratch = ScratchWorkspace::create(config.scratch_root.as_deref(), source)?;
    let result = extract_and_locate(source, &scratch, config).map(|images| ArchiveInspection {
        source: source.to_path_buf(),
        pages: images
            .iter()
            .map(|image| archive_path(&scratch, image))
            .collect(),
    });
    scratch.close();
    result
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// EXTRACT + LOCATE; zero images is an error here.
fn extract_and_locate(
    source: &Path,
    scratch: &ScratchWorkspace,
    config: &ConversionConfig,
) -> Result<Vec<ImageReference>, Cbr2PdfError> {
    config.extractor.extract(source, scratch.path())?;

    let images = locate_images(scratch.path(), config.page_order)?;
    if images.is_empty() {
        return Err(Cbr2PdfError::EmptyArchive {
            path: source.to_path_buf(),
        });
    }
    info!("Found {} pages in {}", images.len(), source.display());
    Ok(images)
}

/// Image path relative to the workspace, i.e. as stored in the archive.
fn archive_path(scratch: &ScratchWorkspace, image: &ImageReference) -> PathBuf {
    image
        .path
        .strip_prefix(scratch.path())
        .unwrap_or(&image.path)
        .to_path_buf()
}

fn run_in_workspace(
    source: &Path,
    destination: &Path,
    scratch: &ScratchWorkspace,
    config: &ConversionConfig,
    total_start: Instant,
) -> Result<ConversionOutput, Cbr2PdfError> {
    let progress: &dyn ConversionProgressCallback = config
        .progress_callback
        .as_deref()
        .unwrap_or(&NoopProgressCallback);

    // ── EXTRACT + LOCATE ─────────────────────────────────────────────────
    let extract_start = Instant::now();
    let images = extract_and_locate(source, scratch, config)?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    let total = images.len();
    progress.on_conversion_start(total);

    // ── RENDER_APPEND ────────────────────────────────────────────────────
    let title = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut document = Document::create(config.backend.as_ref(), &title);
    let mut pages: Vec<PageResult> = Vec::with_capacity(total);
    let mut first_error: Option<String> = None;

    let render_start = Instant::now();
    for image in &images {
        let page_num = image.page_num();
        let shown = archive_path(scratch, image);
        progress.on_page_start(page_num, total, &shown);

        let outcome = render_page(image, config).and_then(|page| {
            let info = page.info;
            document.append_page(page).map(|()| info)
        });

        match outcome {
            Ok(info) => {
                progress.on_page_complete(page_num, total, &info);
                pages.push(PageResult {
                    page_num,
                    source: shown,
                    info: Some(info),
                    error: None,
                });
            }
            Err(e) => {
                progress.on_page_error(page_num, total, &shown, &e.to_string());
                match config.failure_policy {
                    FailurePolicy::Abort => {
                        return Err(Cbr2PdfError::PageFailed {
                            page: page_num,
                            total,
                            path: shown,
                            source: e,
                        });
                    }
                    FailurePolicy::SkipPage => {
                        warn!("Skipping page {}/{} ({}): {}", page_num, total, shown.display(), e);
                        first_error.get_or_insert_with(|| e.to_string());
                        pages.push(PageResult {
                            page_num,
                            source: shown,
                            info: None,
                            error: Some(e),
                        });
                    }
                }
            }
        }
    }
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    let appended = document.page_count();
    if appended == 0 {
        return Err(Cbr2PdfError::NoPagesRendered {
            total,
            first_error: first_error.unwrap_or_else(|| "Unknown error".to_string()),
        });
    }
    debug!("Appended {}/{} pages in {}ms", appended, total, render_duration_ms);

    // ── FINALIZE ─────────────────────────────────────────────────────────
    progress.on_finalize_start(destination);
    let output_bytes = document.finalize(destination)?;
    progress.on_conversion_complete(total, appended);

    let stats = ConversionStats {
        total_images: total,
        appended_pages: appended,
        skipped_pages: total - appended,
        output_bytes,
        extract_duration_ms,
        render_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Conversion complete: {}/{} pages, {} bytes, {}ms total",
        appended, total, output_bytes, stats.total_duration_ms
    );

    Ok(ConversionOutput {
        destination: destination.to_path_buf(),
        pages,
        stats,
    })
}
