//! # cbr2pdf
//!
//! Convert comic-book archives (CBR/CBZ/CBT, optionally CB7) into PDFs sized for an e-reader
//! screen.
//!
//! ## Why this crate?
//!
//! E-readers render a full-resolution comic scan by scaling it on the fly,
//! which is slow on e-ink hardware and wastes storage. This crate resamples
//! every page once, ahead of time, to the reader's pixel dimensions and
//! writes one PDF page per image, with the physical page size derived from
//! the pixel size so the reader shows each page at 1:1.
//!
//! ## Pipeline Overview
//!
//! ```text
//! CBZ / CBR / CBT / CB7
//!  │
//!  ├─ 1. Extract   unpack into a run-scoped scratch directory
//!  ├─ 2. Locate    collect .jpg/.jpeg/.png, sort into reading order
//!  ├─ 3. Render    decode → Lanczos3 resample → JPEG (one page at a time)
//!  ├─ 4. Assemble  append each page to the in-memory document
//!  └─ 5. Finalize  write the PDF atomically, remove the scratch directory
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cbr2pdf::{convert, default_destination, ConversionConfig, Resolution};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .resolution(Resolution::from_env()?)
//!         .build()?;
//!     let source = "Watchmen 01.cbz";
//!     let output = convert(source, default_destination(source), &config).await?;
//!     eprintln!("{} pages → {}", output.stats.appended_pages, output.destination.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `cbr2pdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//! | `rar`   | on      | RAR/CBR extraction through `unrar` (bundles the C++ unrar sources) |
//! | `sevenz` | off    | 7z/CB7 extraction through `sevenz-rust` |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! cbr2pdf = { version = "0.1", default-features = false, features = ["rar"] }
//! ```
//!
//! ## Common Resolutions
//!
//! | Device | Width | Height |
//! |--------|-------|--------|
//! | Pocketbook Touch HD 3 (default) | 1072 | 1448 |
//! | Pocketbook Touch Lux 4 | 758 | 1024 |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, FailurePolicy, PageOrder, Resolution,
    DEFAULT_HEIGHT, DEFAULT_WIDTH, HEIGHT_ENV, WIDTH_ENV,
};
pub use convert::{convert, convert_sync, default_destination, inspect};
pub use error::{Cbr2PdfError, PageError};
pub use output::{ArchiveInspection, ConversionOutput, ConversionStats, PageResult};
pub use pipeline::assemble::{DocumentBackend, DocumentWriter};
pub use pipeline::encode::{EncodedImage, ImageCodec, PageColorSpace};
pub use pipeline::extract::ArchiveExtractor;
pub use pipeline::locate::{locate_images, ImageReference};
pub use pipeline::render::{
    page_size_points, target_dimensions, RenderedPage, RenderedPageInfo, Resampler,
    PAGE_DENSITY_DIVISOR,
};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
