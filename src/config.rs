//! Configuration types for comic-archive-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The target screen [`Resolution`] is an
//! explicit value passed into the pipeline rather than process-wide state, so
//! two conversions with different resolutions can run side by side.
//!
//! # Environment overrides
//!
//! The binary resolves the resolution from two variables, [`WIDTH_ENV`] and
//! [`HEIGHT_ENV`], before any conversion work starts. A present but
//! unparsable value is a fatal [`Cbr2PdfError::InvalidEnvironment`].

use crate::error::Cbr2PdfError;
use crate::pipeline::assemble::{DocumentBackend, LopdfBackend};
use crate::pipeline::extract::{ArchiveExtractor, DefaultExtractor};
use crate::pipeline::render::{ImageCodec, ImageCrateCodec, LanczosResampler, Resampler};
use crate::progress::{ConversionProgressCallback, ProgressCallback};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default horizontal resolution (Pocketbook Touch HD 3).
pub const DEFAULT_WIDTH: u32 = 1072;

/// Default vertical resolution (Pocketbook Touch HD 3).
pub const DEFAULT_HEIGHT: u32 = 1448;

/// Environment variable overriding the target width in pixels.
pub const WIDTH_ENV: &str = "WIDTH";

/// Environment variable overriding the target height in pixels.
pub const HEIGHT_ENV: &str = "HEIGHT";

/// Default JPEG quality used when re-encoding resampled pages.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Target e-reader screen size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Resolve the resolution from the process environment.
    pub fn from_env() -> Result<Self, Cbr2PdfError> {
        Self::from_lookup(|key| std::env::var_os(key).map(|v| v.to_string_lossy().into_owned()))
    }

    /// Resolve the resolution through an arbitrary variable lookup.
    ///
    /// Each axis falls back to its default when the variable is absent.
    /// Zero and very large values are accepted here; only the syntax is
    /// checked. Values past `u32::MAX` saturate.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Cbr2PdfError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let width = parse_axis(WIDTH_ENV, lookup(WIDTH_ENV))?.unwrap_or(DEFAULT_WIDTH);
        let height = parse_axis(HEIGHT_ENV, lookup(HEIGHT_ENV))?.unwrap_or(DEFAULT_HEIGHT);
        Ok(Self { width, height })
    }
}

/// Parse one override as an unsigned 64-bit base-10 integer, saturating to
/// the `u32` pixel range.
fn parse_axis(key: &str, value: Option<String>) -> Result<Option<u32>, Cbr2PdfError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let invalid = || Cbr2PdfError::InvalidEnvironment {
        key: key.to_string(),
        value: value.clone(),
    };
    // `u32::from_str` tolerates a leading '+'; an override must be digits only.
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let parsed = value.parse::<u64>().map_err(|_| invalid())?;
    Ok(Some(u32::try_from(parsed).unwrap_or(u32::MAX)))
}

// ── Policies ─────────────────────────────────────────────────────────────

/// How extracted image paths are ordered into pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageOrder {
    /// Case-insensitive comparison of the full path string (default).
    ///
    /// `"10.jpg"` sorts before `"2.jpg"`; archives with zero-padded names
    /// (`"002.jpg"`, `"010.jpg"`) come out in reading order.
    #[default]
    Lexicographic,
    /// Like `Lexicographic`, but runs of digits compare by numeric value,
    /// so `"2.jpg"` sorts before `"10.jpg"`.
    Natural,
}

/// What to do when a single page cannot be rendered or appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Stop at the first failing page; no document is written (default).
    #[default]
    Abort,
    /// Report the failing page, leave it out, and keep going.
    SkipPage,
}

// ── Config ───────────────────────────────────────────────────────────────

/// Configuration for one archive-to-PDF conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use cbr2pdf::{ConversionConfig, PageOrder, Resolution};
///
/// let config = ConversionConfig::builder()
///     .resolution(Resolution::new(758, 1024))
///     .page_order(PageOrder::Natural)
///     .build()
///     .unwrap();
/// assert_eq!(config.resolution.width, 758);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Target screen size. Portrait pages are bound to `height`, landscape
    /// and square pages to `width`. Default: 1072×1448.
    pub resolution: Resolution,

    /// Page ordering policy. Default: [`PageOrder::Lexicographic`].
    pub page_order: PageOrder,

    /// Per-page failure handling. Default: [`FailurePolicy::Abort`].
    pub failure_policy: FailurePolicy,

    /// JPEG quality (1–100) for re-encoded pages. Default: 90.
    pub jpeg_quality: u8,

    /// Parent directory for the run's scratch workspace.
    /// If None, uses the system temp directory.
    pub scratch_root: Option<PathBuf>,

    /// Optional per-page progress callback.
    pub progress_callback: Option<ProgressCallback>,

    /// Unpacks the source archive into the scratch workspace.
    pub extractor: Arc<dyn ArchiveExtractor>,

    /// Decodes source images and re-encodes resampled pages.
    pub codec: Arc<dyn ImageCodec>,

    /// Scales decoded images to their target dimensions.
    pub resampler: Arc<dyn Resampler>,

    /// Creates the accumulating output document.
    pub backend: Arc<dyn DocumentBackend>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            page_order: PageOrder::default(),
            failure_policy: FailurePolicy::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            scratch_root: None,
            progress_callback: None,
            extractor: Arc::new(DefaultExtractor),
            codec: Arc::new(ImageCrateCodec),
            resampler: Arc::new(LanczosResampler),
            backend: Arc::new(LopdfBackend),
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("resolution", &self.resolution)
            .field("page_order", &self.page_order)
            .field("failure_policy", &self.failure_policy)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("scratch_root", &self.scratch_root)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish_non_exhaustive()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.config.resolution = resolution;
        self
    }

    pub fn page_order(mut self, order: PageOrder) -> Self {
        self.config.page_order = order;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_root = Some(dir.into());
        self
    }

    /// Attach a progress callback.
    pub fn progress_callback(mut self, cb: Arc<dyn ConversionProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn ArchiveExtractor>) -> Self {
        self.config.extractor = extractor;
        self
    }

    pub fn codec(mut self, codec: Arc<dyn ImageCodec>) -> Self {
        self.config.codec = codec;
        self
    }

    pub fn resampler(mut self, resampler: Arc<dyn Resampler>) -> Self {
        self.config.resampler = resampler;
        self
    }

    pub fn backend(mut self, backend: Arc<dyn DocumentBackend>) -> Self {
        self.config.backend = backend;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Cbr2PdfError> {
        let r = self.config.resolution;
        if r.width == 0 || r.height == 0 {
            return Err(Cbr2PdfError::InvalidConfig(format!(
                "resolution must be positive on both axes, got {r}"
            )));
        }
        Ok(self.config)
    }
}
