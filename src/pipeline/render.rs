//! Page rendering: one source image → one page-sized JPEG.
//!
//! ## Binding axis
//!
//! Portrait images (`W < H`) are scaled so their height equals the target
//! height; the width follows the aspect ratio and may end up wider or
//! narrower than the screen. Landscape and square images bind the width
//! instead. Nothing is cropped or padded.
//!
//! ## Page size
//!
//! The physical page is the resampled pixel size divided by
//! [`PAGE_DENSITY_DIVISOR`], giving PDF points. The divisor is fixed: it
//! encodes the nominal density relationship between reader pixels and
//! points, not a user preference.

use crate::config::{ConversionConfig, Resolution};
use crate::error::PageError;
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::locate::ImageReference;
use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use crate::pipeline::encode::{ImageCodec, ImageCrateCodec};

/// Pixels per PDF point on the output page.
pub const PAGE_DENSITY_DIVISOR: f32 = 1.78;

/// Scales a decoded image to exact dimensions.
pub trait Resampler: Send + Sync {
    fn resample(&self, image: &DynamicImage, width: u32, height: u32)
        -> Result<DynamicImage, String>;
}

/// Production resampler: Lanczos3 via `image::imageops`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LanczosResampler;

impl Resampler for LanczosResampler {
    fn resample(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, String> {
        if width == 0 || height == 0 {
            return Err(format!("target size {width}x{height} is empty"));
        }
        Ok(image.resize_exact(width, height, FilterType::Lanczos3))
    }
}

/// Pixel and physical dimensions of a rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderedPageInfo {
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub page_width_pt: f32,
    pub page_height_pt: f32,
}

/// A page ready to be appended: encoded pixels plus their page size.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub source: ImageReference,
    pub image: EncodedImage,
    pub info: RenderedPageInfo,
}

/// Dimensions after binding the long axis of a `width`×`height` image to
/// `target`.
///
/// The free axis is rounded half-up and never drops below one pixel.
pub fn target_dimensions(width: u32, height: u32, target: Resolution) -> (u32, u32) {
    if width < height {
        (scale_axis(width, height, target.height), target.height)
    } else {
        (target.width, scale_axis(height, width, target.width))
    }
}

/// `free * target / bound`, rounded, in 64-bit to avoid overflow.
fn scale_axis(free: u32, bound: u32, target: u32) -> u32 {
    if bound == 0 || target == 0 {
        return 0;
    }
    let (free, bound, target) = (u64::from(free), u64::from(bound), u64::from(target));
    let scaled = (free * target + bound / 2) / bound;
    scaled.clamp(1, u64::from(u32::MAX)) as u32
}

/// Physical page size in points for a resampled pixel size.
pub fn page_size_points(pixel_width: u32, pixel_height: u32) -> (f32, f32) {
    (
        pixel_width as f32 / PAGE_DENSITY_DIVISOR,
        pixel_height as f32 / PAGE_DENSITY_DIVISOR,
    )
}

/// Decode, scale, and re-encode one source image.
///
/// Every failure is attributed to `source` so the orchestrator can report
/// which page broke.
pub fn render_page(
    source: &ImageReference,
    config: &ConversionConfig,
) -> Result<RenderedPage, PageError> {
    let path = &source.path;

    let bytes = std::fs::read(path).map_err(|e| PageError::Read {
        path: path.clone(),
        detail: e.to_string(),
    })?;

    let decoded = config.codec.decode(&bytes).map_err(|detail| PageError::Decode {
        path: path.clone(),
        detail,
    })?;
    drop(bytes);

    let (src_w, src_h) = (decoded.width(), decoded.height());
    let (dst_w, dst_h) = target_dimensions(src_w, src_h, config.resolution);

    let resampled = config
        .resampler
        .resample(&decoded, dst_w, dst_h)
        .map_err(|detail| PageError::Resample {
            path: path.clone(),
            detail,
        })?;
    drop(decoded);

    let image = config
        .codec
        .encode(&resampled, config.jpeg_quality)
        .map_err(|detail| PageError::Encode {
            path: path.clone(),
            detail,
        })?;

    let (pixel_width, pixel_height) = (resampled.width(), resampled.height());
    let (page_width_pt, page_height_pt) = page_size_points(pixel_width, pixel_height);

    debug!(
        "Rendered page {} {}x{} → {}x{} px ({:.1}x{:.1} pt)",
        source.page_num(),
        src_w,
        src_h,
        pixel_width,
        pixel_height,
        page_width_pt,
        page_height_pt
    );

    Ok(RenderedPage {
        source: source.clone(),
        image,
        info: RenderedPageInfo {
            pixel_width,
            pixel_height,
            page_width_pt,
            page_height_pt,
        },
    })
}
