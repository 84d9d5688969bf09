//! Image codec backed by the `image` crate.
//!
//! Pages are re-encoded as baseline JPEG so the PDF writer can embed the
//! bytes verbatim behind a `DCTDecode` filter, with no second compression
//! pass. Grayscale scans stay single-channel, which roughly thirds their
//! size compared to promoting them to RGB. Alpha is dropped: an e-ink page
//! has nothing to composite against.

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ExtendedColorType, ImageEncoder};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Decodes source images and encodes resampled pages.
pub trait ImageCodec: Send + Sync {
    /// Decode raw file bytes into a pixel grid.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, String>;

    /// Encode a pixel grid as an embeddable JPEG stream.
    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<EncodedImage, String>;
}

/// Colour model of an encoded page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageColorSpace {
    Gray,
    Rgb,
}

impl PageColorSpace {
    /// PDF colour-space name for the image XObject.
    pub fn pdf_name(self) -> &'static str {
        match self {
            PageColorSpace::Gray => "DeviceGray",
            PageColorSpace::Rgb => "DeviceRGB",
        }
    }
}

/// A JPEG byte stream plus the facts the PDF writer needs about it.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub color_space: PageColorSpace,
}

/// Production codec: decodes JPEG/PNG, encodes JPEG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateCodec;

impl ImageCodec for ImageCrateCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, String> {
        image::load_from_memory(bytes).map_err(|e| e.to_string())
    }

    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<EncodedImage, String> {
        let (width, height) = (image.width(), image.height());
        let mut data = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut data, quality);

        let color_space = if is_grayscale(image.color()) {
            let gray = image.to_luma8();
            encoder
                .write_image(gray.as_raw(), width, height, ExtendedColorType::L8)
                .map_err(|e| e.to_string())?;
            PageColorSpace::Gray
        } else {
            let rgb = image.to_rgb8();
            encoder
                .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                .map_err(|e| e.to_string())?;
            PageColorSpace::Rgb
        };

        debug!(
            "Encoded {}x{} {:?} page → {} bytes JPEG",
            width,
            height,
            color_space,
            data.len()
        );

        Ok(EncodedImage {
            data,
            width,
            height,
            color_space,
        })
    }
}

fn is_grayscale(color: ColorType) -> bool {
    matches!(
        color,
        ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16
    )
}
