//! Asset optimization: re-encode and optionally downscale a raster

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::info;

use figdiff_common::{write_atomic, Dimensions, Error, Result};

const DEFAULT_JPEG_QUALITY: u8 = 85;
const DEFAULT_PNG_LEVEL: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetFormat {
    Png,
    Jpeg,
    Webp,
}

impl AssetFormat {
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Ok(AssetFormat::Png),
            "jpg" | "jpeg" => Ok(AssetFormat::Jpeg),
            "webp" => Ok(AssetFormat::Webp),
            other => Err(Error::UnsupportedFormat(format!("'{}' (supported: png, jpeg, webp)", other))),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        Self::from_extension(ext)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AssetFormat::Png => "png",
            AssetFormat::Jpeg => "jpg",
            AssetFormat::Webp => "webp",
        }
    }
}

impl std::fmt::Display for AssetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetFormat::Png => write!(f, "png"),
            AssetFormat::Jpeg => write!(f, "jpeg"),
            AssetFormat::Webp => write!(f, "webp"),
        }
    }
}

/// Arguments of the optimize-asset operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeOptions {
    /// Output format; taken from the output extension when unset
    #[serde(default)]
    pub format: Option<AssetFormat>,
    /// JPEG quality, 1-100
    #[serde(default)]
    pub quality: Option<u8>,
    /// PNG deflate effort, 0-9
    #[serde(default)]
    pub compression_level: Option<u8>,
    #[serde(default)]
    pub max_width: Option<u32>,
    #[serde(default)]
    pub max_height: Option<u32>,
}

impl OptimizeOptions {
    pub fn validate(&self) -> Result<()> {
        if let Some(q) = self.quality {
            if !(1..=100).contains(&q) {
                return Err(Error::Validation(format!("quality {} out of range 1..=100", q)));
            }
        }
        if let Some(level) = self.compression_level {
            if level > 9 {
                return Err(Error::Validation(format!("compressionLevel {} out of range 0..=9", level)));
            }
        }
        for (name, value) in [("maxWidth", self.max_width), ("maxHeight", self.max_height)] {
            if value == Some(0) {
                return Err(Error::Validation(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub format: AssetFormat,
    pub original_bytes: u64,
    pub optimized_bytes: u64,
    /// Negative when the output is larger
    pub savings_bytes: i64,
    pub savings_percent: f64,
    pub original_dimensions: Dimensions,
    pub dimensions: Dimensions,
}

/// Re-encode `input` into `output`.
///
/// Formats and numeric options are checked before either file is touched.
pub fn optimize_asset(input: &Path, output: &Path, options: &OptimizeOptions) -> Result<OptimizeResult> {
    options.validate()?;
    AssetFormat::from_path(input)?;
    let format = match options.format {
        Some(format) => format,
        None => AssetFormat::from_path(output)?,
    };

    let original = std::fs::read(input)?;
    let img = image::load_from_memory(&original)?;
    let original_dimensions = Dimensions::new(img.width(), img.height());
    let img = fit_within(img, options.max_width, options.max_height);
    let dimensions = Dimensions::new(img.width(), img.height());

    let encoded = encode(&img, format, options)?;
    let optimized_bytes = write_atomic(output, &encoded)?;
    let original_bytes = original.len() as u64;
    let savings_bytes = original_bytes as i64 - optimized_bytes as i64;
    let savings_percent = if original_bytes == 0 {
        0.0
    } else {
        100.0 * savings_bytes as f64 / original_bytes as f64
    };

    info!(
        "Optimized {} -> {} ({}, {} -> {} bytes, {:.1}% saved)",
        input.display(),
        output.display(),
        format,
        original_bytes,
        optimized_bytes,
        savings_percent
    );

    Ok(OptimizeResult {
        input_path: input.to_path_buf(),
        output_path: output.to_path_buf(),
        format,
        original_bytes,
        optimized_bytes,
        savings_bytes,
        savings_percent,
        original_dimensions,
        dimensions,
    })
}

/// Downscale to fit the bounds, keeping the aspect ratio; never upscales
fn fit_within(img: DynamicImage, max_width: Option<u32>, max_height: Option<u32>) -> DynamicImage {
    let max_w = max_width.unwrap_or(u32::MAX);
    let max_h = max_height.unwrap_or(u32::MAX);
    if img.width() <= max_w && img.height() <= max_h {
        return img;
    }
    img.resize(max_w.min(img.width()), max_h.min(img.height()), FilterType::Lanczos3)
}

/// Encode `img` as `format` with default encoder settings
pub fn encode_image(img: &DynamicImage, format: AssetFormat) -> Result<Vec<u8>> {
    encode(img, format, &OptimizeOptions::default())
}

fn png_compression(level: u8) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

fn encode(img: &DynamicImage, format: AssetFormat, options: &OptimizeOptions) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    match format {
        AssetFormat::Png => {
            let level = options.compression_level.unwrap_or(DEFAULT_PNG_LEVEL);
            let encoder = PngEncoder::new_with_quality(&mut out, png_compression(level), PngFilter::Adaptive);
            img.write_with_encoder(encoder)?;
        }
        AssetFormat::Jpeg => {
            let quality = options.quality.unwrap_or(DEFAULT_JPEG_QUALITY);
            let encoder = JpegEncoder::new_with_quality(&mut out, quality);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
        }
        AssetFormat::Webp => {
            let encoder = WebPEncoder::new_lossless(&mut out);
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)?;
        }
    }
    Ok(out.into_inner())
}
