//! Pixel comparison
//!
//! Perceptual per-pixel comparison in YIQ space with anti-aliasing
//! detection. Anti-aliased pixels are detected from the images alone, so the
//! diff set only ever shrinks as the threshold grows.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use tracing::{info, warn};

use figdiff_common::config::{check_threshold, DEFAULT_MAX_THRESHOLD, SUPPORTED_EXTENSIONS};
use figdiff_common::{ComparisonResult, Dimensions, DiffMask, Error, ImageMeta, ResizeInfo, Result};

/// Largest YIQ delta between two colors
const MAX_YIQ_DELTA: f64 = 35215.0;

/// Upper bound on the compared raster, in pixels
const MAX_COMPARE_PIXELS: u64 = 200_000_000;

/// Largest relative aspect-ratio difference that is still rescaled
const ASPECT_TOLERANCE: f64 = 0.02;

/// Opacity of the expected image under the diff overlay
const DIFF_BACKDROP_ALPHA: f64 = 0.1;

const DIFF_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const AA_COLOR: Rgba<u8> = Rgba([255, 255, 0, 255]);

/// Compares a rendered image against its reference
#[derive(Debug, Clone, Copy)]
pub struct PixelComparator {
    threshold: f64,
}

impl PixelComparator {
    /// Create a comparator; rejects thresholds outside `[0, 1]` or above `ceiling`
    pub fn new(threshold: f64, ceiling: f64) -> Result<Self> {
        check_threshold(threshold, ceiling)?;
        Ok(Self { threshold })
    }

    /// Comparator bounded by the default threshold ceiling
    pub fn with_threshold(threshold: f64) -> Result<Self> {
        Self::new(threshold, DEFAULT_MAX_THRESHOLD)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Compare two decoded images.
    ///
    /// When sizes differ the smaller image is scaled to the larger with
    /// nearest-neighbor sampling before comparing. Images whose aspect ratios
    /// differ by more than 2% cannot be aligned and yield a comparison error.
    pub fn compare(&self, actual: &DynamicImage, expected: &DynamicImage) -> Result<ComparisonResult> {
        self.compare_labeled(actual, expected, None, None)
    }

    /// Decode and compare two image files.
    pub fn compare_files(&self, actual_path: &Path, expected_path: &Path) -> Result<ComparisonResult> {
        check_extension(actual_path)?;
        check_extension(expected_path)?;

        let actual_bytes = std::fs::read(actual_path)?;
        let expected_bytes = std::fs::read(expected_path)?;

        let actual = decode(&actual_bytes, "actual", actual_path, expected_path)?;
        let expected = decode(&expected_bytes, "expected", actual_path, expected_path)?;

        self.compare_labeled(&actual, &expected, Some(actual_path), Some(expected_path))
    }

    fn compare_labeled(
        &self,
        actual: &DynamicImage,
        expected: &DynamicImage,
        actual_path: Option<&Path>,
        expected_path: Option<&Path>,
    ) -> Result<ComparisonResult> {
        let actual_meta = meta("actual", actual, actual_path);
        let expected_meta = meta("expected", expected, expected_path);
        let mismatch = |reason: String| Error::Comparison {
            reason,
            actual: actual_meta.clone(),
            expected: expected_meta.clone(),
        };

        let actual_dims = Dimensions::new(actual.width(), actual.height());
        let expected_dims = Dimensions::new(expected.width(), expected.height());
        if actual_dims.total_pixels() == 0 || expected_dims.total_pixels() == 0 {
            return Err(mismatch("cannot compare an empty image".to_string()));
        }

        let (actual, expected, resized) = if actual_dims == expected_dims {
            (actual.to_rgba8(), expected.to_rgba8(), None)
        } else {
            if !same_aspect(actual_dims, expected_dims) {
                return Err(mismatch(format!(
                    "aspect ratios differ ({} vs {}); export the reference at the component's proportions",
                    actual_dims, expected_dims
                )));
            }
            let target = if actual_dims.total_pixels() >= expected_dims.total_pixels() {
                actual_dims
            } else {
                expected_dims
            };
            if target.total_pixels() > MAX_COMPARE_PIXELS {
                return Err(mismatch(format!("comparison size {} exceeds the pixel limit", target)));
            }
            warn!(
                "Image sizes differ ({} vs {}), comparing at {} with nearest-neighbor scaling",
                actual_dims, expected_dims, target
            );
            let resize = ResizeInfo {
                actual: actual_dims,
                expected: expected_dims,
                compared_at: target,
            };
            (
                scale_to(actual, target),
                scale_to(expected, target),
                Some(resize),
            )
        };

        let result = diff(&actual, &expected, self.threshold, resized);
        info!(
            "Compared {}: {:.2}% match, {} of {} pixels differ ({})",
            result.dimensions(),
            result.match_percentage(),
            result.diff_pixel_count(),
            result.total_pixel_count(),
            result.quality_tier()
        );
        Ok(result)
    }
}

fn same_aspect(a: Dimensions, b: Dimensions) -> bool {
    let ratio_a = f64::from(a.width) / f64::from(a.height);
    let ratio_b = f64::from(b.width) / f64::from(b.height);
    (ratio_a - ratio_b).abs() / ratio_a.max(ratio_b) <= ASPECT_TOLERANCE
}

fn check_extension(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(Error::UnsupportedFormat(format!(
            "{} (supported: {})",
            path.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        )))
    }
}

fn decode(bytes: &[u8], side: &str, actual_path: &Path, expected_path: &Path) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| Error::Comparison {
        reason: format!("failed to decode {} image: {}", side, e),
        actual: ImageMeta {
            label: "actual".to_string(),
            width: 0,
            height: 0,
            path: Some(actual_path.to_path_buf()),
        },
        expected: ImageMeta {
            label: "expected".to_string(),
            width: 0,
            height: 0,
            path: Some(expected_path.to_path_buf()),
        },
    })
}

fn meta(label: &str, img: &DynamicImage, path: Option<&Path>) -> ImageMeta {
    ImageMeta {
        label: label.to_string(),
        width: img.width(),
        height: img.height(),
        path: path.map(Path::to_path_buf),
    }
}

fn scale_to(img: &DynamicImage, target: Dimensions) -> RgbaImage {
    let rgba = img.to_rgba8();
    if rgba.dimensions() == (target.width, target.height) {
        rgba
    } else {
        imageops::resize(&rgba, target.width, target.height, FilterType::Nearest)
    }
}

/// Compare two equally sized images and render the diff overlay
fn diff(actual: &RgbaImage, expected: &RgbaImage, threshold: f64, resized: Option<ResizeInfo>) -> ComparisonResult {
    let (width, height) = expected.dimensions();
    let mut mask = DiffMask::new(width, height);
    let mut diff_image = RgbaImage::new(width, height);
    let mut antialiased = 0u64;

    if actual.as_raw() == expected.as_raw() {
        for (x, y, px) in expected.enumerate_pixels() {
            diff_image.put_pixel(x, y, backdrop(px));
        }
        return ComparisonResult::new(mask, diff_image, 0, threshold, resized);
    }

    let max_delta = MAX_YIQ_DELTA * threshold * threshold;
    for y in 0..height {
        for x in 0..width {
            let a = actual.get_pixel(x, y);
            let e = expected.get_pixel(x, y);
            let delta = if a == e { 0.0 } else { color_delta(a, e) };

            if delta > max_delta {
                if is_antialiased(actual, x, y, expected) || is_antialiased(expected, x, y, actual) {
                    antialiased += 1;
                    diff_image.put_pixel(x, y, AA_COLOR);
                } else {
                    mask.set(x, y);
                    diff_image.put_pixel(x, y, DIFF_COLOR);
                }
            } else {
                diff_image.put_pixel(x, y, backdrop(e));
            }
        }
    }

    ComparisonResult::new(mask, diff_image, antialiased, threshold, resized)
}

/// Channel value composited over white
fn blend(channel: u8, alpha: f64) -> f64 {
    255.0 + (f64::from(channel) - 255.0) * alpha
}

fn yiq(px: &Rgba<u8>) -> (f64, f64, f64) {
    let alpha = f64::from(px[3]) / 255.0;
    let r = blend(px[0], alpha);
    let g = blend(px[1], alpha);
    let b = blend(px[2], alpha);
    (
        r * 0.298_895_31 + g * 0.586_622_47 + b * 0.114_482_23,
        r * 0.595_977_99 - g * 0.274_176_10 - b * 0.321_801_89,
        r * 0.211_470_17 - g * 0.522_617_11 + b * 0.311_146_94,
    )
}

fn luma(px: &Rgba<u8>) -> f64 {
    yiq(px).0
}

/// Squared perceptual distance, in `[0, MAX_YIQ_DELTA]`
fn color_delta(a: &Rgba<u8>, b: &Rgba<u8>) -> f64 {
    let (y1, i1, q1) = yiq(a);
    let (y2, i2, q2) = yiq(b);
    let (dy, di, dq) = (y1 - y2, i1 - i2, q1 - q2);
    0.5053 * dy * dy + 0.299 * di * di + 0.1957 * dq * dq
}

/// Grayscale, faded copy of a reference pixel
fn backdrop(px: &Rgba<u8>) -> Rgba<u8> {
    let alpha = f64::from(px[3]) / 255.0;
    let gray = 255.0 + (luma(px) - 255.0) * DIFF_BACKDROP_ALPHA * alpha;
    let v = gray.round().clamp(0.0, 255.0) as u8;
    Rgba([v, v, v, 255])
}

fn neighborhood(x: u32, y: u32, width: u32, height: u32) -> (u32, u32, u32, u32) {
    (
        x.saturating_sub(1),
        y.saturating_sub(1),
        (x + 1).min(width - 1),
        (y + 1).min(height - 1),
    )
}

/// Whether `(x, y)` in `img` looks like an anti-aliased edge pixel.
///
/// The pixel must sit between a darker and a brighter neighbor, and one of
/// those extremes must belong to a flat area in both images.
fn is_antialiased(img: &RgbaImage, x: u32, y: u32, other: &RgbaImage) -> bool {
    let (width, height) = img.dimensions();
    let (x0, y0, x2, y2) = neighborhood(x, y, width, height);
    let on_edge = x == x0 || x == x2 || y == y0 || y == y2;
    let mut zeroes = u32::from(on_edge);

    let center = luma(img.get_pixel(x, y));
    let mut min = 0.0;
    let mut max = 0.0;
    let mut darkest = None;
    let mut brightest = None;

    for ny in y0..=y2 {
        for nx in x0..=x2 {
            if nx == x && ny == y {
                continue;
            }
            let delta = center - luma(img.get_pixel(nx, ny));
            if delta == 0.0 {
                zeroes += 1;
                if zeroes > 2 {
                    return false;
                }
            } else if delta < min {
                min = delta;
                darkest = Some((nx, ny));
            } else if delta > max {
                max = delta;
                brightest = Some((nx, ny));
            }
        }
    }

    let (Some((dx, dy)), Some((bx, by))) = (darkest, brightest) else {
        return false;
    };
    (has_many_siblings(img, dx, dy) && has_many_siblings(other, dx, dy))
        || (has_many_siblings(img, bx, by) && has_many_siblings(other, bx, by))
}

/// At least three identical neighbors around `(x, y)`
fn has_many_siblings(img: &RgbaImage, x: u32, y: u32) -> bool {
    let (width, height) = img.dimensions();
    let (x0, y0, x2, y2) = neighborhood(x, y, width, height);
    let mut zeroes = u32::from(x == x0 || x == x2 || y == y0 || y == y2);
    let center = img.get_pixel(x, y);

    for ny in y0..=y2 {
        for nx in x0..=x2 {
            if nx == x && ny == y {
                continue;
            }
            if img.get_pixel(nx, ny) == center {
                zeroes += 1;
                if zeroes > 2 {
                    return true;
                }
            }
        }
    }
    false
}
