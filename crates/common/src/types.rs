//! Core types for figdiff

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Default device scale factor used for captures
pub const DEFAULT_SCALE: f64 = 3.0;

/// Largest accepted capture scale factor
pub const MAX_SCALE: f64 = 4.0;

/// Default perceptual threshold for pixel comparison
pub const DEFAULT_THRESHOLD: f64 = 0.02;

/// Browser viewport size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl Viewport {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 || self.width > 7680 || self.height > 7680 {
            return Err(Error::Validation(format!(
                "viewport {}x{} out of range (1..=7680 per side)",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Options passed to the in-page DOM serializer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOptions {
    /// Raster scale factor relative to CSS pixels
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Solid background; `None` keeps the capture transparent
    #[serde(default)]
    pub background_color: Option<String>,

    /// Inline `@font-face` sources into the serialized document
    #[serde(default = "default_true")]
    pub embed_fonts: bool,

    /// Re-encode the PNG with the strongest compression
    #[serde(default)]
    pub compress: bool,

    /// Only zero is accepted. The reference image carries no padding, so any
    /// other value shifts every pixel of the capture.
    #[serde(default)]
    pub padding: u32,
}

fn default_scale() -> f64 {
    DEFAULT_SCALE
}

fn default_true() -> bool {
    true
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            background_color: None,
            embed_fonts: true,
            compress: false,
            padding: 0,
        }
    }
}

impl CaptureOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 || self.scale > MAX_SCALE {
            return Err(Error::Validation(format!(
                "scale {} out of range (0, {}]",
                self.scale, MAX_SCALE
            )));
        }
        if self.padding != 0 {
            return Err(Error::Validation(format!(
                "padding must be 0, got {}: padded captures no longer align with the reference image",
                self.padding
            )));
        }
        if let Some(color) = &self.background_color {
            let color = color.trim();
            if color.is_empty() || color.len() > 64 || color.contains(['\'', '"', '\\', '`']) {
                return Err(Error::Validation(format!(
                    "invalid backgroundColor {:?}",
                    color
                )));
            }
        }
        Ok(())
    }

    /// Expected raster size of an element of `css_width`x`css_height` CSS pixels
    pub fn expected_raster_size(&self, css_width: f64, css_height: f64) -> Dimensions {
        Dimensions {
            width: (css_width * self.scale).round().max(0.0) as u32,
            height: (css_height * self.scale).round().max(0.0) as u32,
        }
    }
}

/// A single capture invocation
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub component: String,
    pub port: u16,
    pub viewport: Viewport,
    pub options: CaptureOptions,
    pub output_path: PathBuf,
    pub selector: Option<String>,
}

impl CaptureRequest {
    pub fn new(component: impl Into<String>, port: u16, output_path: impl Into<PathBuf>) -> Self {
        Self {
            component: component.into(),
            port,
            viewport: Viewport::default(),
            options: CaptureOptions::default(),
            output_path: output_path.into(),
            selector: None,
        }
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn with_options(mut self, options: CaptureOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_selector(mut self, selector: Option<String>) -> Self {
        self.selector = selector;
        self
    }

    /// Root URL of the dev server
    pub fn server_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::Validation("port must be non-zero".to_string()));
        }
        self.viewport.validate()?;
        self.options.validate()?;
        if let Some(selector) = &self.selector {
            if selector.trim().is_empty() {
                return Err(Error::Validation("selector must not be empty".to_string()));
            }
        }
        Ok(())
    }
}

/// How a capture was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMethod {
    /// Serialized in-page via SVG foreignObject onto a canvas
    DomToRaster,
}

impl std::fmt::Display for CaptureMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureMethod::DomToRaster => write!(f, "dom-to-raster"),
        }
    }
}

/// Image size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn total_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Whether both sides are within `tolerance` pixels of `other`
    pub fn within(&self, other: &Dimensions, tolerance: u32) -> bool {
        self.width.abs_diff(other.width) <= tolerance && self.height.abs_diff(other.height) <= tolerance
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned rectangle in raster pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Grow by `margin` on every side, saturating at the origin
    pub fn inflate(&self, margin: u32) -> BoundingBox {
        let x = self.x.saturating_sub(margin);
        let y = self.y.saturating_sub(margin);
        BoundingBox {
            x,
            y,
            width: self.right() + margin - x,
            height: self.bottom() + margin - y,
        }
    }
}

/// Bounding box of a rendered text run, reported by the capture script
pub type TextBox = BoundingBox;

/// Everything known about a finished capture
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub output_path: PathBuf,
    pub bytes_written: u64,
    pub url: String,
    /// Selector that actually matched
    pub selector: String,
    pub used_fallback_selector: bool,
    pub viewport: Viewport,
    pub options: CaptureOptions,
    pub method: CaptureMethod,
    pub dimensions: Dimensions,
    /// Text run boxes, already scaled to raster pixels
    #[serde(default)]
    pub text_boxes: Vec<TextBox>,
    pub duration_ms: u64,
}

/// Metadata of one side of a comparison, attached to comparison errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMeta {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub path: Option<PathBuf>,
}

impl std::fmt::Display for ImageMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} {}x{} ({})", self.label, self.width, self.height, path.display()),
            None => write!(f, "{} {}x{}", self.label, self.width, self.height),
        }
    }
}

/// Row-major boolean mask of differing pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl DiffMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32) {
        let idx = self.index(x, y);
        self.bits[idx] = true;
    }

    pub fn count(&self) -> u64 {
        self.bits.iter().filter(|b| **b).count() as u64
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// Records that one side was rescaled before comparing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeInfo {
    pub actual: Dimensions,
    pub expected: Dimensions,
    pub compared_at: Dimensions,
}

/// Outcome of a pixel comparison
///
/// The match percentage is derived from the pixel counts at construction and
/// cannot be set independently.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    match_percentage: f64,
    diff_pixel_count: u64,
    total_pixel_count: u64,
    antialiased_pixel_count: u64,
    dimensions: Dimensions,
    quality_tier: QualityTier,
    threshold: f64,
    resized: Option<ResizeInfo>,
    #[serde(skip)]
    mask: DiffMask,
    #[serde(skip)]
    diff_image: RgbaImage,
}

impl ComparisonResult {
    pub fn new(
        mask: DiffMask,
        diff_image: RgbaImage,
        antialiased_pixel_count: u64,
        threshold: f64,
        resized: Option<ResizeInfo>,
    ) -> Self {
        let dimensions = Dimensions::new(mask.width(), mask.height());
        let diff_pixel_count = mask.count();
        let total_pixel_count = dimensions.total_pixels();
        let match_percentage = match_percentage(diff_pixel_count, total_pixel_count);
        Self {
            match_percentage,
            diff_pixel_count,
            total_pixel_count,
            antialiased_pixel_count,
            dimensions,
            quality_tier: QualityTier::from_match_percentage(match_percentage),
            threshold,
            resized,
            mask,
            diff_image,
        }
    }

    pub fn match_percentage(&self) -> f64 {
        self.match_percentage
    }

    pub fn diff_pixel_count(&self) -> u64 {
        self.diff_pixel_count
    }

    pub fn total_pixel_count(&self) -> u64 {
        self.total_pixel_count
    }

    pub fn antialiased_pixel_count(&self) -> u64 {
        self.antialiased_pixel_count
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn quality_tier(&self) -> QualityTier {
        self.quality_tier
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn resized(&self) -> Option<ResizeInfo> {
        self.resized
    }

    pub fn mask(&self) -> &DiffMask {
        &self.mask
    }

    pub fn diff_image(&self) -> &RgbaImage {
        &self.diff_image
    }
}

/// `100 * (1 - diff / total)`; an empty image counts as a full match
pub fn match_percentage(diff_pixels: u64, total_pixels: u64) -> f64 {
    if total_pixels == 0 {
        return 100.0;
    }
    100.0 * (1.0 - diff_pixels as f64 / total_pixels as f64)
}

/// Discrete quality tier, ordered worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityTier {
    Failing,
    Poor,
    NeedsImprovement,
    Good,
    Excellent,
    Perfect,
}

impl QualityTier {
    /// Tiers from best to worst with their lower bounds
    pub const BREAKPOINTS: [(QualityTier, f64); 5] = [
        (QualityTier::Perfect, 98.0),
        (QualityTier::Excellent, 95.0),
        (QualityTier::Good, 90.0),
        (QualityTier::NeedsImprovement, 80.0),
        (QualityTier::Poor, 70.0),
    ];

    pub fn from_match_percentage(match_percentage: f64) -> Self {
        Self::BREAKPOINTS
            .iter()
            .find(|(_, min)| match_percentage >= *min)
            .map(|(tier, _)| *tier)
            .unwrap_or(QualityTier::Failing)
    }

    /// Lower bound of the tier, `0.0` for failing
    pub fn min_percentage(&self) -> f64 {
        Self::BREAKPOINTS
            .iter()
            .find(|(tier, _)| tier == self)
            .map(|(_, min)| *min)
            .unwrap_or(0.0)
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            QualityTier::Perfect | QualityTier::Excellent => "🟢",
            QualityTier::Good => "🟡",
            QualityTier::NeedsImprovement => "🟠",
            QualityTier::Poor | QualityTier::Failing => "🔴",
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityTier::Perfect => write!(f, "perfect"),
            QualityTier::Excellent => write!(f, "excellent"),
            QualityTier::Good => write!(f, "good"),
            QualityTier::NeedsImprovement => write!(f, "needs-improvement"),
            QualityTier::Poor => write!(f, "poor"),
            QualityTier::Failing => write!(f, "failing"),
        }
    }
}

/// Likely cause of a difference region
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionCause {
    Material,
    Layout,
    Font,
    Unknown,
}

impl RegionCause {
    pub fn priority(&self) -> Priority {
        match self {
            RegionCause::Material => Priority::High,
            RegionCause::Layout => Priority::Medium,
            RegionCause::Font | RegionCause::Unknown => Priority::Low,
        }
    }
}

impl std::fmt::Display for RegionCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionCause::Material => write!(f, "material"),
            RegionCause::Layout => write!(f, "layout"),
            RegionCause::Font => write!(f, "font"),
            RegionCause::Unknown => write!(f, "unknown"),
        }
    }
}

/// How much of the image a region covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// >= 1% of the image is high, >= 0.1% medium
    pub fn from_share(pixel_count: u64, total_pixels: u64) -> Self {
        if total_pixels == 0 {
            return Severity::Low;
        }
        let share = pixel_count as f64 / total_pixels as f64;
        if share >= 0.01 {
            Severity::High
        } else if share >= 0.001 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// A contiguous cluster of differing pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifferenceRegion {
    pub id: usize,
    pub bounds: BoundingBox,
    pub pixel_count: u64,
    pub cause: RegionCause,
    pub severity: Severity,
}

impl DifferenceRegion {
    /// Share of the bounding box covered by differing pixels
    pub fn density(&self) -> f64 {
        let area = self.bounds.area();
        if area == 0 {
            return 0.0;
        }
        self.pixel_count as f64 / area as f64
    }
}

/// Remediation priority, `High` sorts first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// Area a recommendation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationCategory {
    Material,
    Layout,
    Font,
    Scale,
    Review,
}

impl From<RegionCause> for RecommendationCategory {
    fn from(cause: RegionCause) -> Self {
        match cause {
            RegionCause::Material => RecommendationCategory::Material,
            RegionCause::Layout => RecommendationCategory::Layout,
            RegionCause::Font => RecommendationCategory::Font,
            RegionCause::Unknown => RecommendationCategory::Review,
        }
    }
}

impl std::fmt::Display for RecommendationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecommendationCategory::Material => write!(f, "material"),
            RecommendationCategory::Layout => write!(f, "layout"),
            RecommendationCategory::Font => write!(f, "font"),
            RecommendationCategory::Scale => write!(f, "scale"),
            RecommendationCategory::Review => write!(f, "review"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub category: RecommendationCategory,
    pub description: String,
}

/// Result of the browser health probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    /// A browser executable can be resolved
    pub available: bool,
    /// The browser process is already running
    pub engine_loaded: bool,
    /// A pinned executable is configured and present on disk
    pub runtime_bundled: bool,
}
