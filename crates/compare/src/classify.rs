//! Region cause classification
//!
//! An ordered chain of heuristics; the first one that matches a region
//! decides its cause, and a region no heuristic claims is `unknown`.

use serde::{Deserialize, Serialize};

use figdiff_common::{BoundingBox, RegionCause, TextBox};

/// What a heuristic gets to look at for one region
#[derive(Debug, Clone, Copy)]
pub struct RegionFeatures<'a> {
    pub bounds: BoundingBox,
    pub pixel_count: u64,
    /// Text run boxes in raster pixels; empty when the capture reported none
    pub text_boxes: &'a [TextBox],
}

impl RegionFeatures<'_> {
    /// Share of the bounding box covered by differing pixels
    pub fn density(&self) -> f64 {
        let area = self.bounds.area();
        if area == 0 {
            0.0
        } else {
            self.pixel_count as f64 / area as f64
        }
    }

    fn near_text(&self, margin: u32) -> bool {
        let grown = self.bounds.inflate(margin);
        self.text_boxes.iter().any(|t| grown.intersects(t))
    }
}

/// A single classification rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Heuristic {
    /// Large, solid blocks: a missing or differently exported asset
    Material { min_pixels: u64, min_density: f64 },

    /// Small regions touching text. Without text boxes, small sparse
    /// regions are taken as glyph edge noise.
    Font {
        max_pixels: u64,
        margin: u32,
        max_density: f64,
    },

    /// Anything else of meaningful size: shifted or resized elements
    Layout { min_pixels: u64 },
}

impl Heuristic {
    pub fn cause(&self) -> RegionCause {
        match self {
            Heuristic::Material { .. } => RegionCause::Material,
            Heuristic::Font { .. } => RegionCause::Font,
            Heuristic::Layout { .. } => RegionCause::Layout,
        }
    }

    pub fn matches(&self, region: &RegionFeatures<'_>) -> bool {
        match *self {
            Heuristic::Material { min_pixels, min_density } => {
                region.pixel_count >= min_pixels && region.density() >= min_density
            }
            Heuristic::Font {
                max_pixels,
                margin,
                max_density,
            } => {
                if region.pixel_count > max_pixels {
                    false
                } else if region.text_boxes.is_empty() {
                    region.density() <= max_density
                } else {
                    region.near_text(margin)
                }
            }
            Heuristic::Layout { min_pixels } => region.pixel_count >= min_pixels,
        }
    }
}

/// Ordered heuristic chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classifier {
    chain: Vec<Heuristic>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(vec![
            Heuristic::Material {
                min_pixels: 64,
                min_density: 0.6,
            },
            Heuristic::Font {
                max_pixels: 400,
                margin: 2,
                max_density: 0.35,
            },
            Heuristic::Layout { min_pixels: 4 },
        ])
    }
}

impl Classifier {
    pub fn new(chain: Vec<Heuristic>) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &[Heuristic] {
        &self.chain
    }

    pub fn classify(&self, region: &RegionFeatures<'_>) -> RegionCause {
        self.chain
            .iter()
            .find(|h| h.matches(region))
            .map(Heuristic::cause)
            .unwrap_or(RegionCause::Unknown)
    }
}
