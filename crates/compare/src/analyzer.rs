//! Region and quality analysis
//!
//! Turns a comparison into classified difference regions, a quality tier and
//! a prioritized list of recommendations. Pure function of its input.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use figdiff_common::{
    ComparisonResult, DifferenceRegion, Priority, QualityTier, Recommendation, RecommendationCategory,
    RegionCause, Severity, TextBox,
};

use crate::classify::{Classifier, RegionFeatures};
use crate::regions::cluster;

/// Output of one analysis pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub regions: Vec<DifferenceRegion>,
    pub tier: QualityTier,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    classifier: Classifier,
}

/// Per-cause totals used to phrase recommendations
#[derive(Debug, Default)]
struct CauseSummary {
    regions: usize,
    pixels: u64,
    largest: Option<DifferenceRegion>,
}

impl Analyzer {
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Analyze `result`; `text_boxes` are the capture's text runs, possibly empty
    pub fn analyze(&self, result: &ComparisonResult, text_boxes: &[TextBox]) -> Analysis {
        let total = result.total_pixel_count();
        let regions: Vec<DifferenceRegion> = cluster(result.mask())
            .into_iter()
            .enumerate()
            .map(|(id, c)| {
                let features = RegionFeatures {
                    bounds: c.bounds,
                    pixel_count: c.pixel_count,
                    text_boxes,
                };
                DifferenceRegion {
                    id: id + 1,
                    bounds: c.bounds,
                    pixel_count: c.pixel_count,
                    cause: self.classifier.classify(&features),
                    severity: Severity::from_share(c.pixel_count, total),
                }
            })
            .collect();

        let tier = result.quality_tier();
        let recommendations = recommend(&regions, result, tier);
        debug!(
            "Analysis: {} region(s), tier {}, {} recommendation(s)",
            regions.len(),
            tier,
            recommendations.len()
        );

        Analysis {
            regions,
            tier,
            recommendations,
        }
    }
}

/// Analyze with the default classifier chain and no text information
pub fn analyze(result: &ComparisonResult) -> Analysis {
    Analyzer::default().analyze(result, &[])
}

fn recommend(regions: &[DifferenceRegion], result: &ComparisonResult, tier: QualityTier) -> Vec<Recommendation> {
    let mut by_cause: BTreeMap<RegionCause, CauseSummary> = BTreeMap::new();
    for region in regions {
        let summary = by_cause.entry(region.cause).or_default();
        summary.regions += 1;
        summary.pixels += region.pixel_count;
        if summary
            .largest
            .as_ref()
            .map(|l| region.pixel_count > l.pixel_count)
            .unwrap_or(true)
        {
            summary.largest = Some(region.clone());
        }
    }

    let mut out: Vec<Recommendation> = by_cause
        .iter()
        .map(|(cause, summary)| Recommendation {
            priority: cause.priority(),
            category: RecommendationCategory::from(*cause),
            description: describe(*cause, summary),
        })
        .collect();

    if let Some(resize) = result.resized() {
        out.push(Recommendation {
            priority: Priority::Medium,
            category: RecommendationCategory::Scale,
            description: format!(
                "Capture was {} but the reference is {}; capture at the reference export scale so no resampling is needed",
                resize.actual, resize.expected
            ),
        });
    }

    if tier < QualityTier::Good {
        let priority = if tier <= QualityTier::Poor {
            Priority::High
        } else {
            Priority::Medium
        };
        out.push(Recommendation {
            priority,
            category: RecommendationCategory::Review,
            description: format!(
                "Match is {:.2}% ({}), below the {}% needed for good; fix the high priority items and re-run the comparison",
                result.match_percentage(),
                tier,
                QualityTier::Good.min_percentage()
            ),
        });
    }

    out.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.category.cmp(&b.category)));
    out
}

fn describe(cause: RegionCause, summary: &CauseSummary) -> String {
    let location = summary
        .largest
        .as_ref()
        .map(|r| {
            format!(
                "largest at ({}, {}) {}x{}",
                r.bounds.x, r.bounds.y, r.bounds.width, r.bounds.height
            )
        })
        .unwrap_or_default();
    let extent = format!("{} region(s), {} px, {}", summary.regions, summary.pixels, location);

    match cause {
        RegionCause::Material => format!(
            "Re-export the asset from Figma (check image fills, icons and colors): {}",
            extent
        ),
        RegionCause::Layout => format!(
            "Adjust padding/flex gap, sizes or alignment of the shifted elements: {}",
            extent
        ),
        RegionCause::Font => format!(
            "Verify font family/weight, size, line height and letter spacing: {}",
            extent
        ),
        RegionCause::Unknown => format!("Inspect diff.png for unclassified differences: {}", extent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figdiff_common::DiffMask;
    use image::RgbaImage;

    fn result_with(points: impl IntoIterator<Item = (u32, u32)>) -> ComparisonResult {
        let mut mask = DiffMask::new(100, 100);
        for (x, y) in points {
            mask.set(x, y);
        }
        ComparisonResult::new(mask, RgbaImage::new(100, 100), 0, 0.02, None)
    }

    #[test]
    fn test_clean_result_has_nothing_to_do() {
        let analysis = analyze(&result_with([]));
        assert!(analysis.regions.is_empty());
        assert!(analysis.recommendations.is_empty());
        assert_eq!(analysis.tier, QualityTier::Perfect);
    }

    #[test]
    fn test_square_is_material_with_high_priority() {
        let square = (10..20).flat_map(|y| (10..20).map(move |x| (x, y)));
        let analysis = analyze(&result_with(square));
        assert_eq!(analysis.regions.len(), 1);
        let region = &analysis.regions[0];
        assert_eq!(region.cause, RegionCause::Material);
        assert_eq!(region.pixel_count, 100);
        assert_eq!(region.severity, Severity::High);
        assert_eq!(analysis.recommendations[0].priority, Priority::High);
        assert_eq!(analysis.recommendations[0].category, RecommendationCategory::Material);
        assert!(analysis.recommendations[0].description.contains("Re-export"));
    }

    #[test]
    fn test_recommendations_sorted_by_priority() {
        // solid block, a sparse speckle and a half-filled strip
        let block = (0..10).flat_map(|y| (0..10).map(move |x| (x, y)));
        let speckle = (0..5).map(|i| (60 + i * 2, 60 + i * 2));
        let strip = (0..40).map(|x| (x * 2 + 10, 90)).chain((0..40).map(|x| (x * 2 + 11, 91)));
        let analysis = analyze(&result_with(block.chain(speckle).chain(strip)));

        let causes: Vec<_> = analysis.regions.iter().map(|r| r.cause).collect();
        assert!(causes.contains(&RegionCause::Material));
        assert!(causes.contains(&RegionCause::Layout));
        let priorities: Vec<_> = analysis.recommendations.iter().map(|r| r.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort();
        assert_eq!(priorities, sorted);
    }

    #[test]
    fn test_low_tier_adds_review() {
        let half = (0..50).flat_map(|y| (0..100).map(move |x| (x, y)));
        let analysis = analyze(&result_with(half));
        assert_eq!(analysis.tier, QualityTier::Failing);
        assert!(analysis
            .recommendations
            .iter()
            .any(|r| r.category == RecommendationCategory::Review && r.priority == Priority::High));
    }

    #[test]
    fn test_region_ids_start_at_one() {
        let analysis = analyze(&result_with([(0, 0), (50, 50)]));
        let ids: Vec<_> = analysis.regions.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
