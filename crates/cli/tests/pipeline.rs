//! Compare pipeline after capture: diff image, analysis and reports

use image::{Rgba, RgbaImage};

use figdiff_cli::ComparisonJob;
use figdiff_common::{BoundingBox, QualityTier, RegionCause};
use figdiff_compare::{Analyzer, PixelComparator, Report};

fn square(path: &std::path::Path, size: Option<(u32, u32, u32)>) {
    let mut img = RgbaImage::from_pixel(100, 100, Rgba([255, 255, 255, 255]));
    if let Some((x0, y0, side)) = size {
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            }
        }
    }
    img.save(path).unwrap();
}

fn job(dir: &std::path::Path, markdown: bool) -> ComparisonJob {
    ComparisonJob {
        component_name: "Button".to_string(),
        actual: dir.join("actual.png"),
        expected: dir.join("expected.png"),
        diff: dir.join("diff.png"),
        report_dir: dir.to_path_buf(),
        text_boxes: Vec::new(),
        markdown,
    }
}

#[test]
fn test_red_square_writes_diff_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    square(&dir.path().join("expected.png"), None);
    square(&dir.path().join("actual.png"), Some((45, 45, 10)));

    let comparator = PixelComparator::with_threshold(0.02).unwrap();
    let (report, paths) = job(dir.path(), true).run(&comparator, &Analyzer::default()).unwrap();

    assert_eq!(report.comparison.diff_pixels, 100);
    assert_eq!(report.regions.len(), 1);
    assert_eq!(report.regions[0].cause, RegionCause::Material);
    assert!(dir.path().join("diff.png").exists());
    assert!(paths.markdown.unwrap().exists());

    let artifacts = &report.artifacts;
    assert_eq!(artifacts.diff.as_ref().unwrap().path, dir.path().join("diff.png"));
    assert_eq!(artifacts.expected.as_ref().unwrap().sha256.len(), 64);

    let loaded: Report = serde_json::from_slice(&std::fs::read(paths.json).unwrap()).unwrap();
    assert_eq!(loaded.comparison.quality_tier, QualityTier::Perfect);
    assert_eq!(loaded.regions, report.regions);
}

#[test]
fn test_identical_images_without_markdown() {
    let dir = tempfile::tempdir().unwrap();
    square(&dir.path().join("expected.png"), None);
    square(&dir.path().join("actual.png"), None);

    let comparator = PixelComparator::with_threshold(0.02).unwrap();
    let (report, paths) = job(dir.path(), false).run(&comparator, &Analyzer::default()).unwrap();

    assert_eq!(report.comparison.match_percentage, 100.0);
    assert!(report.regions.is_empty());
    assert!(report.recommendations.is_empty());
    assert!(paths.markdown.is_none());
    assert!(!dir.path().join("report.md").exists());
}

#[test]
fn test_text_boxes_turn_small_regions_into_font() {
    let dir = tempfile::tempdir().unwrap();
    square(&dir.path().join("expected.png"), None);
    square(&dir.path().join("actual.png"), Some((20, 20, 3)));

    let mut job = job(dir.path(), false);
    job.text_boxes = vec![BoundingBox {
        x: 18,
        y: 18,
        width: 30,
        height: 10,
    }];
    let comparator = PixelComparator::with_threshold(0.02).unwrap();
    let (report, _) = job.run(&comparator, &Analyzer::default()).unwrap();

    assert_eq!(report.regions.len(), 1);
    assert_eq!(report.regions[0].cause, RegionCause::Font);
}
