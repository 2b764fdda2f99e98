//! End-to-end comparison properties

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use test_case::test_case;

use figdiff_common::{match_percentage, QualityTier, RegionCause};
use figdiff_compare::{analyze, PixelComparator};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

fn white(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, WHITE)
}

fn with_square(mut img: RgbaImage, x0: u32, y0: u32, size: u32, color: Rgba<u8>) -> RgbaImage {
    for y in y0..y0 + size {
        for x in x0..x0 + size {
            img.put_pixel(x, y, color);
        }
    }
    img
}

/// A small "component": background, a card and a gradient strip
fn component(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if (4..20).contains(&x) && (4..12).contains(&y) {
            Rgba([30, 90, 200, 255])
        } else if y >= height - 4 {
            Rgba([(x * 255 / width) as u8, 120, 60, 255])
        } else {
            WHITE
        }
    })
}

fn dynamic(img: RgbaImage) -> DynamicImage {
    DynamicImage::ImageRgba8(img)
}

fn comparator() -> PixelComparator {
    PixelComparator::with_threshold(0.02).unwrap()
}

#[test]
fn test_identical_white_images() {
    let img = dynamic(white(100, 100));
    let result = comparator().compare(&img, &img).unwrap();
    let analysis = analyze(&result);

    assert_eq!(result.diff_pixel_count(), 0);
    assert_eq!(result.match_percentage(), 100.0);
    assert_eq!(result.quality_tier(), QualityTier::Perfect);
    assert!(analysis.regions.is_empty());
}

#[test]
fn test_red_square_is_one_material_region() {
    let expected = dynamic(white(100, 100));
    let actual = dynamic(with_square(white(100, 100), 45, 45, 10, RED));
    let result = comparator().compare(&actual, &expected).unwrap();
    let analysis = analyze(&result);

    assert_eq!(result.diff_pixel_count(), 100);
    assert_eq!(result.total_pixel_count(), 10_000);
    assert_eq!(analysis.regions.len(), 1);
    assert_eq!(analysis.regions[0].pixel_count, 100);
    assert_eq!(analysis.regions[0].cause, RegionCause::Material);
    assert!((result.match_percentage() - 99.0).abs() < 1e-9);

    // Perfect starts at 98%; a larger square drops below it
    let actual = dynamic(with_square(white(100, 100), 20, 20, 20, RED));
    let result = comparator().compare(&actual, &expected).unwrap();
    assert!(result.quality_tier() < QualityTier::Perfect);
}

#[test]
fn test_diff_image_marks_differences() {
    let expected = dynamic(white(20, 20));
    let actual = dynamic(with_square(white(20, 20), 5, 5, 4, RED));
    let result = comparator().compare(&actual, &expected).unwrap();
    let diff = result.diff_image();

    assert_eq!(diff.dimensions(), (20, 20));
    assert_eq!(*diff.get_pixel(6, 6), Rgba([255, 0, 0, 255]));
    assert_ne!(*diff.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
}

#[test]
fn test_match_percentage_invariant_holds() {
    let expected = dynamic(component(64, 32));
    for size in [1, 3, 7, 12] {
        let actual = dynamic(with_square(component(64, 32), 30, 10, size, RED));
        let result = comparator().compare(&actual, &expected).unwrap();
        let recomputed = match_percentage(result.diff_pixel_count(), result.total_pixel_count());
        assert!((result.match_percentage() - recomputed).abs() < 1e-12);
        assert_eq!(result.total_pixel_count(), 64 * 32);
    }
}

#[test]
fn test_comparison_is_idempotent() {
    let img = dynamic(component(80, 40));
    let result = comparator().compare(&img, &img).unwrap();
    assert_eq!(result.diff_pixel_count(), 0);
    assert_eq!(result.match_percentage(), 100.0);
}

#[test]
fn test_higher_threshold_never_adds_differences() {
    let expected = dynamic(component(64, 32));
    let mut actual = component(64, 32);
    for x in 0..64 {
        // subtle tint, a mid-tone band and a hard edge
        actual.put_pixel(x, 0, Rgba([250, 250, 250, 255]));
        actual.put_pixel(x, 14, Rgba([200, 200, 200, 255]));
        actual.put_pixel(x, 20, Rgba([0, 0, 0, 255]));
    }
    let actual = dynamic(actual);

    let mut previous = u64::MAX;
    for threshold in [0.0, 0.01, 0.02, 0.05, 0.1, 0.3, 0.6, 1.0] {
        let result = PixelComparator::new(threshold, 1.0)
            .unwrap()
            .compare(&actual, &expected)
            .unwrap();
        assert!(
            result.diff_pixel_count() <= previous,
            "threshold {} produced {} > {}",
            threshold,
            result.diff_pixel_count(),
            previous
        );
        previous = result.diff_pixel_count();
    }
}

#[test]
fn test_scale_mismatch_is_normalized() {
    let small = component(40, 20);
    let large = imageops::resize(&small, 120, 60, FilterType::Nearest);
    let edited_small = with_square(component(40, 20), 25, 5, 4, RED);

    let direct = comparator()
        .compare(&dynamic(edited_small.clone()), &dynamic(small))
        .unwrap();
    let scaled = comparator()
        .compare(&dynamic(edited_small), &dynamic(large))
        .unwrap();

    assert!(scaled.resized().is_some());
    assert_eq!(scaled.dimensions().width, 120);
    assert!((direct.match_percentage() - scaled.match_percentage()).abs() < 0.5);
}

#[test]
fn test_same_content_at_triple_scale_matches() {
    let small = component(40, 20);
    let large = imageops::resize(&small, 120, 60, FilterType::Nearest);
    let result = comparator()
        .compare(&dynamic(large), &dynamic(small))
        .unwrap();
    assert_eq!(result.diff_pixel_count(), 0);
    let resize = result.resized().unwrap();
    assert_eq!(resize.compared_at.width, 120);
    assert_eq!(resize.expected.width, 40);
}

#[test_case(100.0, QualityTier::Perfect ; "full match")]
#[test_case(98.0, QualityTier::Perfect ; "perfect boundary")]
#[test_case(97.99, QualityTier::Excellent ; "just below perfect")]
#[test_case(95.0, QualityTier::Excellent ; "excellent boundary")]
#[test_case(94.9, QualityTier::Good ; "good")]
#[test_case(90.0, QualityTier::Good ; "good boundary")]
#[test_case(80.0, QualityTier::NeedsImprovement ; "needs improvement boundary")]
#[test_case(79.9, QualityTier::Poor ; "below needs improvement")]
#[test_case(70.0, QualityTier::Poor ; "poor boundary")]
#[test_case(12.5, QualityTier::Failing ; "failing")]
fn test_tier_breakpoints(percentage: f64, tier: QualityTier) {
    assert_eq!(QualityTier::from_match_percentage(percentage), tier);
}
