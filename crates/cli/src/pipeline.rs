//! The compare pipeline: capture, diff against the reference, analyze, report

use std::path::{Path, PathBuf};

use image::DynamicImage;
use serde::Serialize;
use tracing::{info, instrument};

use figdiff_common::config::SUPPORTED_EXTENSIONS;
use figdiff_common::{write_atomic, BoundingBox, CaptureResult, Dimensions, Error, Result, TextBox};
use figdiff_compare::{encode_image, Analyzer, Artifact, Artifacts, AssetFormat, PixelComparator, Report, ReportPaths};

use crate::tools::{CompareArgs, ToolContext};

/// Result of a successful compare invocation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareOutcome {
    #[serde(flatten)]
    pub report: Report,
    pub capture: CaptureResult,
    pub report_paths: ReportPaths,
}

/// Everything compared and written after the capture exists
#[derive(Debug, Clone)]
pub struct ComparisonJob {
    pub component_name: String,
    pub actual: PathBuf,
    pub expected: PathBuf,
    pub diff: PathBuf,
    pub report_dir: PathBuf,
    /// Text boxes in the actual image's pixel space
    pub text_boxes: Vec<TextBox>,
    pub markdown: bool,
}

impl ComparisonJob {
    /// Compare, write the diff image and the report. Blocking.
    pub fn run(&self, comparator: &PixelComparator, analyzer: &Analyzer) -> Result<(Report, ReportPaths)> {
        let diff_format = AssetFormat::from_path(&self.diff)?;
        let result = comparator.compare_files(&self.actual, &self.expected)?;

        let diff_image = DynamicImage::ImageRgba8(result.diff_image().clone());
        write_atomic(&self.diff, &encode_image(&diff_image, diff_format)?)?;

        let text_boxes = match result.resized() {
            Some(resize) => rescale_boxes(&self.text_boxes, resize.actual, resize.compared_at),
            None => self.text_boxes.clone(),
        };
        let analysis = analyzer.analyze(&result, &text_boxes);

        let report = Report::new(&self.component_name, &result, &analysis).with_artifacts(Artifacts {
            actual: Some(Artifact::from_file(&self.actual)?),
            expected: Some(Artifact::from_file(&self.expected)?),
            diff: Some(Artifact::from_file(&self.diff)?),
        });
        let paths = report.write(&self.report_dir, self.markdown)?;

        info!(
            "{}: {:.2}% match ({}), {} region(s)",
            self.component_name,
            result.match_percentage(),
            result.quality_tier(),
            analysis.regions.len()
        );
        Ok((report, paths))
    }
}

/// Locate `expected.{png,jpg,jpeg,webp}` in `dir`
pub fn find_reference(dir: &Path) -> Result<PathBuf> {
    SUPPORTED_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("expected.{}", ext)))
        .find(|path| path.is_file())
        .ok_or_else(|| Error::ReferenceNotFound(dir.join("expected.png")))
}

/// Run the compare tool.
///
/// Threshold and reference are checked before the capture, so a bad request
/// never starts the browser.
#[instrument(skip(ctx, args), fields(component = %args.component_name))]
pub async fn run(ctx: &ToolContext, args: &CompareArgs) -> Result<CompareOutcome> {
    let config = ctx.config();
    let threshold = args.threshold.unwrap_or(config.compare.threshold);
    let comparator = PixelComparator::new(threshold, config.compare.max_threshold)?;

    let project = ctx.project_dir(args.project_path.as_deref());
    let component = ctx.engine().registry().resolve(&args.component_name)?;
    let results_dir = config.component_results_dir(&project, &component.name);
    let expected = find_reference(&results_dir)?;

    let capture = ctx.run_capture(&args.capture_args()).await?;

    let job = ComparisonJob {
        component_name: component.name,
        actual: capture.output_path.clone(),
        expected,
        diff: results_dir.join(format!("diff.{}", config.compare.image_extension)),
        report_dir: results_dir,
        text_boxes: capture.text_boxes.clone(),
        markdown: args.generate_report.unwrap_or(config.compare.generate_report),
    };
    let (report, report_paths) = tokio::task::spawn_blocking(move || job.run(&comparator, &Analyzer::default()))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))??;

    Ok(CompareOutcome {
        report,
        capture,
        report_paths,
    })
}

/// Map boxes from `from` pixel space onto `to`
fn rescale_boxes(boxes: &[TextBox], from: Dimensions, to: Dimensions) -> Vec<TextBox> {
    if from == to || from.width == 0 || from.height == 0 {
        return boxes.to_vec();
    }
    let sx = to.width as f64 / from.width as f64;
    let sy = to.height as f64 / from.height as f64;
    boxes
        .iter()
        .map(|b| BoundingBox {
            x: (b.x as f64 * sx).floor() as u32,
            y: (b.y as f64 * sy).floor() as u32,
            width: (b.width as f64 * sx).ceil() as u32,
            height: (b.height as f64 * sy).ceil() as u32,
        })
        .collect()
}
