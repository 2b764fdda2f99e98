//! Compare Command

use anyhow::Result;
use clap::Args;

use crate::output::{print_failure, print_fields, print_heading, print_json, print_list, print_warning, OutputFormat};
use crate::pipeline;
use crate::tools::{self, CompareArgs, ToolContext};

use super::TargetArgs;

#[derive(Args, Debug)]
pub struct CompareCommand {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Perceptual threshold (0-1, lower is stricter)
    #[arg(long, env = "FIGDIFF_THRESHOLD")]
    pub threshold: Option<f64>,

    /// Skip the Markdown report
    #[arg(long)]
    pub no_report: bool,
}

impl CompareCommand {
    fn tool_args(&self) -> CompareArgs {
        CompareArgs {
            component_name: self.target.component.clone(),
            project_path: None,
            port: self.target.port,
            viewport: self.target.viewport,
            capture_options: Some(self.target.capture_options()),
            selector: self.target.selector.clone(),
            threshold: self.threshold,
            generate_report: self.no_report.then_some(false),
        }
    }
}

/// Returns whether the comparison ran; a low match still counts as success
pub async fn execute(cmd: &CompareCommand, ctx: &ToolContext, format: OutputFormat) -> Result<bool> {
    let outcome = match pipeline::run(ctx, &cmd.tool_args()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            print_failure(&e, format);
            return Ok(false);
        }
    };

    if format == OutputFormat::Json {
        print_json(&tools::success(&outcome)?);
        return Ok(true);
    }

    let report = &outcome.report;
    let c = &report.comparison;
    print_fields(
        &[
            ("Component", report.component_name.clone()),
            ("Match", format!("{:.2}%", c.match_percentage)),
            ("Quality", format!("{} {}", c.quality_tier.emoji(), c.quality_tier)),
            ("Differing pixels", format!("{} / {}", c.diff_pixels, c.total_pixels)),
            ("Dimensions", c.dimensions.to_string()),
            ("Threshold", c.threshold.to_string()),
            ("Report", outcome.report_paths.json.display().to_string()),
        ],
        format,
    );
    if let Some(resize) = &c.resized {
        print_warning(&format!(
            "Sizes differ: actual {} vs expected {}, compared at {}",
            resize.actual, resize.expected, resize.compared_at
        ));
    }
    print_heading("Regions");
    print_list(&report.regions, format);
    print_heading("Recommendations");
    print_list(&report.recommendations, format);
    Ok(true)
}
