//! Capture Command

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::output::{print_failure, print_json, print_success, print_warning, OutputFormat};
use crate::tools::{self, CaptureArgs, ToolContext};

use super::TargetArgs;

#[derive(Args, Debug)]
pub struct CaptureCommand {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Output file [default: results/<component>/actual.png]
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl CaptureCommand {
    fn tool_args(&self) -> CaptureArgs {
        CaptureArgs {
            component_name: self.target.component.clone(),
            project_path: None,
            port: self.target.port,
            viewport: self.target.viewport,
            capture_options: Some(self.target.capture_options()),
            output_path: self.output.clone(),
            selector: self.target.selector.clone(),
        }
    }
}

/// Returns whether the capture succeeded
pub async fn execute(cmd: &CaptureCommand, ctx: &ToolContext, format: OutputFormat) -> Result<bool> {
    let args = cmd.tool_args();
    let result = match ctx.run_capture(&args).await {
        Ok(result) => result,
        Err(e) => {
            print_failure(&e, format);
            return Ok(false);
        }
    };

    if format == OutputFormat::Json {
        print_json(&tools::success(&result)?);
        return Ok(true);
    }

    print_success(&format!(
        "Captured {} ({}) to {}",
        args.component_name,
        result.dimensions,
        result.output_path.display()
    ));
    if result.used_fallback_selector {
        print_warning(&format!("Matched fallback selector {}", result.selector));
    }
    Ok(true)
}
