//! Optimize Asset Command

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use figdiff_compare::{optimize_asset, AssetFormat, OptimizeOptions};

use crate::output::{print_failure, print_fields, print_json, OutputFormat};
use crate::tools::{self, ToolContext};

#[derive(Args, Debug)]
pub struct OptimizeCommand {
    pub input: PathBuf,

    pub output: PathBuf,

    /// Output format [default: from the output extension]
    #[arg(long, value_parser = parse_format)]
    pub to: Option<AssetFormat>,

    /// JPEG quality (1-100)
    #[arg(long)]
    pub quality: Option<u8>,

    /// PNG compression level (0-9)
    #[arg(long)]
    pub compression_level: Option<u8>,

    #[arg(long)]
    pub max_width: Option<u32>,

    #[arg(long)]
    pub max_height: Option<u32>,
}

fn parse_format(s: &str) -> Result<AssetFormat, String> {
    AssetFormat::from_extension(s).map_err(|e| e.to_string())
}

pub async fn execute(cmd: &OptimizeCommand, ctx: &ToolContext, format: OutputFormat) -> Result<bool> {
    let options = OptimizeOptions {
        format: cmd.to,
        quality: cmd.quality,
        compression_level: cmd.compression_level,
        max_width: cmd.max_width,
        max_height: cmd.max_height,
    };
    let project = ctx.project_dir(None);
    let (input, output) = (project.join(&cmd.input), project.join(&cmd.output));

    let result = match tokio::task::spawn_blocking(move || optimize_asset(&input, &output, &options)).await? {
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

    print_fields(
        &[
            ("Output", result.output_path.display().to_string()),
            ("Format", result.format.to_string()),
            ("Dimensions", format!("{} -> {}", result.original_dimensions, result.dimensions)),
            ("Bytes", format!("{} -> {}", result.original_bytes, result.optimized_bytes)),
            ("Saved", format!("{:.1}%", result.savings_percent)),
        ],
        format,
    );
    Ok(true)
}
