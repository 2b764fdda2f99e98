//! figdiff CLI - Main Entry Point
//!
//! Captures UI components from a dev server and compares them against
//! design reference images.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use figdiff_cli::commands::{capture, compare, init, optimize, serve, status, tools};
use figdiff_cli::output::OutputFormat;
use figdiff_cli::ToolContext;
use figdiff_common::{default_config_path, FigdiffConfig};

/// figdiff - visual regression of UI components against Figma exports
#[derive(Parser)]
#[command(name = "figdiff")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory holding figdiff.toml and the results directory
    #[arg(long, env = "FIGDIFF_PROJECT_PATH", default_value = ".", global = true)]
    project_path: PathBuf,

    /// Configuration file [default: <project-path>/figdiff.toml]
    #[arg(long, env = "FIGDIFF_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a component to a PNG
    Capture(capture::CaptureCommand),

    /// Capture a component and compare it against results/<component>/expected.*
    Compare(compare::CompareCommand),

    /// Re-encode an image, optionally downscaled
    OptimizeAsset(optimize::OptimizeCommand),

    /// Check browser availability without launching it
    Status,

    /// Serve tools over stdin/stdout, one JSON request per line
    Serve,

    /// List tools and their argument schemas
    Tools,

    /// Write a default figdiff.toml
    Init(init::InitCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries results and protocol frames
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| default_config_path(&cli.project_path));

    // Commands that need no config or browser
    let offline = match &cli.command {
        Commands::Tools => Some(tools::execute()),
        Commands::Init(cmd) => Some(init::execute(cmd, &config_path)?),
        _ => None,
    };
    if let Some(succeeded) = offline {
        exit_on_failure(succeeded);
        return Ok(());
    }

    let config = FigdiffConfig::load(&config_path)?;
    let ctx = ToolContext::new(config, &cli.project_path)?;

    let succeeded = match cli.command {
        Commands::Capture(cmd) => capture::execute(&cmd, &ctx, cli.format).await,
        Commands::Compare(cmd) => compare::execute(&cmd, &ctx, cli.format).await,
        Commands::OptimizeAsset(cmd) => optimize::execute(&cmd, &ctx, cli.format).await,
        Commands::Status => status::execute(&ctx, cli.format),
        Commands::Serve => return serve::execute(ctx).await,
        Commands::Tools | Commands::Init(_) => Ok(true),
    };

    ctx.shutdown().await;
    exit_on_failure(succeeded?);
    Ok(())
}

fn exit_on_failure(succeeded: bool) {
    if !succeeded {
        std::process::exit(1);
    }
}
