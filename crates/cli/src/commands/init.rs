//! Init Command

use anyhow::Result;
use clap::Args;
use std::path::Path;

use figdiff_common::FigdiffConfig;

use crate::output::{print_success, print_warning};

#[derive(Args, Debug)]
pub struct InitCommand {
    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Write a default config; returns false when one exists and `--force` is unset
pub fn execute(cmd: &InitCommand, config_path: &Path) -> Result<bool> {
    if config_path.exists() && !cmd.force {
        print_warning(&format!(
            "{} already exists, pass --force to overwrite",
            config_path.display()
        ));
        return Ok(false);
    }
    FigdiffConfig::default().save(config_path)?;
    print_success(&format!("Wrote {}", config_path.display()));
    Ok(true)
}
