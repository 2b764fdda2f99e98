//! Status Command

use anyhow::Result;

use crate::output::{print_error, print_info, print_json, print_success, OutputFormat};
use crate::tools::ToolContext;

/// Report browser availability without launching it
pub fn execute(ctx: &ToolContext, format: OutputFormat) -> Result<bool> {
    let availability = ctx.engine().session().check_availability();
    if format == OutputFormat::Json {
        print_json(&ctx.status()?);
    } else if availability.available {
        print_success("Browser available");
        if availability.runtime_bundled {
            print_info("Using the configured browser executable");
        }
    } else {
        print_error("No browser available: set browser.executable in figdiff.toml");
    }
    Ok(availability.available)
}
