//! CLI Commands

pub mod capture;
pub mod compare;
pub mod init;
pub mod optimize;
pub mod serve;
pub mod status;
pub mod tools;

use clap::Args;

use figdiff_common::{CaptureOptions, Viewport, DEFAULT_SCALE};

/// What to capture and how
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Component name, served at /component/<name>
    pub component: String,

    /// Dev server port
    #[arg(long, env = "FIGDIFF_PORT")]
    pub port: Option<u16>,

    /// Viewport as WIDTHxHEIGHT
    #[arg(long, value_parser = parse_viewport)]
    pub viewport: Option<Viewport>,

    /// Device scale factor of the capture
    #[arg(long)]
    pub scale: Option<f64>,

    /// Solid background behind the component (CSS color)
    #[arg(long)]
    pub background_color: Option<String>,

    /// Do not inline @font-face sources
    #[arg(long)]
    pub no_embed_fonts: bool,

    /// Re-encode the capture with maximum PNG compression
    #[arg(long)]
    pub compress: bool,

    /// Readiness selector tried before the fallback container
    #[arg(long)]
    pub selector: Option<String>,
}

impl TargetArgs {
    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            scale: self.scale.unwrap_or(DEFAULT_SCALE),
            background_color: self.background_color.clone(),
            embed_fonts: !self.no_embed_fonts,
            compress: self.compress,
            padding: 0,
        }
    }
}

fn parse_viewport(s: &str) -> Result<Viewport, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let viewport = Viewport {
        width: w.trim().parse().map_err(|e| format!("width: {}", e))?,
        height: h.trim().parse().map_err(|e| format!("height: {}", e))?,
    };
    viewport.validate().map_err(|e| e.to_string())?;
    Ok(viewport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("1280x720", Some((1280, 720)) ; "lowercase separator")]
    #[test_case("800X600", Some((800, 600)) ; "uppercase separator")]
    #[test_case(" 640 x 480 ", Some((640, 480)) ; "padded")]
    #[test_case("1280", None ; "missing height")]
    #[test_case("0x720", None ; "zero width")]
    #[test_case("wide x tall", None ; "not numbers")]
    fn test_parse_viewport(input: &str, expected: Option<(u32, u32)>) {
        let parsed = parse_viewport(input.trim()).ok().map(|v| (v.width, v.height));
        assert_eq!(parsed, expected);
    }
}
