//! In-page script builders
//!
//! Every value spliced into a script goes through `serde_json`, so selectors
//! and colors are always emitted as JS string literals.

use serde::{Deserialize, Serialize};
use serde_json::json;

use figdiff_common::CaptureOptions;

const DOM_TO_RASTER: &str = include_str!("js/dom_to_raster.js");

/// Value returned by the DOM-to-raster script
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RasterPayload {
    /// `data:image/png;base64,...`
    pub data_url: String,
    /// Element size in CSS pixels
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub text_boxes: Vec<CssRect>,
}

/// Rectangle in CSS pixels relative to the captured element
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct CssRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

fn literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// `true` once an element matching `selector` exists and has a layout box
pub fn selector_present(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({sel}); \
         if (!el) return false; const r = el.getBoundingClientRect(); \
         return r.width > 0 && r.height > 0; }})()",
        sel = literal(selector)
    )
}

/// Resolves once the document is complete, web fonts are loaded and no
/// resource has finished loading for `idle_ms`, or after `max_ms`.
pub fn network_idle(idle_ms: u64, max_ms: u64) -> String {
    format!(
        r#"new Promise((resolve) => {{
  const started = performance.now();
  const lastResourceEnd = () => {{
    const entries = performance.getEntriesByType('resource');
    return entries.reduce((latest, e) => Math.max(latest, e.responseEnd), 0);
  }};
  const poll = async () => {{
    if (document.readyState === 'complete') {{
      if (document.fonts && document.fonts.ready) {{
        await document.fonts.ready;
      }}
      const now = performance.now();
      if (now - lastResourceEnd() >= {idle}) {{
        resolve(true);
        return;
      }}
    }}
    if (performance.now() - started >= {max}) {{
      resolve(false);
      return;
    }}
    setTimeout(poll, 50);
  }};
  poll();
}})"#,
        idle = idle_ms,
        max = max_ms
    )
}

/// Full DOM-to-raster invocation for the element matching `selector`
pub fn capture_call(selector: &str, options: &CaptureOptions) -> String {
    let opts = json!({
        "scale": options.scale,
        "backgroundColor": options.background_color,
        "embedFonts": options.embed_fonts,
    });
    format!(
        "(() => {{\nconst __figdiffSelector = {sel};\nconst __figdiffOptions = {opts};\nreturn (\n{body}\n);\n}})()",
        sel = literal(selector),
        opts = opts,
        body = DOM_TO_RASTER
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_is_escaped() {
        let script = selector_present(r#"[data-name="a'b"]"#);
        assert!(script.contains(r#"document.querySelector("[data-name=\"a'b\"]")"#));
    }

    #[test]
    fn test_capture_call_binds_options() {
        let options = CaptureOptions {
            scale: 2.0,
            background_color: Some("#ffffff".to_string()),
            ..Default::default()
        };
        let script = capture_call(".benchmark-container", &options);
        assert!(script.contains(r#"const __figdiffSelector = ".benchmark-container";"#));
        assert!(script.contains(r#""scale":2.0"#));
        assert!(script.contains(r##""backgroundColor":"#ffffff""##));
        assert!(script.contains("foreignObject"));
        assert!(script.trim_end().ends_with("})()"));
    }

    #[test]
    fn test_network_idle_embeds_limits() {
        let script = network_idle(500, 10_000);
        assert!(script.contains(">= 500"));
        assert!(script.contains(">= 10000"));
    }

    #[test]
    fn test_payload_deserializes() {
        let payload: RasterPayload = serde_json::from_value(json!({
            "dataUrl": "data:image/png;base64,AAAA",
            "width": 120.0,
            "height": 40.0,
            "textBoxes": [{"x": 4.0, "y": 2.0, "width": 30.0, "height": 12.0}]
        }))
        .unwrap();
        assert_eq!(payload.text_boxes.len(), 1);
        assert_eq!(payload.width, 120.0);
    }
}
