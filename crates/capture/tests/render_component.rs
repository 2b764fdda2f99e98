//! Render pipeline tests against an in-memory page driver

use std::collections::HashSet;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, Rgba, RgbaImage};
use parking_lot::Mutex;
use serde_json::{json, Value};

use figdiff_capture::{render_component, selector_chain, Deadline, PageDriver, RenderPlan};
use figdiff_common::config::CaptureSettings;
use figdiff_common::{CaptureOptions, Dimensions, Error, Result, Stage, Viewport};

/// Element size in CSS pixels reported by the fake serializer
const CSS_WIDTH: f64 = 120.0;
const CSS_HEIGHT: f64 = 40.0;

#[derive(Default)]
struct FakeDriver {
    present: HashSet<String>,
    serialization_error: Option<String>,
    navigate_delay: Option<Duration>,
    visited: Mutex<Vec<String>>,
    viewports: Mutex<Vec<Viewport>>,
    captures: AtomicUsize,
}

impl FakeDriver {
    fn with_selectors(selectors: &[&str]) -> Self {
        Self {
            present: selectors.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn raster(&self, scale: f64) -> Value {
        let width = (CSS_WIDTH * scale).round() as u32;
        let height = (CSS_HEIGHT * scale).round() as u32;
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        json!({
            "dataUrl": format!("data:image/png;base64,{}", STANDARD.encode(out.into_inner())),
            "width": CSS_WIDTH,
            "height": CSS_HEIGHT,
            "textBoxes": [{"x": 10.0, "y": 10.0, "width": 50.0, "height": 16.0}]
        })
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        self.viewports.lock().push(viewport);
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        if let Some(delay) = self.navigate_delay {
            tokio::time::sleep(delay).await;
        }
        self.visited.lock().push(url.to_string());
        Ok(())
    }

    async fn evaluate(&self, expression: String) -> Result<Value> {
        if expression.contains("__figdiffOptions") {
            self.captures.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = &self.serialization_error {
                return Err(Error::Browser(message.clone()));
            }
            let scale = if expression.contains(r#""scale":2.0"#) { 2.0 } else { 3.0 };
            return Ok(self.raster(scale));
        }
        if expression.contains("getEntriesByType") {
            return Ok(Value::Bool(true));
        }
        let found = self
            .present
            .iter()
            .any(|s| expression.contains(&format!("document.querySelector({})", json!(s))));
        Ok(Value::Bool(found))
    }
}

fn plan(selectors: Vec<String>) -> RenderPlan {
    let settings = CaptureSettings {
        selector_timeout_ms: 150,
        settle_ms: 0,
        ..Default::default()
    };
    RenderPlan::new("http://localhost:3000/component/Button", selectors, &settings)
}

fn default_chain() -> Vec<String> {
    selector_chain(None, "[data-figdiff-root]", ".benchmark-container")
}

#[tokio::test]
async fn test_primary_selector_is_used_when_present() {
    let driver = FakeDriver::with_selectors(&["[data-figdiff-root]", ".benchmark-container"]);
    let deadline = Deadline::after(Duration::from_secs(10));

    let raster = render_component(&driver, &plan(default_chain()), &deadline).await.unwrap();

    assert_eq!(raster.selector, "[data-figdiff-root]");
    assert!(!raster.used_fallback);
    assert_eq!(driver.visited.lock().as_slice(), ["http://localhost:3000/component/Button"]);
    assert_eq!(driver.viewports.lock().as_slice(), [Viewport::default()]);
}

#[tokio::test]
async fn test_falls_back_to_container_selector() {
    let driver = FakeDriver::with_selectors(&[".benchmark-container"]);
    let deadline = Deadline::after(Duration::from_secs(10));

    let raster = render_component(&driver, &plan(default_chain()), &deadline).await.unwrap();

    assert_eq!(raster.selector, ".benchmark-container");
    assert!(raster.used_fallback);
    assert_eq!(driver.captures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_selectors_name_both() {
    let driver = FakeDriver::with_selectors(&[]);
    let deadline = Deadline::after(Duration::from_secs(10));

    let err = render_component(&driver, &plan(default_chain()), &deadline)
        .await
        .unwrap_err();

    match &err {
        Error::SelectorNotFound { url, tried } => {
            assert_eq!(url, "http://localhost:3000/component/Button");
            assert_eq!(tried, &vec!["[data-figdiff-root]".to_string(), ".benchmark-container".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    let message = err.to_string();
    assert!(message.contains("[data-figdiff-root]"));
    assert!(message.contains(".benchmark-container"));
    assert_eq!(driver.captures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_raster_is_css_size_times_scale() {
    let driver = FakeDriver::with_selectors(&["[data-figdiff-root]"]);
    let deadline = Deadline::after(Duration::from_secs(10));

    let raster = render_component(&driver, &plan(default_chain()), &deadline).await.unwrap();
    assert_eq!(raster.dimensions, Dimensions::new(360, 120));
    assert_eq!(raster.text_boxes.len(), 1);
    assert_eq!(raster.text_boxes[0].x, 30);
    assert_eq!(raster.text_boxes[0].width, 150);

    let options = CaptureOptions {
        scale: 2.0,
        compress: true,
        ..Default::default()
    };
    let raster = render_component(&driver, &plan(default_chain()).with_options(options), &deadline)
        .await
        .unwrap();
    assert_eq!(raster.dimensions, Dimensions::new(240, 80));
}

#[tokio::test]
async fn test_serialization_error_keeps_message() {
    let driver = FakeDriver {
        serialization_error: Some("Failed to execute 'toDataURL': Tainted canvases may not be exported".to_string()),
        ..FakeDriver::with_selectors(&["[data-figdiff-root]"])
    };
    let deadline = Deadline::after(Duration::from_secs(10));

    let err = render_component(&driver, &plan(default_chain()), &deadline)
        .await
        .unwrap_err();
    match err {
        Error::Serialization { selector, message, .. } => {
            assert_eq!(selector, "[data-figdiff-root]");
            assert!(message.contains("Tainted canvases"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_slow_navigation_times_out() {
    let driver = FakeDriver {
        navigate_delay: Some(Duration::from_secs(5)),
        ..FakeDriver::with_selectors(&["[data-figdiff-root]"])
    };
    let mut plan = plan(default_chain());
    plan.navigation_timeout = Duration::from_millis(50);
    let deadline = Deadline::after(Duration::from_secs(10));

    let err = render_component(&driver, &plan, &deadline).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { stage: Stage::Navigation, .. }));
    assert_eq!(driver.captures.load(Ordering::SeqCst), 0);
}
