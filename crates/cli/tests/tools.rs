//! Tool handlers end to end, without a browser

use std::path::Path;

use image::{Rgba, RgbaImage};
use serde_json::{json, Value};
use test_case::test_case;
use tokio::net::TcpListener;

use figdiff_cli::tools::{CAPTURE, COMPARE, OPTIMIZE_ASSET, STATUS};
use figdiff_cli::ToolContext;
use figdiff_common::FigdiffConfig;

fn context(project: &Path) -> ToolContext {
    let mut config = FigdiffConfig::default();
    config.capture.health_check_attempts = 2;
    config.capture.health_check_backoff_ms = 10;
    config.capture.health_check_timeout_ms = 300;
    ToolContext::new(config, project).unwrap()
}

async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn write_white(path: &Path, width: u32, height: u32) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
        .save(path)
        .unwrap();
}

#[tokio::test]
async fn test_capture_with_server_down_reports_availability() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path());
    let port = closed_port().await;

    let value = ctx
        .call(CAPTURE, json!({"componentName": "Button", "port": port}))
        .await;

    assert_eq!(value["success"], false);
    assert_eq!(value["errorType"], "availability");
    assert!(value["error"].as_str().unwrap().contains(&port.to_string()));
    assert!(!value["solutions"].as_array().unwrap().is_empty());
    assert!(!dir.path().join("results/Button/actual.png").exists());
    assert!(!ctx.engine().session().check_availability().engine_loaded);
}

#[test_case(CAPTURE, json!({"componentName": "Button", "captureOptions": {"padding": 8}}), "validation" ; "capture with padding")]
#[test_case(CAPTURE, json!({"componentName": "Button", "captureOptions": {"scale": 10.0}}), "validation" ; "capture scale too large")]
#[test_case(CAPTURE, json!({"componentName": "Button", "outputPath": "shot.jpg"}), "format" ; "capture to jpeg")]
#[test_case(CAPTURE, json!({"componentName": "../secrets"}), "validation" ; "capture path traversal name")]
#[test_case(COMPARE, json!({"threshold": 0.01}), "validation" ; "compare without component")]
#[test_case(OPTIMIZE_ASSET, json!({"inputPath": "a.png", "outputPath": "b.png", "compressionLevel": 12}), "validation" ; "optimize compression level")]
#[test_case("screenshot", Value::Null, "validation" ; "unknown tool")]
#[tokio::test]
async fn test_rejected_before_any_work(tool: &str, arguments: Value, error_type: &str) {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path());

    let value = ctx.call(tool, arguments).await;
    assert_eq!(value["success"], false, "{value}");
    assert_eq!(value["errorType"], error_type, "{value}");
    assert!(!ctx.engine().session().check_availability().engine_loaded);
    assert!(!dir.path().join("results").exists());
}

#[tokio::test]
async fn test_compare_checks_reference_before_capture() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path());

    let value = ctx.call(COMPARE, json!({"componentName": "Card"})).await;
    assert_eq!(value["success"], false);
    assert_eq!(value["errorType"], "reference_not_found");
    assert!(value["solutions"][0].as_str().unwrap().contains("expected.png"));
    assert!(!ctx.engine().session().check_availability().engine_loaded);
}

#[tokio::test]
async fn test_compare_threshold_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    write_white(&dir.path().join("results/Card/expected.png"), 10, 10);
    let ctx = context(dir.path());

    let value = ctx
        .call(COMPARE, json!({"componentName": "Card", "threshold": 0.5}))
        .await;
    assert_eq!(value["success"], false);
    assert_eq!(value["errorType"], "validation");
    assert!(value["error"].as_str().unwrap().contains("ceiling"));
}

#[tokio::test]
async fn test_optimize_asset_through_handler() {
    let dir = tempfile::tempdir().unwrap();
    write_white(&dir.path().join("assets/hero.png"), 64, 32);
    let ctx = context(Path::new("/nonexistent"));

    let value = ctx
        .call(
            OPTIMIZE_ASSET,
            json!({
                "projectPath": dir.path(),
                "inputPath": "assets/hero.png",
                "outputPath": "assets/hero.jpg",
                "quality": 80,
                "maxWidth": 32
            }),
        )
        .await;

    assert_eq!(value["success"], true, "{value}");
    assert_eq!(value["format"], "jpeg");
    assert_eq!(value["dimensions"], json!({"width": 32, "height": 16}));
    assert!(dir.path().join("assets/hero.jpg").exists());
}

#[tokio::test]
async fn test_unknown_tool_and_status() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path());

    let value = ctx.call("screenshot", Value::Null).await;
    assert!(value["error"].as_str().unwrap().contains("optimize-asset"));

    let value = ctx.call(STATUS, Value::Null).await;
    assert_eq!(value["success"], true);
    assert_eq!(value["engineLoaded"], false);
    assert_eq!(value["idlePages"], 0);
}
