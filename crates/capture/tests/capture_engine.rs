//! Capture engine behaviour that does not need a browser

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use figdiff_capture::{BrowserSession, CaptureEngine, Deadline};
use figdiff_common::config::{BrowserSettings, CaptureSettings};
use figdiff_common::{CaptureOptions, CaptureRequest, ComponentEntry, ComponentRegistry, Error};

fn engine(registry: ComponentRegistry) -> CaptureEngine {
    let settings = CaptureSettings {
        health_check_attempts: 2,
        health_check_backoff_ms: 10,
        health_check_timeout_ms: 300,
        ..Default::default()
    };
    let session = Arc::new(BrowserSession::new(BrowserSettings::default()));
    CaptureEngine::new(session, settings, Arc::new(registry)).unwrap()
}

async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_unreachable_dev_server_fails_before_launch() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("results/Button/actual.png");
    let engine = engine(ComponentRegistry::default());
    let request = CaptureRequest::new("Button", closed_port().await, &output);

    let err = engine
        .capture(&request, &Deadline::after(Duration::from_secs(10)))
        .await
        .unwrap_err();

    match &err {
        Error::Availability { url, attempts, .. } => {
            assert_eq!(url, &request.server_url());
            assert_eq!(*attempts, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.error_type(), "availability");
    assert!(!err.solutions().is_empty());
    assert!(!output.exists());
    assert!(!engine.session().check_availability().engine_loaded);
}

#[tokio::test]
async fn test_unknown_component_is_rejected() {
    let registry = ComponentRegistry::from_entries(&[ComponentEntry {
        name: "Card".to_string(),
        route: None,
        selector: None,
        viewport: None,
    }])
    .unwrap();
    let engine = engine(registry);
    let request = CaptureRequest::new("Modal", 3000, "actual.png");

    let err = engine
        .capture(&request, &Deadline::after(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownComponent(name) if name == "Modal"));
}

#[tokio::test]
async fn test_padding_is_rejected_before_any_io() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("actual.png");
    let engine = engine(ComponentRegistry::default());
    let request = CaptureRequest::new("Button", closed_port().await, &output).with_options(CaptureOptions {
        padding: 8,
        ..Default::default()
    });

    let err = engine
        .capture(&request, &Deadline::after(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(!output.exists());
}
