//! Error types for figdiff

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::ImageMeta;

/// Result type alias using figdiff Error
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage an I/O operation belongs to, used to tag timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    HealthCheck,
    Launch,
    Navigation,
    Readiness,
    Serialization,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::HealthCheck => write!(f, "health-check"),
            Stage::Launch => write!(f, "launch"),
            Stage::Navigation => write!(f, "navigation"),
            Stage::Readiness => write!(f, "readiness"),
            Stage::Serialization => write!(f, "serialization"),
        }
    }
}

/// Why the browser process could not be started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchErrorKind {
    Network,
    Permission,
    Timeout,
    Memory,
    Unknown,
}

impl LaunchErrorKind {
    /// Classify a launcher failure message
    pub fn classify(message: &str) -> Self {
        let msg = message.to_ascii_lowercase();
        if msg.contains("timed out") || msg.contains("timeout") {
            LaunchErrorKind::Timeout
        } else if msg.contains("permission denied")
            || msg.contains("eacces")
            || msg.contains("operation not permitted")
            || msg.contains("sandbox")
        {
            LaunchErrorKind::Permission
        } else if msg.contains("out of memory")
            || msg.contains("enomem")
            || msg.contains("cannot allocate")
            || msg.contains("/dev/shm")
        {
            LaunchErrorKind::Memory
        } else if msg.contains("econnrefused")
            || msg.contains("connection refused")
            || msg.contains("websocket")
            || msg.contains("network")
            || msg.contains("dns")
        {
            LaunchErrorKind::Network
        } else {
            LaunchErrorKind::Unknown
        }
    }

    /// Ordered remediation steps for this failure kind
    pub fn solutions(&self) -> &'static [&'static str] {
        match self {
            LaunchErrorKind::Network => &[
                "Check that nothing blocks local connections to the browser debugging port",
                "Unset HTTP(S)_PROXY for localhost or add localhost to NO_PROXY",
                "Restart the tool so a fresh browser process is spawned",
            ],
            LaunchErrorKind::Permission => &[
                "Make sure the browser executable is executable by the current user",
                "When running as root or in a container, enable browser.no_sandbox in figdiff.toml",
                "Check that the profile/temp directory is writable",
            ],
            LaunchErrorKind::Timeout => &[
                "Raise browser.launch_timeout_ms in figdiff.toml",
                "Close other running browser instances to free CPU",
                "Verify the configured executable starts headless from a shell",
            ],
            LaunchErrorKind::Memory => &[
                "Free memory or reduce browser.max_pages",
                "Pass --disable-dev-shm-usage via browser.extra_args in containers",
                "Lower the capture scale to reduce raster size",
            ],
            LaunchErrorKind::Unknown => &[
                "Run with --verbose to see the launcher output",
                "Set browser.executable to a known-good Chrome or Chromium binary",
            ],
        }
    }
}

impl std::fmt::Display for LaunchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchErrorKind::Network => write!(f, "network"),
            LaunchErrorKind::Permission => write!(f, "permission"),
            LaunchErrorKind::Timeout => write!(f, "timeout"),
            LaunchErrorKind::Memory => write!(f, "memory"),
            LaunchErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// figdiff error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Browser launch failed ({kind}): {message}")]
    Launch {
        kind: LaunchErrorKind,
        message: String,
    },

    #[error("Dev server not reachable at {url} after {attempts} attempt(s): {reason}")]
    Availability {
        url: String,
        attempts: usize,
        reason: String,
    },

    #[error("Component not found at {url}: none of the selectors matched: {}", .tried.join(", "))]
    SelectorNotFound { url: String, tried: Vec<String> },

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("In-page serialization of '{selector}' at {url} failed: {message}")]
    Serialization {
        url: String,
        selector: String,
        message: String,
    },

    #[error("{stage} timed out after {}ms", .after.as_millis())]
    Timeout { stage: Stage, after: Duration },

    #[error("{stage} cancelled")]
    Cancelled { stage: Stage },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Comparison failed: {reason} [{actual}] vs [{expected}]")]
    Comparison {
        reason: String,
        actual: ImageMeta,
        expected: ImageMeta,
    },

    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    #[error("Reference image not found: {0}")]
    ReferenceNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Browser protocol error: {0}")]
    Browser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    pub fn launch(message: impl Into<String>) -> Self {
        let message = message.into();
        Error::Launch {
            kind: LaunchErrorKind::classify(&message),
            message,
        }
    }

    /// Stable machine-readable category reported as `errorType`
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Launch { kind, .. } => match kind {
                LaunchErrorKind::Network => "launch_network",
                LaunchErrorKind::Permission => "launch_permission",
                LaunchErrorKind::Timeout => "launch_timeout",
                LaunchErrorKind::Memory => "launch_memory",
                LaunchErrorKind::Unknown => "launch_unknown",
            },
            Error::Availability { .. } => "availability",
            Error::SelectorNotFound { .. } => "selector_not_found",
            Error::Navigation { .. } => "navigation",
            Error::Serialization { .. } => "serialization",
            Error::Timeout { .. } => "timeout",
            Error::Cancelled { .. } => "cancelled",
            Error::Validation(_) => "validation",
            Error::UnsupportedFormat(_) => "format",
            Error::Comparison { .. } | Error::Image(_) => "comparison",
            Error::UnknownComponent(_) => "unknown_component",
            Error::ReferenceNotFound(_) => "reference_not_found",
            Error::Config(_) => "config",
            Error::Browser(_) => "browser",
            Error::Io(_) => "io",
            Error::Json(_) => "serialization_format",
        }
    }

    /// Ordered remediation steps naming the probable cause
    pub fn solutions(&self) -> Vec<String> {
        match self {
            Error::Launch { kind, .. } => kind.solutions().iter().map(|s| s.to_string()).collect(),
            Error::Availability { url, .. } => vec![
                format!("Start the component dev server so that {} answers 200", url),
                "Check the --port argument matches the dev server port".to_string(),
            ],
            Error::SelectorNotFound { tried, .. } => vec![
                format!("Make sure the component renders an element matching one of: {}", tried.join(", ")),
                "Check the component route renders without runtime errors".to_string(),
            ],
            Error::Navigation { .. } => vec![
                "Open the component route in a browser and check for errors".to_string(),
            ],
            Error::Timeout { stage, .. } => vec![format!(
                "Raise the {} timeout in figdiff.toml or check why the page is slow",
                stage
            )],
            Error::ReferenceNotFound(path) => vec![format!(
                "Export the design reference to {}",
                path.display()
            )],
            Error::UnknownComponent(_) => vec![
                "Add the component to [[components]] in figdiff.toml".to_string(),
            ],
            _ => Vec::new(),
        }
    }

    /// Whether the error came from a deadline or cancellation
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::Cancelled { .. })
    }
}
