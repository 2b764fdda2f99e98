//! figdiff configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::registry::ComponentEntry;
use crate::types::{Viewport, DEFAULT_THRESHOLD};

/// Highest perceptual threshold accepted unless the config lowers it
pub const DEFAULT_MAX_THRESHOLD: f64 = 0.1;

/// Longest accepted value of any `*_ms` setting (10 minutes)
pub const MAX_TIMEOUT_MS: u64 = 600_000;

/// Image extensions figdiff reads and writes
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Top-level configuration, usually loaded from `figdiff.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FigdiffConfig {
    #[serde(default)]
    pub browser: BrowserSettings,

    #[serde(default)]
    pub capture: CaptureSettings,

    #[serde(default)]
    pub compare: CompareSettings,

    /// Static component registry; empty means any well-formed name resolves
    #[serde(default)]
    pub components: Vec<ComponentEntry>,
}

/// Browser process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Chrome/Chromium binary; auto-detected when unset
    pub executable: Option<PathBuf>,

    /// Upper bound on concurrently checked-out pages
    pub max_pages: usize,

    pub launch_timeout_ms: u64,

    /// Timeout of a single CDP request
    pub request_timeout_ms: u64,

    pub headless: bool,

    /// Required when running as root inside containers
    pub no_sandbox: bool,

    pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            max_pages: 4,
            launch_timeout_ms: 30_000,
            request_timeout_ms: 30_000,
            headless: true,
            no_sandbox: false,
            extra_args: Vec::new(),
        }
    }
}

impl BrowserSettings {
    pub fn launch_timeout(&self) -> Duration {
        Duration::from_millis(self.launch_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Capture defaults and stage timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Dev server port
    pub port: u16,

    pub viewport: Viewport,

    /// Readiness selector tried first
    pub primary_selector: String,

    /// Conventional container tried when the primary selector is absent
    pub fallback_selector: String,

    pub health_check_attempts: usize,

    /// First retry delay; doubled after every failed attempt
    pub health_check_backoff_ms: u64,

    /// Timeout of a single health request
    pub health_check_timeout_ms: u64,

    pub navigation_timeout_ms: u64,

    /// How long each readiness selector is polled
    pub selector_timeout_ms: u64,

    pub serialize_timeout_ms: u64,

    /// Quiet period after readiness, lets late layout settle
    pub settle_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            port: 3000,
            viewport: Viewport::default(),
            primary_selector: "[data-figdiff-root]".to_string(),
            fallback_selector: ".benchmark-container".to_string(),
            health_check_attempts: 5,
            health_check_backoff_ms: 250,
            health_check_timeout_ms: 2_000,
            navigation_timeout_ms: 30_000,
            selector_timeout_ms: 5_000,
            serialize_timeout_ms: 30_000,
            settle_ms: 100,
        }
    }
}

impl CaptureSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }

    pub fn serialize_timeout(&self) -> Duration {
        Duration::from_millis(self.serialize_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Upper bound of the whole capture, used as the outer deadline
    pub fn total_budget(&self) -> Duration {
        let attempts = self.health_check_attempts as u64;
        let health = self
            .health_check_timeout_ms
            .saturating_mul(attempts)
            .saturating_add(self.health_check_backoff_ms.saturating_mul(1u64 << attempts.min(16)));
        Duration::from_millis(
            health
                .saturating_add(self.navigation_timeout_ms)
                .saturating_add(self.selector_timeout_ms.saturating_mul(2))
                .saturating_add(self.serialize_timeout_ms)
                .saturating_add(self.settle_ms),
        )
    }
}

/// Comparison settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareSettings {
    /// Perceptual sensitivity (0-1, lower is stricter)
    pub threshold: f64,

    /// Thresholds above this are rejected
    pub max_threshold: f64,

    /// Results directory, relative to the project path
    pub results_dir: PathBuf,

    /// Extension of `diff.*`; captures are always PNG
    pub image_extension: String,

    pub generate_report: bool,
}

impl Default for CompareSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_threshold: DEFAULT_MAX_THRESHOLD,
            results_dir: PathBuf::from("results"),
            image_extension: "png".to_string(),
            generate_report: true,
        }
    }
}

impl FigdiffConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
            config.validate()?;
            debug!("Loaded configuration from {}", path.display());
            Ok(config)
        } else {
            debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        crate::atomic::write_atomic(path, content.as_bytes())?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let b = &self.browser;
        if b.max_pages == 0 || b.max_pages > 32 {
            return Err(Error::Config(format!("browser.max_pages {} out of range 1..=32", b.max_pages)));
        }
        if b.launch_timeout_ms == 0 || b.request_timeout_ms == 0 {
            return Err(Error::Config("browser timeouts must be non-zero".to_string()));
        }
        check_millis("browser.launch_timeout_ms", b.launch_timeout_ms)?;
        check_millis("browser.request_timeout_ms", b.request_timeout_ms)?;

        let c = &self.capture;
        if c.port == 0 {
            return Err(Error::Config("capture.port must be non-zero".to_string()));
        }
        c.viewport.validate()?;
        if c.primary_selector.trim().is_empty() || c.fallback_selector.trim().is_empty() {
            return Err(Error::Config("capture selectors must not be empty".to_string()));
        }
        if c.health_check_attempts == 0 || c.health_check_attempts > 20 {
            return Err(Error::Config(format!(
                "capture.health_check_attempts {} out of range 1..=20",
                c.health_check_attempts
            )));
        }
        if c.health_check_timeout_ms == 0
            || c.navigation_timeout_ms == 0
            || c.selector_timeout_ms == 0
            || c.serialize_timeout_ms == 0
        {
            return Err(Error::Config("capture timeouts must be non-zero".to_string()));
        }
        for (name, value) in [
            ("capture.health_check_backoff_ms", c.health_check_backoff_ms),
            ("capture.health_check_timeout_ms", c.health_check_timeout_ms),
            ("capture.navigation_timeout_ms", c.navigation_timeout_ms),
            ("capture.selector_timeout_ms", c.selector_timeout_ms),
            ("capture.serialize_timeout_ms", c.serialize_timeout_ms),
            ("capture.settle_ms", c.settle_ms),
        ] {
            check_millis(name, value)?;
        }

        let m = &self.compare;
        if !(m.max_threshold > 0.0 && m.max_threshold <= 1.0) {
            return Err(Error::Config(format!(
                "compare.max_threshold {} out of range (0, 1]",
                m.max_threshold
            )));
        }
        check_threshold(m.threshold, m.max_threshold)?;
        if !SUPPORTED_EXTENSIONS.contains(&m.image_extension.as_str()) {
            return Err(Error::UnsupportedFormat(m.image_extension.clone()));
        }
        Ok(())
    }

    /// Directory holding `expected.*`, `actual.*` and `diff.*` for a component
    pub fn component_results_dir(&self, project_path: &Path, component: &str) -> PathBuf {
        project_path.join(&self.compare.results_dir).join(component)
    }
}

fn check_millis(name: &str, value: u64) -> Result<()> {
    if value > MAX_TIMEOUT_MS {
        return Err(Error::Config(format!(
            "{} {} exceeds the maximum of {} ms",
            name, value, MAX_TIMEOUT_MS
        )));
    }
    Ok(())
}

/// Reject thresholds outside `[0, 1]` or above `ceiling`.
///
/// Raising the threshold hides real rendering differences; the ceiling keeps
/// a failing comparison from being tuned into a passing one.
pub fn check_threshold(threshold: f64, ceiling: f64) -> Result<()> {
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(Error::Validation(format!("threshold {} out of range [0, 1]", threshold)));
    }
    if threshold > ceiling {
        return Err(Error::Validation(format!(
            "threshold {} exceeds the ceiling {}; fix the rendering instead of loosening the comparison",
            threshold, ceiling
        )));
    }
    Ok(())
}
