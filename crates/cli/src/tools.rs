//! Top-level operation handlers
//!
//! Each tool takes a flat JSON argument object and returns a JSON object
//! carrying a `success` flag. Failures are turned into
//! `{success: false, error, errorType, solutions}` here and nowhere else.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use figdiff_capture::{BrowserSession, CaptureEngine, Deadline};
use figdiff_common::{
    CaptureOptions, CaptureRequest, CaptureResult, ComponentRegistry, Error, FigdiffConfig, Result, Viewport,
    VERSION,
};
use figdiff_compare::{optimize_asset, OptimizeOptions};

use crate::pipeline;

pub const CAPTURE: &str = "capture";
pub const COMPARE: &str = "compare";
pub const OPTIMIZE_ASSET: &str = "optimize-asset";
pub const STATUS: &str = "status";

pub const TOOL_NAMES: [&str; 4] = [CAPTURE, COMPARE, OPTIMIZE_ASSET, STATUS];

/// File name of the capture inside a component's results directory
pub const ACTUAL_FILE: &str = "actual.png";

/// Arguments of the capture tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureArgs {
    pub component_name: String,
    #[serde(default)]
    pub project_path: Option<PathBuf>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub viewport: Option<Viewport>,
    #[serde(default)]
    pub capture_options: Option<CaptureOptions>,
    /// Defaults to `results/{componentName}/actual.png`
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    #[serde(default)]
    pub selector: Option<String>,
}

/// Arguments of the compare tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareArgs {
    pub component_name: String,
    #[serde(default)]
    pub project_path: Option<PathBuf>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub viewport: Option<Viewport>,
    #[serde(default)]
    pub capture_options: Option<CaptureOptions>,
    #[serde(default)]
    pub selector: Option<String>,
    /// Defaults to `compare.threshold`
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Also write `report.md`; defaults to `compare.generate_report`
    #[serde(default)]
    pub generate_report: Option<bool>,
}

impl CompareArgs {
    /// Capture arguments writing to the conventional `actual.png`
    pub fn capture_args(&self) -> CaptureArgs {
        CaptureArgs {
            component_name: self.component_name.clone(),
            project_path: self.project_path.clone(),
            port: self.port,
            viewport: self.viewport,
            capture_options: self.capture_options.clone(),
            output_path: None,
            selector: self.selector.clone(),
        }
    }
}

/// Arguments of the optimize-asset tool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeArgs {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    #[serde(default)]
    pub project_path: Option<PathBuf>,
    #[serde(flatten)]
    pub options: OptimizeOptions,
}

/// Shared state of all tool invocations: configuration and the browser
pub struct ToolContext {
    config: FigdiffConfig,
    project_path: PathBuf,
    engine: CaptureEngine,
    shutdown: CancellationToken,
}

impl ToolContext {
    pub fn new(config: FigdiffConfig, project_path: impl Into<PathBuf>) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(ComponentRegistry::from_entries(&config.components)?);
        let session = Arc::new(BrowserSession::new(config.browser.clone()));
        let engine = CaptureEngine::new(session, config.capture.clone(), registry)?;

        Ok(Self {
            config,
            project_path: project_path.into(),
            engine,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &FigdiffConfig {
        &self.config
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    pub fn engine(&self) -> &CaptureEngine {
        &self.engine
    }

    /// Cancelling this token aborts every in-flight invocation
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Fresh deadline for one invocation
    pub fn deadline(&self) -> Deadline {
        let budget = self
            .config
            .capture
            .total_budget()
            .saturating_add(self.config.browser.launch_timeout());
        Deadline::after(budget).with_token(self.shutdown.child_token())
    }

    /// Project directory of a request, falling back to the context's
    pub fn project_dir(&self, requested: Option<&Path>) -> PathBuf {
        match requested {
            Some(path) => resolve_path(&self.project_path, path),
            None => self.project_path.clone(),
        }
    }

    /// Invoke `tool` with `arguments`. Never fails: errors become the
    /// failure shape of the returned value.
    pub async fn call(&self, tool: &str, arguments: Value) -> Value {
        debug!("Invoking {} with {}", tool, arguments);
        let outcome = match tool {
            CAPTURE => self.capture(arguments).await,
            COMPARE => self.compare(arguments).await,
            OPTIMIZE_ASSET => self.optimize_asset(arguments).await,
            STATUS => self.status(),
            other => Err(Error::Validation(format!(
                "unknown tool '{}' (available: {})",
                other,
                TOOL_NAMES.join(", ")
            ))),
        };

        match outcome {
            Ok(value) => value,
            Err(e) => {
                warn!("{} failed ({}): {}", tool, e.error_type(), e);
                failure(&e)
            }
        }
    }

    pub async fn capture(&self, arguments: Value) -> Result<Value> {
        let args: CaptureArgs = parse_args(arguments)?;
        let result = self.run_capture(&args).await?;
        success(&result)
    }

    pub async fn compare(&self, arguments: Value) -> Result<Value> {
        let args: CompareArgs = parse_args(arguments)?;
        let outcome = pipeline::run(self, &args).await?;
        success(&outcome)
    }

    pub async fn optimize_asset(&self, arguments: Value) -> Result<Value> {
        let args: OptimizeArgs = parse_args(arguments)?;
        let project = self.project_dir(args.project_path.as_deref());
        let input = resolve_path(&project, &args.input_path);
        let output = resolve_path(&project, &args.output_path);

        let result = tokio::task::spawn_blocking(move || optimize_asset(&input, &output, &args.options))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;
        success(&result)
    }

    /// Browser availability without launching anything
    pub fn status(&self) -> Result<Value> {
        let availability = self.engine.session().check_availability();
        let mut value = success(&availability)?;
        if let Value::Object(map) = &mut value {
            map.insert("version".to_string(), json!(VERSION));
            map.insert("idlePages".to_string(), json!(self.engine.session().idle_pages()));
            map.insert("maxPages".to_string(), json!(self.config.browser.max_pages));
        }
        Ok(value)
    }

    /// Capture as described by `args`
    pub async fn run_capture(&self, args: &CaptureArgs) -> Result<CaptureResult> {
        let project = self.project_dir(args.project_path.as_deref());
        let component = self.engine.registry().resolve(&args.component_name)?;

        let output = match &args.output_path {
            Some(path) => resolve_path(&project, path),
            None => self
                .config
                .component_results_dir(&project, &component.name)
                .join(ACTUAL_FILE),
        };
        let is_png = output
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png"));
        if !is_png {
            return Err(Error::UnsupportedFormat(format!(
                "capture output {} must be a .png file",
                output.display()
            )));
        }

        let viewport = args
            .viewport
            .or(component.viewport)
            .unwrap_or(self.config.capture.viewport);
        let request = CaptureRequest::new(component.name, args.port.unwrap_or(self.config.capture.port), output)
            .with_viewport(viewport)
            .with_options(args.capture_options.clone().unwrap_or_default())
            .with_selector(args.selector.clone());

        self.engine.capture(&request, &self.deadline()).await
    }

    /// Close the browser. Only possible once no invocation holds the session.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let session = Arc::clone(self.engine.session());
        drop(self);
        match Arc::try_unwrap(session) {
            Ok(session) => {
                session.teardown().await;
                info!("Browser session closed");
            }
            Err(_) => warn!("Browser session still in use, leaving it to process exit"),
        }
    }
}

/// Tool names with their argument schemas
pub fn tool_definitions() -> Value {
    let viewport = json!({
        "type": "object",
        "properties": {"width": {"type": "integer"}, "height": {"type": "integer"}},
        "required": ["width", "height"]
    });
    let capture_options = json!({
        "type": "object",
        "properties": {
            "scale": {"type": "number", "default": figdiff_common::DEFAULT_SCALE},
            "compress": {"type": "boolean", "default": false},
            "embedFonts": {"type": "boolean", "default": true},
            "backgroundColor": {"type": "string"},
            "padding": {"type": "integer", "enum": [0]}
        }
    });

    json!([
        {
            "name": CAPTURE,
            "description": "Render a component from the dev server to a PNG",
            "arguments": {
                "type": "object",
                "properties": {
                    "componentName": {"type": "string"},
                    "projectPath": {"type": "string"},
                    "port": {"type": "integer"},
                    "viewport": viewport,
                    "captureOptions": capture_options,
                    "outputPath": {"type": "string"},
                    "selector": {"type": "string"}
                },
                "required": ["componentName"]
            }
        },
        {
            "name": COMPARE,
            "description": "Capture a component, diff it against results/{componentName}/expected.* and write a report",
            "arguments": {
                "type": "object",
                "properties": {
                    "componentName": {"type": "string"},
                    "projectPath": {"type": "string"},
                    "port": {"type": "integer"},
                    "viewport": viewport,
                    "captureOptions": capture_options,
                    "selector": {"type": "string"},
                    "threshold": {"type": "number", "default": figdiff_common::DEFAULT_THRESHOLD},
                    "generateReport": {"type": "boolean"}
                },
                "required": ["componentName"]
            }
        },
        {
            "name": OPTIMIZE_ASSET,
            "description": "Re-encode an image as png, jpeg or webp, optionally downscaled",
            "arguments": {
                "type": "object",
                "properties": {
                    "inputPath": {"type": "string"},
                    "outputPath": {"type": "string"},
                    "projectPath": {"type": "string"},
                    "format": {"type": "string", "enum": ["png", "jpeg", "webp"]},
                    "quality": {"type": "integer", "minimum": 1, "maximum": 100},
                    "compressionLevel": {"type": "integer", "minimum": 0, "maximum": 9},
                    "maxWidth": {"type": "integer", "minimum": 1},
                    "maxHeight": {"type": "integer", "minimum": 1}
                },
                "required": ["inputPath", "outputPath"]
            }
        },
        {
            "name": STATUS,
            "description": "Report whether a browser is available, without launching it",
            "arguments": {"type": "object", "properties": {}}
        }
    ])
}

/// Deserialize tool arguments; a missing object counts as empty
pub fn parse_args<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T> {
    let arguments = if arguments.is_null() {
        Value::Object(Map::new())
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| Error::Validation(format!("invalid arguments: {}", e)))
}

/// Serialize `body` and mark it successful
pub fn success<T: Serialize>(body: &T) -> Result<Value> {
    Ok(match serde_json::to_value(body)? {
        Value::Object(mut map) => {
            map.insert("success".to_string(), Value::Bool(true));
            Value::Object(map)
        }
        other => json!({"success": true, "result": other}),
    })
}

/// The failure response for `err`
pub fn failure(err: &Error) -> Value {
    let mut value = json!({
        "success": false,
        "error": err.to_string(),
        "errorType": err.error_type(),
    });
    let solutions = err.solutions();
    if !solutions.is_empty() {
        value["solutions"] = json!(solutions);
    }
    value
}

fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
