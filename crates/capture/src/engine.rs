//! DOM capture engine
//!
//! Drives one capture end to end: dev server health check, page checkout,
//! viewport and navigation, readiness, in-page serialization and the atomic
//! write of the resulting PNG.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use figdiff_common::config::CaptureSettings;
use figdiff_common::{
    CaptureMethod, CaptureOptions, CaptureRequest, CaptureResult, ComponentRegistry, Dimensions,
    Error, Result, Stage, TextBox, Viewport,
};

use crate::deadline::Deadline;
use crate::driver::PageDriver;
use crate::raster;
use crate::script::{self, RasterPayload};
use crate::server::DevServerProbe;
use crate::session::BrowserSession;

/// Interval between selector polls
const SELECTOR_POLL: Duration = Duration::from_millis(100);

/// Quiet period the network must show before readiness checks start
const NETWORK_IDLE_MS: u64 = 500;

/// Accepted deviation between the raster and `css size * scale`
const RASTER_TOLERANCE_PX: u32 = 2;

/// Everything `render_component` needs to know about one page
#[derive(Debug, Clone)]
pub struct RenderPlan {
    pub url: String,
    pub viewport: Viewport,
    /// Readiness selectors in the order they are tried
    pub selectors: Vec<String>,
    pub options: CaptureOptions,
    pub navigation_timeout: Duration,
    pub selector_timeout: Duration,
    pub serialize_timeout: Duration,
    pub settle: Duration,
}

impl RenderPlan {
    pub fn new(url: impl Into<String>, selectors: Vec<String>, settings: &CaptureSettings) -> Self {
        Self {
            url: url.into(),
            viewport: settings.viewport,
            selectors,
            options: CaptureOptions::default(),
            navigation_timeout: settings.navigation_timeout(),
            selector_timeout: settings.selector_timeout(),
            serialize_timeout: settings.serialize_timeout(),
            settle: settings.settle(),
        }
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn with_options(mut self, options: CaptureOptions) -> Self {
        self.options = options;
        self
    }
}

/// PNG produced by the in-page serializer
#[derive(Debug, Clone)]
pub struct RenderedRaster {
    pub png: Vec<u8>,
    pub dimensions: Dimensions,
    /// Selector that matched
    pub selector: String,
    pub used_fallback: bool,
    pub text_boxes: Vec<TextBox>,
}

/// Build the ordered, de-duplicated readiness selector chain
pub fn selector_chain(explicit: Option<&str>, primary: &str, fallback: &str) -> Vec<String> {
    let mut chain: Vec<String> = Vec::with_capacity(2);
    for candidate in [explicit.unwrap_or(primary), fallback] {
        if !chain.iter().any(|s| s == candidate) {
            chain.push(candidate.to_string());
        }
    }
    chain
}

/// Render the first element matching `plan.selectors` on a prepared page.
pub async fn render_component<D>(driver: &D, plan: &RenderPlan, deadline: &Deadline) -> Result<RenderedRaster>
where
    D: PageDriver + ?Sized,
{
    deadline
        .run(Stage::Navigation, plan.navigation_timeout, async {
            driver.set_viewport(plan.viewport).await?;
            driver.navigate(&plan.url).await
        })
        .await?;

    let idle_script = script::network_idle(NETWORK_IDLE_MS, plan.navigation_timeout.as_millis() as u64);
    let idle = deadline
        .run(Stage::Readiness, plan.navigation_timeout, driver.evaluate(idle_script))
        .await?;
    if idle != Value::Bool(true) {
        debug!("Network did not go idle on {}, continuing", plan.url);
    }

    let mut matched = None;
    for (index, selector) in plan.selectors.iter().enumerate() {
        if wait_for_selector(driver, selector, plan.selector_timeout, deadline).await? {
            matched = Some((index, selector.clone()));
            break;
        }
        debug!("Selector {} not found on {}", selector, plan.url);
    }
    let (index, selector) = matched.ok_or_else(|| Error::SelectorNotFound {
        url: plan.url.clone(),
        tried: plan.selectors.clone(),
    })?;
    if index > 0 {
        info!("Using fallback selector {} on {}", selector, plan.url);
    }

    deadline.sleep(Stage::Readiness, plan.settle).await?;

    let serialization_error = |message: String| Error::Serialization {
        url: plan.url.clone(),
        selector: selector.clone(),
        message,
    };

    let value = deadline
        .run(
            Stage::Serialization,
            plan.serialize_timeout,
            driver.evaluate(script::capture_call(&selector, &plan.options)),
        )
        .await
        .map_err(|e| match e {
            Error::Browser(message) => serialization_error(message),
            other => other,
        })?;
    let payload: RasterPayload = serde_json::from_value(value)
        .map_err(|e| serialization_error(format!("unexpected serializer output: {}", e)))?;

    let mut png = raster::decode_data_url(&payload.data_url)?;
    let dimensions = raster::dimensions_of(&png)?;
    let expected = plan.options.expected_raster_size(payload.width, payload.height);
    if !dimensions.within(&expected, RASTER_TOLERANCE_PX) {
        warn!(
            "Raster of {} is {} but {}x{} CSS px at scale {} should be {}",
            selector, dimensions, payload.width, payload.height, plan.options.scale, expected
        );
    }
    if plan.options.compress {
        png = raster::recompress_png(&png)?;
    }

    Ok(RenderedRaster {
        png,
        dimensions,
        text_boxes: raster::scale_text_boxes(&payload.text_boxes, plan.options.scale, dimensions),
        selector,
        used_fallback: index > 0,
    })
}

/// Poll `selector` until it has a layout box; `false` when its own limit runs out
async fn wait_for_selector<D>(driver: &D, selector: &str, limit: Duration, deadline: &Deadline) -> Result<bool>
where
    D: PageDriver + ?Sized,
{
    let probe = script::selector_present(selector);
    let poll = async {
        loop {
            if driver.evaluate(probe.clone()).await? == Value::Bool(true) {
                return Ok::<(), Error>(());
            }
            tokio::time::sleep(SELECTOR_POLL).await;
        }
    };

    match deadline.run(Stage::Readiness, limit, poll).await {
        Ok(()) => Ok(true),
        Err(Error::Timeout { .. }) if !deadline.is_expired() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Captures components from a running dev server
pub struct CaptureEngine {
    session: Arc<BrowserSession>,
    probe: DevServerProbe,
    settings: CaptureSettings,
    registry: Arc<ComponentRegistry>,
}

impl CaptureEngine {
    pub fn new(
        session: Arc<BrowserSession>,
        settings: CaptureSettings,
        registry: Arc<ComponentRegistry>,
    ) -> Result<Self> {
        let probe = DevServerProbe::new(&settings)?;
        Ok(Self {
            session,
            probe,
            settings,
            registry,
        })
    }

    pub fn session(&self) -> &Arc<BrowserSession> {
        &self.session
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Capture `request.component` and write it to `request.output_path`.
    ///
    /// The dev server is checked before any page is checked out, so an
    /// unreachable server never launches the browser or touches the output.
    #[instrument(skip(self, request, deadline), fields(component = %request.component))]
    pub async fn capture(&self, request: &CaptureRequest, deadline: &Deadline) -> Result<CaptureResult> {
        let started = Instant::now();
        request.validate()?;
        let component = self.registry.resolve(&request.component)?;

        let base_url = request.server_url();
        self.probe.wait_until_ready(&base_url, deadline).await?;

        let explicit = request.selector.as_deref().or(component.selector.as_deref());
        let selectors = selector_chain(
            explicit,
            &self.settings.primary_selector,
            &self.settings.fallback_selector,
        );
        let plan = RenderPlan::new(format!("{}{}", base_url, component.route), selectors, &self.settings)
            .with_viewport(request.viewport)
            .with_options(request.options.clone());

        let lease = deadline
            .run(Stage::Launch, deadline.remaining(), self.session.acquire())
            .await?;
        let rendered = match render_component(&*lease, &plan, deadline).await {
            Ok(rendered) => {
                drop(lease);
                rendered
            }
            Err(e) => {
                if e.is_timeout() {
                    lease.discard();
                }
                return Err(e);
            }
        };

        let bytes_written = figdiff_common::write_atomic(&request.output_path, &rendered.png)?;
        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Captured {} ({}) to {} in {}ms",
            request.component,
            rendered.dimensions,
            request.output_path.display(),
            duration_ms
        );

        Ok(CaptureResult {
            output_path: request.output_path.clone(),
            bytes_written,
            url: plan.url,
            selector: rendered.selector,
            used_fallback_selector: rendered.used_fallback,
            viewport: request.viewport,
            options: request.options.clone(),
            method: CaptureMethod::DomToRaster,
            dimensions: rendered.dimensions,
            text_boxes: rendered.text_boxes,
            duration_ms,
        })
    }
}
