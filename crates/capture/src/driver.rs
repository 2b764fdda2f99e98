//! Page driver abstraction over the browser protocol

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use serde_json::Value;
use tracing::debug;

use figdiff_common::{Error, Result, Viewport};

/// The page operations the capture engine needs.
///
/// Implemented for [`chromiumoxide::page::Page`]; tests drive the engine
/// with an in-memory implementation instead of a real browser.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Override the layout viewport in CSS pixels at device scale 1
    async fn set_viewport(&self, viewport: Viewport) -> Result<()>;

    /// Load `url` and wait for the navigation to commit
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Evaluate a script expression, awaiting promises and returning by value.
    ///
    /// Exceptions thrown by the script surface as [`Error::Browser`].
    async fn evaluate(&self, expression: String) -> Result<Value>;
}

#[async_trait]
impl PageDriver for Page {
    async fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(viewport.width))
            .height(i64::from(viewport.height))
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(Error::Browser)?;
        self.execute(params)
            .await
            .map_err(|e| Error::Browser(format!("failed to set viewport: {}", e)))?;
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        self.goto(url).await.map_err(|e| Error::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        self.wait_for_navigation().await.map_err(|e| Error::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    async fn evaluate(&self, expression: String) -> Result<Value> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(Error::Browser)?;
        let result = self
            .evaluate_expression(params)
            .await
            .map_err(|e| Error::Browser(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }
}
