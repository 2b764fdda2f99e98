//! Browser session management
//!
//! One headless browser process per tool invocation, launched on the first
//! page checkout and shared by every capture. Pages come from a bounded
//! [`PagePool`] and are reused rather than closed.

use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use figdiff_common::config::BrowserSettings;
use figdiff_common::{Availability, Error, LaunchErrorKind, Result};

use crate::pool::{PageLease, PagePool};

/// Grace period on top of the launcher's own timeout
const LAUNCH_GRACE: Duration = Duration::from_secs(2);

/// Running browser process with its CDP event pump
struct LaunchedBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// Process-wide browser handle with a bounded page pool
pub struct BrowserSession {
    settings: BrowserSettings,
    launched: OnceCell<LaunchedBrowser>,
    pool: PagePool<Page>,
}

impl BrowserSession {
    /// Create a session; the browser itself starts on first [`acquire`](Self::acquire)
    pub fn new(settings: BrowserSettings) -> Self {
        let pool = PagePool::new(settings.max_pages);
        Self {
            settings,
            launched: OnceCell::new(),
            pool,
        }
    }

    pub fn settings(&self) -> &BrowserSettings {
        &self.settings
    }

    /// Check out a page, launching the browser if this is the first call.
    ///
    /// Waits while `max_pages` pages are already checked out. The page goes
    /// back to the pool when the returned lease is dropped.
    pub async fn acquire(&self) -> Result<PageLease> {
        self.pool.checkout(|| self.open_page()).await
    }

    async fn open_page(&self) -> Result<Page> {
        let launched = self.launched.get_or_try_init(|| self.launch()).await?;
        debug!("Opening new page");
        launched
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::Browser(format!("failed to open page: {}", e)))
    }

    /// Health probe without network access or process spawning
    pub fn check_availability(&self) -> Availability {
        let engine_loaded = self.launched.initialized();
        let runtime_bundled = self
            .settings
            .executable
            .as_ref()
            .map(|p| p.is_file())
            .unwrap_or(false);
        let available = engine_loaded
            || runtime_bundled
            || (self.settings.executable.is_none() && BrowserConfig::builder().build().is_ok());

        Availability {
            available,
            engine_loaded,
            runtime_bundled,
        }
    }

    /// Number of idle pages in the pool
    pub fn idle_pages(&self) -> usize {
        self.pool.idle()
    }

    /// Close pooled pages and shut the browser down
    pub async fn teardown(mut self) {
        for page in self.pool.drain() {
            if let Err(e) = page.close().await {
                debug!("Failed to close pooled page: {}", e);
            }
        }

        if let Some(mut launched) = self.launched.take() {
            info!("Shutting down browser");
            if let Err(e) = launched.browser.close().await {
                warn!("Browser close failed: {}", e);
            }
            if let Err(e) = launched.browser.wait().await {
                debug!("Browser wait failed: {}", e);
            }
            launched.handler.abort();
        }
    }

    async fn launch(&self) -> Result<LaunchedBrowser> {
        let config = self.browser_config()?;
        info!("Launching headless browser");

        let launch_timeout = self.settings.launch_timeout() + LAUNCH_GRACE;
        let (browser, mut handler) = match tokio::time::timeout(launch_timeout, Browser::launch(config)).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                let err = Error::launch(e.to_string());
                error!("{}", err);
                return Err(err);
            }
            Err(_) => {
                error!("Browser launch timed out after {:?}", launch_timeout);
                return Err(Error::Launch {
                    kind: LaunchErrorKind::Timeout,
                    message: format!("browser did not start within {:?}", launch_timeout),
                });
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser event error: {}", e);
                }
            }
        });

        Ok(LaunchedBrowser { browser, handler })
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let s = &self.settings;
        let mut builder = BrowserConfig::builder()
            .launch_timeout(s.launch_timeout())
            .request_timeout(s.request_timeout())
            .arg("--hide-scrollbars")
            .arg("--force-color-profile=srgb")
            .arg("--font-render-hinting=none")
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-sync");

        if let Some(path) = &s.executable {
            builder = builder.chrome_executable(path);
        }
        if !s.headless {
            builder = builder.with_head();
        }
        if s.no_sandbox {
            builder = builder.no_sandbox();
        }
        for arg in &s.extra_args {
            builder = builder.arg(arg.as_str());
        }

        builder.build().map_err(Error::launch)
    }
}
