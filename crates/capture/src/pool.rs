//! Bounded pool of reusable pages
//!
//! Pages are handed out as [`PageLease`]s. Dropping a lease returns its page
//! to the idle list; [`PageLease::discard`] closes it instead. A semaphore
//! caps how many leases exist at once.

use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::page::Page;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use figdiff_common::{Error, Result};

/// A page that can be pooled and eventually closed
#[async_trait]
pub trait PooledPage: Send + 'static {
    async fn close(self) -> Result<()>;
}

#[async_trait]
impl PooledPage for Page {
    async fn close(self) -> Result<()> {
        Page::close(self)
            .await
            .map_err(|e| Error::Browser(format!("failed to close page: {}", e)))
    }
}

/// Idle pages plus the checkout bound
pub struct PagePool<P> {
    idle: Arc<Mutex<Vec<P>>>,
    permits: Arc<Semaphore>,
}

impl<P: PooledPage> PagePool<P> {
    pub fn new(max_pages: usize) -> Self {
        Self {
            idle: Arc::new(Mutex::new(Vec::new())),
            permits: Arc::new(Semaphore::new(max_pages.max(1))),
        }
    }

    /// Check out an idle page, or one built by `open` when none is idle.
    ///
    /// Waits while every permit is held. A failed `open` releases its permit.
    pub async fn checkout<F, Fut>(&self, open: F) -> Result<PageLease<P>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<P>>,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| Error::Browser("page pool closed".to_string()))?;

        let reused = self.idle.lock().pop();
        let page = match reused {
            Some(page) => {
                debug!("Reusing pooled page");
                page
            }
            None => open().await?,
        };

        Ok(PageLease {
            page: Some(page),
            idle: Arc::clone(&self.idle),
            _permit: permit,
        })
    }

    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    /// Leases that could be handed out right now
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Empty the idle list
    pub fn drain(&self) -> Vec<P> {
        std::mem::take(&mut *self.idle.lock())
    }
}

/// A checked-out page; returns to the pool on drop
pub struct PageLease<P: PooledPage = Page> {
    page: Option<P>,
    idle: Arc<Mutex<Vec<P>>>,
    _permit: OwnedSemaphorePermit,
}

impl<P: PooledPage> PageLease<P> {
    /// Close the page instead of pooling it, for pages left in an unknown state
    pub fn discard(mut self) {
        if let Some(page) = self.page.take() {
            tokio::spawn(async move {
                if let Err(e) = page.close().await {
                    debug!("Failed to close discarded page: {}", e);
                }
            });
        }
    }
}

impl<P: PooledPage> Deref for PageLease<P> {
    type Target = P;

    fn deref(&self) -> &P {
        // `page` is only taken by `discard` and `drop`, both of which consume the lease
        self.page.as_ref().unwrap_or_else(|| unreachable!("page lease used after release"))
    }
}

impl<P: PooledPage> Drop for PageLease<P> {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            self.idle.lock().push(page);
        }
    }
}
