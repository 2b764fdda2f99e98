//! figdiff capture
//!
//! Owns the headless browser session and turns a running component route
//! into a PNG through in-page DOM serialization.

pub mod deadline;
pub mod driver;
pub mod engine;
pub mod pool;
pub mod raster;
pub mod script;
pub mod server;
pub mod session;

pub use deadline::Deadline;
pub use driver::PageDriver;
pub use engine::{render_component, selector_chain, CaptureEngine, RenderPlan, RenderedRaster};
pub use pool::{PageLease, PagePool, PooledPage};
pub use server::DevServerProbe;
pub use session::BrowserSession;
