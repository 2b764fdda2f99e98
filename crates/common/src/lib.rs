//! figdiff Common Library
//!
//! Shared data model, error taxonomy, configuration and the component
//! registry used by the capture, compare and CLI crates.

pub mod atomic;
pub mod config;
pub mod error;
pub mod registry;
pub mod types;

// Re-export commonly used types
pub use atomic::write_atomic;
pub use config::FigdiffConfig;
pub use error::{Error, LaunchErrorKind, Result, Stage};
pub use registry::{ComponentEntry, ComponentRegistry, ResolvedComponent};
pub use types::*;

/// figdiff version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file name, looked up in the project directory
pub const CONFIG_FILE_NAME: &str = "figdiff.toml";

/// Default configuration path for a project directory
pub fn default_config_path(project_path: &std::path::Path) -> std::path::PathBuf {
    project_path.join(CONFIG_FILE_NAME)
}
