//! figdiff CLI
//!
//! Tool handlers, the compare pipeline, the stdio tool server and the
//! subcommands of the `figdiff` binary.

pub mod commands;
pub mod output;
pub mod pipeline;
pub mod serve;
pub mod tools;

pub use pipeline::{CompareOutcome, ComparisonJob};
pub use serve::{serve, ToolRequest, ToolResponse};
pub use tools::{CaptureArgs, CompareArgs, OptimizeArgs, ToolContext};
