//! figdiff compare
//!
//! Pixel comparison of a capture against its design reference, clustering
//! and classification of the differences, and report output.

pub mod analyzer;
pub mod asset;
pub mod classify;
pub mod pixel;
pub mod regions;
pub mod report;

pub use analyzer::{analyze, Analysis, Analyzer};
pub use asset::{encode_image, optimize_asset, AssetFormat, OptimizeOptions, OptimizeResult};
pub use classify::{Classifier, Heuristic, RegionFeatures};
pub use pixel::PixelComparator;
pub use report::{Artifact, Artifacts, ComparisonSummary, Report, ReportPaths};
