//! Report emitter: `report.json` and `report.md`

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use figdiff_common::{
    write_atomic, ComparisonResult, Dimensions, DifferenceRegion, QualityTier, Recommendation, ResizeInfo,
    Result,
};

use crate::analyzer::Analysis;

pub const JSON_REPORT_NAME: &str = "report.json";
pub const MARKDOWN_REPORT_NAME: &str = "report.md";

/// Aggregate comparison statistics as reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSummary {
    pub match_percentage: f64,
    pub diff_pixels: u64,
    pub total_pixels: u64,
    pub antialiased_pixels: u64,
    pub dimensions: Dimensions,
    pub quality_tier: QualityTier,
    pub threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resized: Option<ResizeInfo>,
}

impl From<&ComparisonResult> for ComparisonSummary {
    fn from(result: &ComparisonResult) -> Self {
        Self {
            match_percentage: result.match_percentage(),
            diff_pixels: result.diff_pixel_count(),
            total_pixels: result.total_pixel_count(),
            antialiased_pixels: result.antialiased_pixel_count(),
            dimensions: result.dimensions(),
            quality_tier: result.quality_tier(),
            threshold: result.threshold(),
            resized: result.resized(),
        }
    }
}

/// A file that took part in the comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub sha256: String,
}

impl Artifact {
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            sha256: hex::encode(Sha256::digest(&bytes)),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifacts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<Artifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Artifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<Artifact>,
}

/// Full analysis report for one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub component_name: String,
    pub timestamp: DateTime<Utc>,
    pub comparison: ComparisonSummary,
    pub regions: Vec<DifferenceRegion>,
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub artifacts: Artifacts,
}

/// Where a report was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPaths {
    pub json: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<PathBuf>,
}

impl Report {
    pub fn new(component_name: impl Into<String>, result: &ComparisonResult, analysis: &Analysis) -> Self {
        Self {
            component_name: component_name.into(),
            timestamp: Utc::now(),
            comparison: ComparisonSummary::from(result),
            regions: analysis.regions.clone(),
            recommendations: analysis.recommendations.clone(),
            artifacts: Artifacts::default(),
        }
    }

    pub fn with_artifacts(mut self, artifacts: Artifacts) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_markdown(&self) -> String {
        let c = &self.comparison;
        let mut md = String::new();

        let _ = writeln!(md, "# Visual comparison: {}", self.component_name);
        let _ = writeln!(md);
        let _ = writeln!(md, "_Generated {}_", self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(md);
        let _ = writeln!(
            md,
            "**{} {}** at {:.2}% match",
            c.quality_tier.emoji(),
            c.quality_tier,
            c.match_percentage
        );
        let _ = writeln!(md);
        let _ = writeln!(md, "| Metric | Value |");
        let _ = writeln!(md, "|---|---|");
        let _ = writeln!(md, "| Match | {:.2}% |", c.match_percentage);
        let _ = writeln!(md, "| Differing pixels | {} |", c.diff_pixels);
        let _ = writeln!(md, "| Total pixels | {} |", c.total_pixels);
        let _ = writeln!(md, "| Anti-aliased pixels | {} |", c.antialiased_pixels);
        let _ = writeln!(md, "| Dimensions | {} |", c.dimensions);
        let _ = writeln!(md, "| Threshold | {} |", c.threshold);
        if let Some(resize) = &c.resized {
            let _ = writeln!(
                md,
                "| Resized | actual {} / expected {} compared at {} |",
                resize.actual, resize.expected, resize.compared_at
            );
        }

        let _ = writeln!(md);
        let _ = writeln!(md, "## Regions");
        let _ = writeln!(md);
        if self.regions.is_empty() {
            let _ = writeln!(md, "No differing regions.");
        } else {
            let _ = writeln!(md, "| # | Cause | Severity | Pixels | Bounds |");
            let _ = writeln!(md, "|---|---|---|---|---|");
            for r in &self.regions {
                let _ = writeln!(
                    md,
                    "| {} | {} | {} | {} | ({}, {}) {}x{} |",
                    r.id, r.cause, r.severity, r.pixel_count, r.bounds.x, r.bounds.y, r.bounds.width, r.bounds.height
                );
            }
        }

        let _ = writeln!(md);
        let _ = writeln!(md, "## Recommendations");
        let _ = writeln!(md);
        if self.recommendations.is_empty() {
            let _ = writeln!(md, "Nothing to fix.");
        } else {
            for (i, rec) in self.recommendations.iter().enumerate() {
                let _ = writeln!(
                    md,
                    "{}. **[{}] {}**: {}",
                    i + 1,
                    rec.priority,
                    rec.category,
                    rec.description
                );
            }
        }
        md
    }

    /// Write `report.json`, and `report.md` when `markdown` is set, into `dir`
    pub fn write(&self, dir: &Path, markdown: bool) -> Result<ReportPaths> {
        let json = dir.join(JSON_REPORT_NAME);
        write_atomic(&json, self.to_json()?.as_bytes())?;

        let markdown = if markdown {
            let path = dir.join(MARKDOWN_REPORT_NAME);
            write_atomic(&path, self.to_markdown().as_bytes())?;
            Some(path)
        } else {
            None
        };
        info!("Wrote report for {} to {}", self.component_name, dir.display());

        Ok(ReportPaths { json, markdown })
    }
}
