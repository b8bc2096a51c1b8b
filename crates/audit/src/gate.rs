//! Phase readiness verdict computed from the latest quality snapshot.

use crate::report::{date_tag, utc_timestamp, write_artifact, ArtifactSet};
use crate::summary::RunSummary;
use crate::Result;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const SNAPSHOT_MISSING_BLOCKER: &str = "snapshot_missing";
const SCAN_INCOMPLETE_WARNING: &str = "scan_state_incomplete";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GateThresholds {
    pub min_priority_line_coverage: f64,
    pub min_core_line_coverage: f64,
    pub max_open_gaps: usize,
    pub max_critical_missing: usize,
    pub max_p0_gaps: usize,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            min_priority_line_coverage: 95.0,
            min_core_line_coverage: 10.0,
            max_open_gaps: 2,
            max_critical_missing: 0,
            max_p0_gaps: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadinessLevel {
    Ready,
    NotReady,
}

impl ReadinessLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::NotReady => "NOT_READY",
        }
    }

    #[must_use]
    pub fn recommended_stage(self) -> &'static str {
        match self {
            Self::Ready => "synthesis_parallel_cleanup",
            Self::NotReady => "cleaning_hardening",
        }
    }

    fn directive(self) -> &'static str {
        match self {
            Self::Ready => {
                "Move to synthesis and artifact expansion while keeping nightly cleanup running."
            }
            Self::NotReady => "Keep focus on cleaning and hardening until blockers are closed.",
        }
    }
}

impl fmt::Display for ReadinessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GateMetrics {
    pub priority_line_coverage_pct: f64,
    pub core_line_coverage_pct: f64,
    pub open_gaps_total: usize,
    pub critical_missing_total: usize,
    pub p0_gaps_total: usize,
}

impl From<&RunSummary> for GateMetrics {
    fn from(summary: &RunSummary) -> Self {
        Self {
            priority_line_coverage_pct: summary.priority_line_coverage_pct,
            core_line_coverage_pct: summary.core_line_coverage_pct,
            open_gaps_total: summary.open_gaps_total,
            critical_missing_total: summary.critical_missing_total,
            p0_gaps_total: summary.p0_gaps_total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GateReport {
    pub generated_at: String,
    pub readiness_level: ReadinessLevel,
    pub recommended_stage: String,
    pub metrics: GateMetrics,
    pub thresholds: GateThresholds,
    pub hard_blockers: Vec<String>,
    pub warnings: Vec<String>,
    /// Run the verdict was computed from; empty when no snapshot was found.
    pub run_id: String,
    pub operator_directive: String,
}

impl GateReport {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.readiness_level == ReadinessLevel::Ready
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GateArtifacts {
    pub json: PathBuf,
    pub json_latest: PathBuf,
    pub md: PathBuf,
    pub md_latest: PathBuf,
}

impl GateArtifacts {
    #[must_use]
    pub fn new(out_dir: &Path, prefix: &str, tag: &str) -> Self {
        let file = |tag: &str, ext: &str| {
            out_dir.join(format!("{prefix}_phase_readiness_gate_{tag}.{ext}"))
        };
        Self {
            json: file(tag, "json"),
            json_latest: file("latest", "json"),
            md: file(tag, "md"),
            md_latest: file("latest", "md"),
        }
    }
}

/// Reads the latest snapshot. Absent, unreadable or malformed files all yield `None`.
#[must_use]
pub fn read_latest_snapshot(out_dir: &Path, prefix: &str) -> Option<RunSummary> {
    let path = ArtifactSet::latest_snapshot_json(out_dir, prefix);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::warn!("No quality snapshot at {}: {err}", path.display());
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(summary) => Some(summary),
        Err(err) => {
            log::warn!("Malformed quality snapshot {}: {err}", path.display());
            None
        }
    }
}

/// Applies every threshold; each violation becomes one blocker string.
#[must_use]
pub fn evaluate(
    snapshot: Option<&RunSummary>,
    thresholds: &GateThresholds,
    now: DateTime<Utc>,
) -> GateReport {
    let metrics = snapshot.map(GateMetrics::from).unwrap_or_default();
    let mut hard_blockers = Vec::new();
    let mut warnings = Vec::new();

    if snapshot.is_none() {
        hard_blockers.push(SNAPSHOT_MISSING_BLOCKER.to_string());
    }
    if metrics.priority_line_coverage_pct < thresholds.min_priority_line_coverage {
        hard_blockers.push(format!(
            "priority_line_coverage_pct {:.2} < {:.2}",
            metrics.priority_line_coverage_pct, thresholds.min_priority_line_coverage
        ));
    }
    if metrics.core_line_coverage_pct < thresholds.min_core_line_coverage {
        hard_blockers.push(format!(
            "core_line_coverage_pct {:.2} < {:.2}",
            metrics.core_line_coverage_pct, thresholds.min_core_line_coverage
        ));
    }
    if metrics.open_gaps_total > thresholds.max_open_gaps {
        hard_blockers.push(format!(
            "open_gaps_total {} > {}",
            metrics.open_gaps_total, thresholds.max_open_gaps
        ));
    }
    if metrics.critical_missing_total > thresholds.max_critical_missing {
        hard_blockers.push(format!(
            "critical_missing_total {} > {}",
            metrics.critical_missing_total, thresholds.max_critical_missing
        ));
    }
    if metrics.p0_gaps_total > thresholds.max_p0_gaps {
        hard_blockers.push(format!(
            "p0_gaps_total {} > {}",
            metrics.p0_gaps_total, thresholds.max_p0_gaps
        ));
    }
    if snapshot.is_some_and(|s| !s.scan_state_complete) {
        warnings.push(SCAN_INCOMPLETE_WARNING.to_string());
    }

    let level = if hard_blockers.is_empty() {
        ReadinessLevel::Ready
    } else {
        ReadinessLevel::NotReady
    };

    GateReport {
        generated_at: utc_timestamp(now),
        readiness_level: level,
        recommended_stage: level.recommended_stage().to_string(),
        metrics,
        thresholds: *thresholds,
        hard_blockers,
        warnings,
        run_id: snapshot.map(|s| s.run_id.clone()).unwrap_or_default(),
        operator_directive: level.directive().to_string(),
    }
}

pub fn write_gate_artifacts(
    out_dir: &Path,
    prefix: &str,
    now: DateTime<Utc>,
    report: &GateReport,
) -> Result<GateArtifacts> {
    let artifacts = GateArtifacts::new(out_dir, prefix, &date_tag(now));
    let json = serde_json::to_vec_pretty(report)?;
    write_artifact(&artifacts.json, &json)?;
    write_artifact(&artifacts.json_latest, &json)?;

    let md = render_gate_markdown(report);
    write_artifact(&artifacts.md, md.as_bytes())?;
    write_artifact(&artifacts.md_latest, md.as_bytes())?;
    Ok(artifacts)
}

#[must_use]
pub fn render_gate_markdown(report: &GateReport) -> String {
    let m = &report.metrics;
    let mut md = String::new();
    md.push_str("# Corpus Phase Readiness Gate\n\n");
    md.push_str(&format!("Generated: `{}`\n", report.generated_at));
    md.push_str(&format!("Readiness level: `{}`\n", report.readiness_level));
    md.push_str(&format!("Recommended stage: `{}`\n", report.recommended_stage));
    if !report.run_id.is_empty() {
        md.push_str(&format!("Snapshot run: `{}`\n", report.run_id));
    }
    md.push_str("\n## Metrics\n\n");
    md.push_str(&format!(
        "- priority_line_coverage_pct: `{:.2}`\n",
        m.priority_line_coverage_pct
    ));
    md.push_str(&format!(
        "- core_line_coverage_pct: `{:.2}`\n",
        m.core_line_coverage_pct
    ));
    md.push_str(&format!("- open_gaps_total: `{}`\n", m.open_gaps_total));
    md.push_str(&format!(
        "- critical_missing_total: `{}`\n",
        m.critical_missing_total
    ));
    md.push_str(&format!("- p0_gaps_total: `{}`\n", m.p0_gaps_total));

    push_list(&mut md, "Hard Blockers", &report.hard_blockers);
    push_list(&mut md, "Warnings", &report.warnings);

    md.push_str("\n## Operator Directive\n\n");
    md.push_str(&format!("- {}\n", report.operator_directive));
    md
}

fn push_list(md: &mut String, title: &str, items: &[String]) {
    md.push_str(&format!("\n## {title}\n\n"));
    if items.is_empty() {
        md.push_str("- none\n");
    }
    for item in items {
        md.push_str(&format!("- {item}\n"));
    }
}
