use corpus_audit::{ArtifactSet, GateReport, RunSummary};
use std::path::Path;

pub fn render_run_status(summary: &RunSummary, artifacts: &ArtifactSet) -> String {
    let mut out = String::new();
    out.push_str(&format!("Run {}\n", summary.run_id));
    out.push_str(&format!(
        "  docs: {} ({} text, {} core, {} priority)\n",
        summary.docs_total,
        summary.text_docs_total,
        summary.core_docs_total,
        summary.priority_docs_total
    ));
    out.push_str(&format!(
        "  line coverage: {:.2}% overall, {:.2}% core, {:.2}% priority\n",
        summary.line_coverage_pct,
        summary.core_line_coverage_pct,
        summary.priority_line_coverage_pct
    ));
    out.push_str(&format!(
        "  duplicates: {} groups, {} redundant docs\n",
        summary.duplicate_groups_total, summary.duplicate_docs_total
    ));
    out.push_str(&format!(
        "  open gaps: {} (P0 {}, P1 {}, P2 {}), critical missing: {}\n",
        summary.open_gaps_total,
        summary.p0_gaps_total,
        summary.p1_gaps_total,
        summary.p2_gaps_total,
        summary.critical_missing_total
    ));
    out.push_str(&format!(
        "  snapshot: {}\n",
        artifacts.snapshot_md_latest.display()
    ));
    out.push_str(&format!("  gaps: {}", artifacts.gap_csv_latest.display()));
    out
}

pub fn render_gate_status(report: &GateReport, md_path: &Path) -> String {
    let mut out = format!(
        "{} -> {}\n",
        report.readiness_level, report.recommended_stage
    );
    for blocker in &report.hard_blockers {
        out.push_str(&format!("  blocker: {blocker}\n"));
    }
    for warning in &report.warnings {
        out.push_str(&format!("  warning: {warning}\n"));
    }
    out.push_str(&format!("  report: {}", md_path.display()));
    out
}
