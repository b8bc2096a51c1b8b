//! Serialization boundary: turns a finished run into dated and `latest` artifacts.
//!
//! Nothing here makes decisions. Other tools (the readiness gate among them) read the
//! `latest` files only, so their names and column orders are part of the contract.

use crate::model::{DocumentRecord, GapRecord};
use crate::summary::RunSummary;
use crate::{AuditError, Result};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const INVENTORY_COLUMNS: [&str; 16] = [
    "doc_id",
    "source_path",
    "bytes",
    "mtime_utc",
    "extension",
    "is_text",
    "priority_weight",
    "source_tags",
    "scope_class",
    "line_count",
    "line_scan_status",
    "dedupe_hash",
    "duplicate_group_size",
    "quality_score",
    "gap_flags",
    "last_scanned_utc",
];

pub const GAP_COLUMNS: [&str; 8] = [
    "gap_id",
    "severity",
    "gap_type",
    "source_path",
    "detail",
    "recommended_action",
    "status",
    "created_at_utc",
];

const LATEST_TAG: &str = "latest";

#[must_use]
pub fn utc_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[must_use]
pub fn date_tag(now: DateTime<Utc>) -> String {
    now.format("%Y_%m_%d").to_string()
}

/// Paths of everything one run writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ArtifactSet {
    pub inventory_csv: PathBuf,
    pub inventory_csv_latest: PathBuf,
    pub gap_csv: PathBuf,
    pub gap_csv_latest: PathBuf,
    pub snapshot_json: PathBuf,
    pub snapshot_json_latest: PathBuf,
    pub snapshot_md: PathBuf,
    pub snapshot_md_latest: PathBuf,
}

impl ArtifactSet {
    #[must_use]
    pub fn new(out_dir: &Path, prefix: &str, tag: &str) -> Self {
        let file = |stem: &str, tag: &str, ext: &str| out_dir.join(format!("{prefix}_{stem}_{tag}.{ext}"));
        Self {
            inventory_csv: file("file_inventory", tag, "csv"),
            inventory_csv_latest: file("file_inventory", LATEST_TAG, "csv"),
            gap_csv: file("gap_register", tag, "csv"),
            gap_csv_latest: file("gap_register", LATEST_TAG, "csv"),
            snapshot_json: file("quality_snapshot", tag, "json"),
            snapshot_json_latest: file("quality_snapshot", LATEST_TAG, "json"),
            snapshot_md: file("quality_snapshot", tag, "md"),
            snapshot_md_latest: file("quality_snapshot", LATEST_TAG, "md"),
        }
    }

    /// Location of the latest snapshot JSON for a given output directory.
    #[must_use]
    pub fn latest_snapshot_json(out_dir: &Path, prefix: &str) -> PathBuf {
        out_dir.join(format!("{prefix}_quality_snapshot_{LATEST_TAG}.json"))
    }

    #[must_use]
    pub fn latest_gap_csv(out_dir: &Path, prefix: &str) -> PathBuf {
        out_dir.join(format!("{prefix}_gap_register_{LATEST_TAG}.csv"))
    }
}

/// Writes every artifact of a run. Any failure here is fatal for the run.
pub fn emit_reports(
    out_dir: &Path,
    prefix: &str,
    now: DateTime<Utc>,
    docs: &[DocumentRecord],
    gaps: &[GapRecord],
    summary: &RunSummary,
) -> Result<ArtifactSet> {
    let artifacts = ArtifactSet::new(out_dir, prefix, &date_tag(now));

    let inventory = render_inventory_csv(docs)?;
    write_artifact(&artifacts.inventory_csv, &inventory)?;
    write_artifact(&artifacts.inventory_csv_latest, &inventory)?;

    let register = render_gap_csv(gaps)?;
    write_artifact(&artifacts.gap_csv, &register)?;
    write_artifact(&artifacts.gap_csv_latest, &register)?;

    let snapshot = serde_json::to_vec_pretty(summary)?;
    write_artifact(&artifacts.snapshot_json, &snapshot)?;
    write_artifact(&artifacts.snapshot_json_latest, &snapshot)?;

    let markdown = render_snapshot_markdown(summary, &artifacts);
    write_artifact(&artifacts.snapshot_md, markdown.as_bytes())?;
    write_artifact(&artifacts.snapshot_md_latest, markdown.as_bytes())?;

    log::info!(
        "Wrote {} inventory rows and {} gaps to {}",
        docs.len(),
        gaps.len(),
        out_dir.display()
    );
    Ok(artifacts)
}

/// Inventory table, rows ordered by `source_path` whatever the input order.
pub fn render_inventory_csv(docs: &[DocumentRecord]) -> Result<Vec<u8>> {
    let mut ordered: Vec<&DocumentRecord> = docs.iter().collect();
    ordered.sort_by(|a, b| a.source_path.cmp(&b.source_path));

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(INVENTORY_COLUMNS)?;
    for doc in ordered {
        writer.write_record([
            doc.doc_id.clone(),
            doc.source_path.clone(),
            doc.bytes.to_string(),
            doc.mtime_utc.clone(),
            doc.extension.clone(),
            bool_cell(doc.is_text).to_string(),
            doc.priority_weight.to_string(),
            doc.source_tags.clone(),
            doc.scope_class.as_str().to_string(),
            doc.line_count.map(|n| n.to_string()).unwrap_or_default(),
            doc.line_scan_status.as_str().to_string(),
            doc.dedupe_hash.clone().unwrap_or_default(),
            doc.duplicate_group_size.to_string(),
            format!("{:.2}", doc.quality_score),
            doc.gap_flags_joined(),
            doc.last_scanned_utc.clone(),
        ])?;
    }
    finish_csv(writer)
}

/// Gap register in the order given; callers pass the already numbered register.
pub fn render_gap_csv(gaps: &[GapRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(GAP_COLUMNS)?;
    for gap in gaps {
        writer.write_record([
            gap.gap_id.as_str(),
            gap.severity.as_str(),
            gap.gap_type.as_str(),
            gap.source_path.as_str(),
            gap.detail.as_str(),
            gap.recommended_action.as_str(),
            gap.status.as_str(),
            gap.created_at_utc.as_str(),
        ])?;
    }
    finish_csv(writer)
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|err| AuditError::IoError(err.into_error()))
}

fn bool_cell(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[must_use]
pub fn render_snapshot_markdown(summary: &RunSummary, artifacts: &ArtifactSet) -> String {
    let mut md = String::new();
    md.push_str("# Corpus Quality Snapshot\n\n");
    md.push_str(&format!("- Run ID: `{}`\n", summary.run_id));
    md.push_str(&format!("- Generated: `{}`\n", summary.generated_at));
    md.push_str(&format!("- Docs total: `{}`\n", summary.docs_total));
    md.push_str(&format!("- Text docs: `{}`\n", summary.text_docs_total));
    md.push_str(&format!("- Core docs: `{}`\n", summary.core_docs_total));
    md.push_str(&format!("- Core text docs: `{}`\n", summary.core_text_docs_total));
    md.push_str(&format!("- Priority docs: `{}`\n", summary.priority_docs_total));
    md.push_str(&format!(
        "- Priority text docs: `{}`\n",
        summary.priority_text_docs_total
    ));
    md.push_str(&format!(
        "- Line coverage: `{:.2}%`\n",
        summary.line_coverage_pct
    ));
    md.push_str(&format!(
        "- Core line coverage: `{:.2}%`\n",
        summary.core_line_coverage_pct
    ));
    md.push_str(&format!(
        "- Priority line coverage: `{:.2}%`\n",
        summary.priority_line_coverage_pct
    ));
    md.push_str(&format!(
        "- Avg quality score: `{:.2}`\n",
        summary.avg_quality_score
    ));
    md.push_str(&format!(
        "- Core avg quality score: `{:.2}`\n",
        summary.core_avg_quality_score
    ));
    md.push_str(&format!(
        "- Priority fallback line scans used: `{}`\n",
        summary.priority_line_fallback_scans_used
    ));
    md.push_str(&format!(
        "- Duplicate groups: `{}`\n",
        summary.duplicate_groups_total
    ));
    md.push_str(&format!(
        "- Duplicate docs (excluding primary): `{}`\n",
        summary.duplicate_docs_total
    ));
    md.push_str(&format!(
        "- Open gaps: `{}` (P0 `{}`, P1 `{}`, P2 `{}`)\n",
        summary.open_gaps_total, summary.p0_gaps_total, summary.p1_gaps_total, summary.p2_gaps_total
    ));
    md.push_str(&format!(
        "- Critical missing files: `{}`\n",
        summary.critical_missing_total
    ));
    md.push_str(&format!(
        "- Scan state: complete `{}`, processed `{}` of `{}`\n\n",
        summary.scan_state_complete,
        summary.scan_state_processed,
        summary.scan_state_candidates_total
    ));

    md.push_str("## Source Artifacts\n\n");
    for source in [
        &summary.sources.inventory_tsv,
        &summary.sources.line_counts_tsv,
        &summary.sources.priority_manifest_tsv,
        &summary.sources.critical_hashes_tsv,
        &summary.sources.state_json,
    ] {
        md.push_str(&format!("- `{source}`\n"));
    }
    md.push('\n');

    md.push_str("## Output Artifacts\n\n");
    for output in [
        &artifacts.inventory_csv_latest,
        &artifacts.gap_csv_latest,
        &artifacts.snapshot_json_latest,
    ] {
        md.push_str(&format!("- `{}`\n", output.display()));
    }
    md
}

/// Replaces `path` atomically via a sibling temp file.
pub fn write_artifact(path: &Path, bytes: &[u8]) -> Result<()> {
    let wrap = |source: std::io::Error| AuditError::ArtifactWrite {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(wrap)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    if let Err(err) = std::fs::write(&tmp, bytes).and_then(|()| std::fs::rename(&tmp, path)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(wrap(err));
    }
    Ok(())
}
