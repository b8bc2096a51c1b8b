use crate::dedupe::DedupeOutcome;
use crate::facts::{FactCounts, FactSources, ScanState};
use crate::model::{DocumentRecord, GapRecord, GapType, Severity};
use crate::score::round2;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Where each fact source was read from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
pub struct SummarySources {
    pub inventory_tsv: String,
    pub line_counts_tsv: String,
    pub priority_manifest_tsv: String,
    pub critical_hashes_tsv: String,
    pub state_json: String,
}

impl From<&FactSources> for SummarySources {
    fn from(sources: &FactSources) -> Self {
        Self {
            inventory_tsv: sources.inventory.display().to_string(),
            line_counts_tsv: sources.line_counts.display().to_string(),
            priority_manifest_tsv: sources.priority.display().to_string(),
            critical_hashes_tsv: sources.critical.display().to_string(),
            state_json: sources.state.display().to_string(),
        }
    }
}

/// Corpus-wide aggregates for one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema, Default)]
pub struct RunSummary {
    /// Traceability only; never feeds any other record.
    pub run_id: String,
    pub generated_at: String,
    pub docs_total: usize,
    pub text_docs_total: usize,
    pub core_docs_total: usize,
    pub core_text_docs_total: usize,
    pub priority_docs_total: usize,
    pub priority_text_docs_total: usize,
    pub line_coverage_pct: f64,
    pub core_line_coverage_pct: f64,
    pub priority_line_coverage_pct: f64,
    pub duplicate_groups_total: usize,
    pub duplicate_docs_total: usize,
    pub critical_missing_total: usize,
    pub open_gaps_total: usize,
    #[serde(default)]
    pub p0_gaps_total: usize,
    #[serde(default)]
    pub p1_gaps_total: usize,
    #[serde(default)]
    pub p2_gaps_total: usize,
    pub avg_quality_score: f64,
    pub core_avg_quality_score: f64,
    pub priority_line_fallback_scans_used: usize,
    pub scan_state_complete: bool,
    pub scan_state_processed: i64,
    pub scan_state_candidates_total: i64,
    #[serde(default)]
    pub sources: SummarySources,
}

pub struct SummaryInputs<'a> {
    pub run_id: String,
    pub generated_at: String,
    pub docs: &'a [DocumentRecord],
    pub gaps: &'a [GapRecord],
    pub dedupe: &'a DedupeOutcome,
    pub fallback_scans_used: usize,
    pub state: &'a ScanState,
    pub sources: SummarySources,
}

#[must_use]
pub fn summarize(inputs: SummaryInputs<'_>) -> RunSummary {
    let docs = inputs.docs;

    let text_docs_total = count_where(docs, |d| d.is_text);
    let core_text_docs_total = count_where(docs, |d| d.is_core() && d.is_text);
    let priority_text_docs_total = count_where(docs, |d| d.is_priority() && d.is_text);
    let scanned = count_where(docs, |d| d.is_text && d.line_scan_status.is_ok());
    let core_scanned =
        count_where(docs, |d| d.is_core() && d.is_text && d.line_scan_status.is_ok());
    let priority_scanned =
        count_where(docs, |d| d.is_priority() && d.is_text && d.line_scan_status.is_ok());

    let core_docs: Vec<&DocumentRecord> = docs.iter().filter(|d| d.is_core()).collect();
    let severity_total =
        |severity: Severity| inputs.gaps.iter().filter(|g| g.severity == severity).count();

    RunSummary {
        run_id: inputs.run_id,
        generated_at: inputs.generated_at,
        docs_total: docs.len(),
        text_docs_total,
        core_docs_total: core_docs.len(),
        core_text_docs_total,
        priority_docs_total: count_where(docs, DocumentRecord::is_priority),
        priority_text_docs_total,
        line_coverage_pct: coverage_pct(scanned, text_docs_total),
        core_line_coverage_pct: coverage_pct(core_scanned, core_text_docs_total),
        priority_line_coverage_pct: coverage_pct(priority_scanned, priority_text_docs_total),
        duplicate_groups_total: inputs.dedupe.duplicate_groups_total(),
        duplicate_docs_total: inputs.dedupe.duplicate_docs_total(),
        critical_missing_total: inputs
            .gaps
            .iter()
            .filter(|g| g.gap_type == GapType::CriticalMissing)
            .count(),
        open_gaps_total: inputs.gaps.len(),
        p0_gaps_total: severity_total(Severity::P0),
        p1_gaps_total: severity_total(Severity::P1),
        p2_gaps_total: severity_total(Severity::P2),
        avg_quality_score: mean_score(docs.iter()),
        core_avg_quality_score: mean_score(core_docs.iter().copied()),
        priority_line_fallback_scans_used: inputs.fallback_scans_used,
        scan_state_complete: inputs.state.complete,
        scan_state_processed: inputs.state.processed,
        scan_state_candidates_total: inputs.state.candidates_total,
        sources: inputs.sources,
    }
}

/// `100 * part / whole` rounded to two decimals; 0.0 when `whole` is zero.
#[must_use]
pub fn coverage_pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let pct = 100.0 * part as f64 / whole as f64;
    round2(pct)
}

fn count_where(docs: &[DocumentRecord], pred: impl Fn(&DocumentRecord) -> bool) -> usize {
    docs.iter().filter(|d| pred(d)).count()
}

fn mean_score<'a>(docs: impl Iterator<Item = &'a DocumentRecord>) -> f64 {
    let (sum, n) = docs.fold((0.0f64, 0usize), |(sum, n), d| (sum + d.quality_score, n + 1));
    if n == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = sum / n as f64;
    round2(mean)
}

/// `YYYYMMDDTHHMMSSZ-` plus 12 hex chars derived from the clock and input sizes.
#[must_use]
pub fn make_run_id(now: DateTime<Utc>, counts: &FactCounts) -> String {
    let mut hasher = Sha256::new();
    hasher.update(
        format!(
            "{}|{}|{}|{}",
            now.to_rfc3339(),
            counts.inventory_rows,
            counts.line_rows,
            counts.priority_rows
        )
        .as_bytes(),
    );
    let digest = hasher.finalize();
    let entropy: String = digest
        .iter()
        .take(6)
        .map(|byte| format!("{byte:02x}"))
        .collect();
    format!("{}-{entropy}", now.format("%Y%m%dT%H%M%SZ"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{doc_id_for_path, GapStatus, LineScanStatus};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn doc(path: &str, is_text: bool, weight: i64, status: LineScanStatus) -> DocumentRecord {
        DocumentRecord {
            doc_id: doc_id_for_path(path),
            source_path: path.to_string(),
            bytes: 10,
            mtime_utc: String::new(),
            extension: String::new(),
            is_text,
            priority_weight: weight,
            source_tags: String::new(),
            scope_class: crate::scope::classify(path),
            line_count: None,
            line_scan_status: status,
            dedupe_hash: None,
            duplicate_group_size: 1,
            quality_score: 0.0,
            gap_flags: Vec::new(),
            last_scanned_utc: String::new(),
        }
    }

    fn summarize_docs(docs: &[DocumentRecord], gaps: &[GapRecord]) -> RunSummary {
        summarize(SummaryInputs {
            run_id: "run".to_string(),
            generated_at: "now".to_string(),
            docs,
            gaps,
            dedupe: &DedupeOutcome::default(),
            fallback_scans_used: 0,
            state: &ScanState::default(),
            sources: SummarySources::default(),
        })
    }

    #[test]
    fn empty_denominators_give_zero_not_nan() {
        let summary = summarize_docs(&[], &[]);
        assert_eq!(summary.line_coverage_pct, 0.0);
        assert_eq!(summary.core_line_coverage_pct, 0.0);
        assert_eq!(summary.priority_line_coverage_pct, 0.0);
        assert_eq!(summary.avg_quality_score, 0.0);
        assert_eq!(summary.core_avg_quality_score, 0.0);
        assert_eq!(coverage_pct(5, 0), 0.0);
    }

    #[test]
    fn coverage_rounds_to_two_decimals() {
        assert_eq!(coverage_pct(1, 3), 33.33);
        assert_eq!(coverage_pct(2, 3), 66.67);
        assert_eq!(coverage_pct(3, 3), 100.0);
    }

    #[test]
    fn counts_by_scope_and_priority() {
        let mut docs = vec![
            doc("MAROON.md", true, 250, LineScanStatus::Ok),
            doc("MaroonCLI/run.py", true, 0, LineScanStatus::Missing),
            doc("misc/a.pdf", false, 10, LineScanStatus::Missing),
            doc("misc/b.md", true, 130, LineScanStatus::Timeout),
        ];
        docs[0].quality_score = 90.0;
        docs[1].quality_score = 25.0;
        docs[2].quality_score = 18.0;
        docs[3].quality_score = 40.0;
        let gaps = vec![GapRecord {
            gap_id: "CGAP-0001".to_string(),
            severity: Severity::P0,
            gap_type: GapType::CriticalMissing,
            source_path: "chat.html".to_string(),
            detail: String::new(),
            recommended_action: String::new(),
            status: GapStatus::Open,
            created_at_utc: String::new(),
        }];

        let summary = summarize_docs(&docs, &gaps);
        assert_eq!(summary.docs_total, 4);
        assert_eq!(summary.text_docs_total, 3);
        assert_eq!(summary.core_docs_total, 2);
        assert_eq!(summary.core_text_docs_total, 2);
        assert_eq!(summary.priority_docs_total, 3);
        assert_eq!(summary.priority_text_docs_total, 2);
        assert_eq!(summary.line_coverage_pct, 33.33);
        assert_eq!(summary.core_line_coverage_pct, 50.0);
        assert_eq!(summary.priority_line_coverage_pct, 50.0);
        assert_eq!(summary.avg_quality_score, 43.25);
        assert_eq!(summary.core_avg_quality_score, 57.5);
        assert_eq!(summary.critical_missing_total, 1);
        assert_eq!(summary.open_gaps_total, 1);
        assert_eq!(summary.p0_gaps_total, 1);
    }

    #[test]
    fn run_id_has_timestamp_prefix_and_hex_suffix() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 8, 30, 5).unwrap();
        let id = make_run_id(now, &FactCounts::default());
        assert!(id.starts_with("20261017T083005Z-"), "{id}");
        let suffix = &id["20261017T083005Z-".len()..];
        assert_eq!(suffix.len(), 12);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
