use crate::facts::CriticalTarget;
use crate::model::{DocumentRecord, GapFlag, GapRecord, GapStatus, GapType, Severity};

pub const LINEAGE_MIN_PRIORITY: i64 = 120;
pub const LINE_COUNT_REQUIRED_MIN_PRIORITY: i64 = 180;
pub const DEDUPE_GAP_MIN_GROUP_SIZE: usize = 3;

const GAP_ID_PREFIX: &str = "CGAP-";

/// Per-document flags, always in the same order.
#[must_use]
pub fn document_flags(doc: &DocumentRecord) -> Vec<GapFlag> {
    let mut flags = Vec::new();
    if doc.is_text && !doc.line_scan_status.is_ok() {
        flags.push(GapFlag::LineScanMissing);
    }
    if doc.priority_weight >= LINE_COUNT_REQUIRED_MIN_PRIORITY
        && doc.is_text
        && doc.line_count.unwrap_or(0) == 0
    {
        flags.push(GapFlag::PriorityMissingLineCount);
    }
    if doc.duplicate_group_size > 1 {
        flags.push(GapFlag::DuplicateContent);
    }
    flags
}

pub fn flag_documents(docs: &mut [DocumentRecord]) {
    for doc in docs.iter_mut() {
        doc.gap_flags = document_flags(doc);
    }
}

/// Corpus-level inputs to the gap register that do not come from documents.
#[derive(Debug, Clone, Copy)]
pub struct GapContext<'a> {
    pub critical: &'a [CriticalTarget],
    pub scan_complete: bool,
    /// Reported as the source of a `scan_incomplete` gap.
    pub state_source: &'a str,
    pub created_at_utc: &'a str,
}

/// Promotes flags and corpus conditions into a sorted, numbered gap register.
#[must_use]
pub fn build_gap_register(docs: &[DocumentRecord], ctx: GapContext<'_>) -> Vec<GapRecord> {
    let mut gaps = Vec::new();

    for doc in docs {
        if doc.has_flag(GapFlag::LineScanMissing) && doc.priority_weight >= LINEAGE_MIN_PRIORITY {
            gaps.push(open_gap(
                Severity::P1,
                GapType::LineageCoverage,
                &doc.source_path,
                "Priority corpus file missing successful line scan metadata.".to_string(),
                "Re-run the incremental corpus audit with batch-size 0.",
                ctx.created_at_utc,
            ));
        }
        if doc.has_flag(GapFlag::DuplicateContent)
            && doc.duplicate_group_size >= DEDUPE_GAP_MIN_GROUP_SIZE
        {
            gaps.push(open_gap(
                Severity::P2,
                GapType::DedupeRequired,
                &doc.source_path,
                format!(
                    "Duplicate content group detected (size={}).",
                    doc.duplicate_group_size
                ),
                "Keep canonical source and archive aliases.",
                ctx.created_at_utc,
            ));
        }
    }

    for target in ctx.critical.iter().filter(|t| t.is_missing()) {
        gaps.push(open_gap(
            Severity::P0,
            GapType::CriticalMissing,
            &target.path,
            "Critical corpus target missing from workspace snapshot.".to_string(),
            "Restore source and regenerate canonical snapshot.",
            ctx.created_at_utc,
        ));
    }

    if !ctx.scan_complete {
        gaps.push(open_gap(
            Severity::P1,
            GapType::ScanIncomplete,
            ctx.state_source,
            "Incremental text-line scan is not complete.".to_string(),
            "Run the incremental corpus audit with batch-size 0.",
            ctx.created_at_utc,
        ));
    }

    sort_and_number(&mut gaps);
    gaps
}

/// Orders by `(severity, gap_type, source_path)` and assigns `CGAP-NNNN` ids in that order.
pub fn sort_and_number(gaps: &mut [GapRecord]) {
    gaps.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then_with(|| a.gap_type.as_str().cmp(b.gap_type.as_str()))
            .then_with(|| a.source_path.cmp(&b.source_path))
    });
    for (idx, gap) in gaps.iter_mut().enumerate() {
        gap.gap_id = format!("{GAP_ID_PREFIX}{:04}", idx + 1);
    }
}

fn open_gap(
    severity: Severity,
    gap_type: GapType,
    source_path: &str,
    detail: String,
    recommended_action: &str,
    created_at_utc: &str,
) -> GapRecord {
    GapRecord {
        gap_id: String::new(),
        severity,
        gap_type,
        source_path: source_path.to_string(),
        detail,
        recommended_action: recommended_action.to_string(),
        status: GapStatus::Open,
        created_at_utc: created_at_utc.to_string(),
    }
}
