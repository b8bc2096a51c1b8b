use crate::config::AuditConfig;
use crate::dedupe::{apply_dedupe, hash_candidates, select_candidates, DedupeOutcome};
use crate::facts::{load_facts, FactSet, FactSources};
use crate::fallback::{run_fallback_scans, FallbackBudget, FallbackReport, LineCounter, WcLineCounter};
use crate::gaps::{build_gap_register, flag_documents, GapContext};
use crate::model::{doc_id_for_path, DocumentRecord, GapRecord};
use crate::report::{emit_reports, utc_timestamp, ArtifactSet};
use crate::scope::{classify, extension_of, is_text_extension};
use crate::score::score_documents;
use crate::summary::{make_run_id, summarize, RunSummary, SummaryInputs, SummarySources};
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Everything one audit run produced, before serialization.
#[derive(Debug, Clone)]
pub struct AuditOutcome {
    /// Ordered by `source_path`.
    pub docs: Vec<DocumentRecord>,
    /// Sorted and numbered.
    pub gaps: Vec<GapRecord>,
    pub summary: RunSummary,
    pub dedupe: DedupeOutcome,
    pub fallback: FallbackReport,
}

/// Runs the audit pipeline over one corpus snapshot.
///
/// Each call to [`CorpusAuditor::run`] owns its own fallback budget, so repeated
/// runs on the same auditor never share state.
pub struct CorpusAuditor {
    config: AuditConfig,
    line_counter: Arc<dyn LineCounter>,
}

impl CorpusAuditor {
    /// Create an auditor that counts lines with `wc -l`.
    pub fn new(config: AuditConfig) -> Result<Self> {
        Self::with_line_counter(config, Arc::new(WcLineCounter::new()))
    }

    pub fn with_line_counter(
        config: AuditConfig,
        line_counter: Arc<dyn LineCounter>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            line_counter,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Build the in-memory snapshot. Only configuration errors are fatal here.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<AuditOutcome> {
        let started = Instant::now();
        let config = &self.config;
        let sources = FactSources::from_config(config);
        let mut facts = load_facts(&sources);
        let scanned_at = utc_timestamp(now);

        let mut docs = build_records(&facts, &scanned_at);

        let candidates = select_candidates(
            &docs,
            &config.root,
            config.max_dedupe_bytes,
            config.max_dedupe_files,
        );
        let dedupe = hash_candidates(candidates, config.effective_hash_concurrency()).await;
        apply_dedupe(&mut docs, &dedupe);

        let mut budget = FallbackBudget::new(config.fallback_limit);
        let fallback = run_fallback_scans(
            &mut docs,
            &mut facts.line_by_path,
            &config.root,
            self.line_counter.as_ref(),
            &mut budget,
            config.line_timeout(),
        )
        .await;

        score_documents(&mut docs);
        flag_documents(&mut docs);

        let state_source = display_relative(&sources.state, &config.root);
        let gaps = build_gap_register(
            &docs,
            GapContext {
                critical: &facts.critical,
                scan_complete: facts.state.complete,
                state_source: &state_source,
                created_at_utc: &scanned_at,
            },
        );

        let summary = summarize(SummaryInputs {
            run_id: make_run_id(now, &facts.counts),
            generated_at: scanned_at.clone(),
            docs: &docs,
            gaps: &gaps,
            dedupe: &dedupe,
            fallback_scans_used: budget.used(),
            state: &facts.state,
            sources: SummarySources::from(&sources),
        });

        log::info!(
            "Audited {} documents in {:.2}s: {} open gaps, priority line coverage {:.2}%",
            summary.docs_total,
            started.elapsed().as_secs_f64(),
            summary.open_gaps_total,
            summary.priority_line_coverage_pct
        );

        Ok(AuditOutcome {
            docs,
            gaps,
            summary,
            dedupe,
            fallback,
        })
    }

    /// Run, then write every artifact under the configured output directory.
    pub async fn run_and_emit(&self, now: DateTime<Utc>) -> Result<(AuditOutcome, ArtifactSet)> {
        let outcome = self.run(now).await?;
        let artifacts = emit_reports(
            &self.config.resolved_out_dir(),
            &self.config.artifact_prefix,
            now,
            &outcome.docs,
            &outcome.gaps,
            &outcome.summary,
        )?;
        Ok((outcome, artifacts))
    }
}

/// One record per distinct inventory path, ordered by path. The first row for a
/// path wins.
fn build_records(facts: &FactSet, scanned_at: &str) -> Vec<DocumentRecord> {
    let mut seen = HashSet::new();
    let mut docs = Vec::with_capacity(facts.inventory.len());

    for row in &facts.inventory {
        if !seen.insert(row.path.as_str()) {
            log::debug!("Ignoring repeated inventory row for {}", row.path);
            continue;
        }
        let extension = extension_of(&row.path);
        let line = facts.line_fact(&row.path);
        let priority = facts.priority_fact(&row.path);

        docs.push(DocumentRecord {
            doc_id: doc_id_for_path(&row.path),
            source_path: row.path.clone(),
            bytes: row.bytes,
            mtime_utc: row.mtime_utc.clone(),
            is_text: is_text_extension(&extension),
            extension,
            priority_weight: priority.priority_weight,
            source_tags: priority.source_tags,
            scope_class: classify(&row.path),
            line_count: u64::try_from(line.line_count).ok(),
            line_scan_status: line.status,
            dedupe_hash: None,
            duplicate_group_size: 1,
            quality_score: 0.0,
            gap_flags: Vec::new(),
            last_scanned_utc: scanned_at.to_string(),
        });
    }

    docs.sort_by(|a, b| a.source_path.cmp(&b.source_path));
    docs
}

fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::InventoryRow;
    use crate::model::{LineScanStatus, ScopeClass};
    use pretty_assertions::assert_eq;

    fn row(path: &str, bytes: u64) -> InventoryRow {
        InventoryRow {
            path: path.to_string(),
            bytes,
            mtime_utc: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn records_are_unique_sorted_and_enriched() {
        let mut facts = FactSet::default();
        facts.inventory = vec![row("b.md", 5), row("MAROON.md", 7), row("b.md", 99)];
        facts.line_by_path.insert(
            "b.md".to_string(),
            crate::facts::LineFact {
                line_count: 12,
                status: LineScanStatus::Ok,
            },
        );

        let docs = build_records(&facts, "2026-10-17T00:00:00Z");
        let paths: Vec<_> = docs.iter().map(|d| d.source_path.as_str()).collect();
        assert_eq!(paths, vec!["MAROON.md", "b.md"]);

        assert_eq!(docs[0].scope_class, ScopeClass::Core);
        assert_eq!(docs[0].line_count, None);
        assert_eq!(docs[0].line_scan_status, LineScanStatus::Missing);
        assert_eq!(docs[1].bytes, 5);
        assert_eq!(docs[1].line_count, Some(12));
        assert_eq!(docs[1].extension, ".md");
        assert!(docs[1].is_text);
    }

    #[test]
    fn state_source_is_shown_relative_to_root() {
        let root = Path::new("/srv/corpus");
        assert_eq!(
            display_relative(&root.join("logs/state.json"), root),
            "logs/state.json"
        );
        assert_eq!(
            display_relative(Path::new("/elsewhere/state.json"), root),
            "/elsewhere/state.json"
        );
    }
}
