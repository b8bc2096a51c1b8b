use crate::facts::LineFact;
use crate::model::{DocumentRecord, LineScanStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;

/// Documents at or above this weight get a second chance at a line count.
pub const FALLBACK_MIN_PRIORITY: i64 = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineCountOutcome {
    Counted(u64),
    TimedOut,
    Failed(String),
}

/// Bounded-time line counting for a single file.
#[async_trait]
pub trait LineCounter: Send + Sync {
    async fn count_lines(&self, path: &Path, limit: Duration) -> LineCountOutcome;
}

/// Counts lines by shelling out to `wc -l`.
#[derive(Debug, Clone)]
pub struct WcLineCounter {
    program: OsString,
    leading_args: Vec<OsString>,
}

impl Default for WcLineCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl WcLineCounter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: OsString::from("wc"),
            leading_args: vec![OsString::from("-l")],
        }
    }

    /// Same contract with another program; the file path is appended as the last argument.
    #[must_use]
    pub fn with_command<I, S>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            leading_args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl LineCounter for WcLineCounter {
    async fn count_lines(&self, path: &Path, limit: Duration) -> LineCountOutcome {
        let output = timeout(
            limit,
            tokio::process::Command::new(&self.program)
                .args(&self.leading_args)
                .arg(path)
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let output = match output {
            Err(_) => return LineCountOutcome::TimedOut,
            Ok(Err(err)) => return LineCountOutcome::Failed(err.to_string()),
            Ok(Ok(output)) => output,
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return LineCountOutcome::Failed(if stderr.is_empty() {
                format!("exit status {}", output.status)
            } else {
                stderr
            });
        }
        match parse_wc_output(&String::from_utf8_lossy(&output.stdout)) {
            Some(lines) => LineCountOutcome::Counted(lines),
            None => LineCountOutcome::Failed("unparsable line counter output".to_string()),
        }
    }
}

/// First whitespace-separated token of `wc -l` output.
#[must_use]
pub fn parse_wc_output(stdout: &str) -> Option<u64> {
    stdout.split_whitespace().next()?.parse().ok()
}

/// Per-run cap on fallback scans. Created fresh for every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackBudget {
    limit: usize,
    used: usize,
}

impl FallbackBudget {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    pub fn try_consume(&mut self) -> bool {
        if self.used >= self.limit {
            return false;
        }
        self.used += 1;
        true
    }

    #[must_use]
    pub fn used(&self) -> usize {
        self.used
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackReport {
    pub attempted: usize,
    pub recovered: usize,
    pub timed_out: usize,
    pub failed: usize,
    /// Eligible documents left untouched because the budget ran out.
    pub budget_skipped: usize,
}

#[must_use]
pub fn is_fallback_eligible(doc: &DocumentRecord) -> bool {
    doc.is_text && doc.priority_weight >= FALLBACK_MIN_PRIORITY && !doc.line_scan_status.is_ok()
}

/// Re-counts lines for high-priority text documents the scanner missed.
///
/// Documents are visited in slice order; callers sort by path first. A success
/// updates both the record and `line_by_path`. Timeouts and failures become the
/// document's terminal status for this run and are never retried.
pub async fn run_fallback_scans(
    docs: &mut [DocumentRecord],
    line_by_path: &mut HashMap<String, LineFact>,
    root: &Path,
    counter: &dyn LineCounter,
    budget: &mut FallbackBudget,
    limit: Duration,
) -> FallbackReport {
    let mut report = FallbackReport::default();

    for doc in docs.iter_mut() {
        if !is_fallback_eligible(doc) {
            continue;
        }
        let abs_path = root.join(&doc.source_path);
        // Symlinked documents are counted through their target.
        if !abs_path.is_file() {
            continue;
        }
        if !budget.try_consume() {
            report.budget_skipped += 1;
            continue;
        }
        report.attempted += 1;

        match counter.count_lines(&abs_path, limit).await {
            LineCountOutcome::Counted(lines) => {
                report.recovered += 1;
                doc.line_count = Some(lines);
                doc.line_scan_status = LineScanStatus::Ok;
                line_by_path.insert(
                    doc.source_path.clone(),
                    LineFact {
                        line_count: i64::try_from(lines).unwrap_or(i64::MAX),
                        status: LineScanStatus::Ok,
                    },
                );
            }
            LineCountOutcome::TimedOut => {
                report.timed_out += 1;
                doc.line_scan_status = LineScanStatus::Timeout;
                log::debug!("Line count timed out for {}", doc.source_path);
            }
            LineCountOutcome::Failed(reason) => {
                report.failed += 1;
                doc.line_scan_status = LineScanStatus::Error;
                log::debug!("Line count failed for {}: {reason}", doc.source_path);
            }
        }
    }

    log::info!(
        "Fallback line scans: {} attempted, {} recovered, {} timed out, {} failed, {} skipped by budget",
        report.attempted,
        report.recovered,
        report.timed_out,
        report.failed,
        report.budget_skipped
    );
    report
}
