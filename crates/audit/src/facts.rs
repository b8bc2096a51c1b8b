use crate::config::AuditConfig;
use crate::model::LineScanStatus;
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Sentinel used by the upstream scanner for "no line count known".
pub const UNKNOWN_LINE_COUNT: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRow {
    pub path: String,
    pub bytes: u64,
    pub mtime_utc: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineFact {
    pub line_count: i64,
    pub status: LineScanStatus,
}

impl LineFact {
    #[must_use]
    pub fn missing() -> Self {
        Self {
            line_count: UNKNOWN_LINE_COUNT,
            status: LineScanStatus::Missing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PriorityFact {
    pub priority_weight: i64,
    pub source_tags: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalTarget {
    pub path: String,
    pub status: String,
}

impl CriticalTarget {
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("MISSING")
    }
}

/// Progress record left behind by the incremental line scanner.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanState {
    pub complete: bool,
    pub processed: i64,
    pub candidates_total: i64,
}

impl ScanState {
    /// `complete` follows JSON truthiness: non-zero numbers and non-empty strings,
    /// arrays or objects count as complete.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };
        Self {
            complete: object.get("complete").is_some_and(json_truthy),
            processed: object.get("processed").map(json_int).unwrap_or(0),
            candidates_total: object.get("candidates_total").map(json_int).unwrap_or(0),
        }
    }
}

/// Locations of the five fact sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactSources {
    pub inventory: PathBuf,
    pub line_counts: PathBuf,
    pub priority: PathBuf,
    pub critical: PathBuf,
    pub state: PathBuf,
}

impl FactSources {
    #[must_use]
    pub fn from_config(config: &AuditConfig) -> Self {
        Self {
            inventory: config.inventory_source(),
            line_counts: config.line_counts_source(),
            priority: config.priority_source(),
            critical: config.critical_source(),
            state: config.state_source(),
        }
    }
}

/// Raw row counts per source, before any filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FactCounts {
    pub inventory_rows: usize,
    pub line_rows: usize,
    pub priority_rows: usize,
    pub critical_rows: usize,
    pub skipped_rows: usize,
}

/// In-memory indices over the current fact snapshot.
#[derive(Debug, Clone, Default)]
pub struct FactSet {
    pub inventory: Vec<InventoryRow>,
    pub line_by_path: HashMap<String, LineFact>,
    pub priority_by_path: HashMap<String, PriorityFact>,
    pub critical: Vec<CriticalTarget>,
    pub state: ScanState,
    pub counts: FactCounts,
}

impl FactSet {
    #[must_use]
    pub fn line_fact(&self, path: &str) -> LineFact {
        self.line_by_path
            .get(path)
            .copied()
            .unwrap_or_else(LineFact::missing)
    }

    #[must_use]
    pub fn priority_fact(&self, path: &str) -> PriorityFact {
        self.priority_by_path.get(path).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn critical_missing(&self) -> impl Iterator<Item = &CriticalTarget> {
        self.critical.iter().filter(|target| target.is_missing())
    }
}

/// Loads every fact source. Never fails: an absent or unreadable source yields an
/// empty index so the run degrades to "nothing known yet".
#[must_use]
pub fn load_facts(sources: &FactSources) -> FactSet {
    let mut facts = FactSet::default();

    if let Some(table) = load_table(&sources.inventory, "inventory") {
        facts.counts.inventory_rows = table.rows.len();
        facts.counts.skipped_rows += table.skipped;
        let path_col = table.column("path");
        let bytes_col = table.column("bytes");
        let mtime_col = table.column("mtime_utc");
        for row in &table.rows {
            let path = table.cell(row, path_col).trim();
            if path.is_empty() {
                continue;
            }
            let bytes = parse_int(table.cell(row, bytes_col), 0).max(0);
            facts.inventory.push(InventoryRow {
                path: path.to_string(),
                bytes: u64::try_from(bytes).unwrap_or(0),
                mtime_utc: table.cell(row, mtime_col).trim().to_string(),
            });
        }
    }

    if let Some(table) = load_table(&sources.line_counts, "line counts") {
        facts.counts.line_rows = table.rows.len();
        facts.counts.skipped_rows += table.skipped;
        let path_col = table.column("path");
        let count_col = table.column("line_count");
        let status_col = table.column("status");
        for row in &table.rows {
            let path = table.cell(row, path_col).trim();
            if path.is_empty() {
                continue;
            }
            facts.line_by_path.insert(
                path.to_string(),
                LineFact {
                    line_count: parse_int(table.cell(row, count_col), UNKNOWN_LINE_COUNT),
                    status: LineScanStatus::parse(table.cell(row, status_col)),
                },
            );
        }
    }

    if let Some(table) = load_table(&sources.priority, "priority manifest") {
        facts.counts.priority_rows = table.rows.len();
        facts.counts.skipped_rows += table.skipped;
        let path_col = table.column("path");
        let weight_col = table.column("priority_weight");
        let tags_col = table.column("source_tags");
        for row in &table.rows {
            let path = table.cell(row, path_col).trim();
            if path.is_empty() {
                continue;
            }
            facts.priority_by_path.insert(
                path.to_string(),
                PriorityFact {
                    priority_weight: parse_int(table.cell(row, weight_col), 0),
                    source_tags: table.cell(row, tags_col).to_string(),
                },
            );
        }
    }

    if let Some(table) = load_table(&sources.critical, "critical hashes") {
        facts.counts.critical_rows = table.rows.len();
        facts.counts.skipped_rows += table.skipped;
        let path_col = table.column("path");
        let status_col = table.column("status");
        for row in &table.rows {
            facts.critical.push(CriticalTarget {
                path: table.cell(row, path_col).trim().to_string(),
                status: table.cell(row, status_col).trim().to_uppercase(),
            });
        }
    }

    facts.state = load_scan_state(&sources.state);

    log::info!(
        "Loaded facts: {} inventory rows, {} line facts, {} priority rows, {} critical targets, scan complete={}",
        facts.inventory.len(),
        facts.line_by_path.len(),
        facts.priority_by_path.len(),
        facts.critical.len(),
        facts.state.complete
    );
    if facts.counts.skipped_rows > 0 {
        log::warn!(
            "Skipped {} malformed fact rows",
            facts.counts.skipped_rows
        );
    }
    facts
}

#[must_use]
pub fn load_scan_state(path: &Path) -> ScanState {
    match read_scan_state(path) {
        Ok(Some(state)) => state,
        Ok(None) => {
            log::debug!("Scan state {} not found", path.display());
            ScanState::default()
        }
        Err(err) => {
            log::warn!(
                "Ignoring unreadable scan state {}: {err}",
                path.display()
            );
            ScanState::default()
        }
    }
}

fn read_scan_state(path: &Path) -> Result<Option<ScanState>> {
    match std::fs::read(path) {
        Ok(bytes) => {
            let value: Value = serde_json::from_slice(&bytes)?;
            Ok(Some(ScanState::from_value(&value)))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

struct TsvTable {
    headers: csv::StringRecord,
    rows: Vec<csv::StringRecord>,
    skipped: usize,
}

impl TsvTable {
    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header.trim() == name)
    }

    fn cell<'a>(&self, row: &'a csv::StringRecord, column: Option<usize>) -> &'a str {
        column.and_then(|idx| row.get(idx)).unwrap_or("")
    }
}

fn load_table(path: &Path, label: &str) -> Option<TsvTable> {
    match read_table(path) {
        Ok(Some(table)) => Some(table),
        Ok(None) => {
            log::debug!("No {label} facts at {}", path.display());
            None
        }
        Err(err) => {
            log::warn!(
                "Treating unreadable {label} facts {} as empty: {err}",
                path.display()
            );
            None
        }
    }
}

fn read_table(path: &Path) -> Result<Option<TsvTable>> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(file);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        match record {
            Ok(record) => rows.push(record),
            Err(err) => {
                skipped += 1;
                log::debug!("Skipping malformed row in {}: {err}", path.display());
            }
        }
    }
    Ok(Some(TsvTable {
        headers,
        rows,
        skipped,
    }))
}

fn parse_int(raw: &str, fallback: i64) -> i64 {
    raw.trim().parse::<i64>().unwrap_or(fallback)
}

fn json_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn json_int(value: &Value) -> i64 {
    match value {
        #[allow(clippy::cast_possible_truncation)]
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(text) => parse_int(text, 0),
        _ => 0,
    }
}
