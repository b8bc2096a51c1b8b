use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

const DOC_ID_PREFIX: &str = "DOC-";
const DOC_ID_HEX_LEN: usize = 12;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScopeClass {
    Core,
    Extended,
}

impl ScopeClass {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Extended => "extended",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum LineScanStatus {
    Ok,
    #[default]
    Missing,
    Error,
    Timeout,
}

impl LineScanStatus {
    /// Parses a scanner status cell. Blank cells mean the scanner never saw the file;
    /// anything unrecognised is treated as a failed scan.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ok" => Self::Ok,
            "" | "missing" => Self::Missing,
            "timeout" => Self::Timeout,
            _ => Self::Error,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Missing => "missing",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }

    #[must_use]
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GapFlag {
    LineScanMissing,
    PriorityMissingLineCount,
    DuplicateContent,
}

impl GapFlag {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LineScanMissing => "line_scan_missing",
            Self::PriorityMissingLineCount => "priority_missing_line_count",
            Self::DuplicateContent => "duplicate_content",
        }
    }
}

/// One audited corpus file after scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct DocumentRecord {
    pub doc_id: String,
    pub source_path: String,
    pub bytes: u64,
    pub mtime_utc: String,
    pub extension: String,
    pub is_text: bool,
    pub priority_weight: i64,
    /// Opaque manifest metadata, carried through untouched.
    pub source_tags: String,
    pub scope_class: ScopeClass,
    pub line_count: Option<u64>,
    pub line_scan_status: LineScanStatus,
    pub dedupe_hash: Option<String>,
    pub duplicate_group_size: usize,
    pub quality_score: f64,
    pub gap_flags: Vec<GapFlag>,
    pub last_scanned_utc: String,
}

impl DocumentRecord {
    #[must_use]
    pub fn has_flag(&self, flag: GapFlag) -> bool {
        self.gap_flags.contains(&flag)
    }

    #[must_use]
    pub fn gap_flags_joined(&self) -> String {
        self.gap_flags
            .iter()
            .map(|flag| flag.as_str())
            .collect::<Vec<_>>()
            .join("|")
    }

    #[must_use]
    pub fn is_priority(&self) -> bool {
        self.priority_weight > 0
    }

    #[must_use]
    pub fn is_core(&self) -> bool {
        self.scope_class == ScopeClass::Core
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
pub enum Severity {
    P0,
    P1,
    P2,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GapType {
    CriticalMissing,
    DedupeRequired,
    LineageCoverage,
    ScanIncomplete,
}

impl GapType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CriticalMissing => "critical_missing",
            Self::DedupeRequired => "dedupe_required",
            Self::LineageCoverage => "lineage_coverage",
            Self::ScanIncomplete => "scan_incomplete",
        }
    }
}

impl fmt::Display for GapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum GapStatus {
    #[default]
    Open,
}

impl GapStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct GapRecord {
    /// Sequential within a run; only meaningful next to the sorted register it came from.
    pub gap_id: String,
    pub severity: Severity,
    pub gap_type: GapType,
    pub source_path: String,
    pub detail: String,
    pub recommended_action: String,
    #[serde(default)]
    pub status: GapStatus,
    pub created_at_utc: String,
}

/// Stable document identifier for a corpus-relative path.
///
/// Same path, same id, on every run and every machine.
#[must_use]
pub fn doc_id_for_path(source_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_path.as_bytes());
    let digest = hasher.finalize();
    let mut id = String::with_capacity(DOC_ID_PREFIX.len() + DOC_ID_HEX_LEN);
    id.push_str(DOC_ID_PREFIX);
    for byte in digest.iter().take(DOC_ID_HEX_LEN / 2) {
        id.push_str(&format!("{byte:02X}"));
    }
    id
}
