use crate::{AuditError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MAX_DEDUPE_BYTES: u64 = 250_000;
pub const DEFAULT_MAX_DEDUPE_FILES: usize = 5_000;
pub const DEFAULT_FALLBACK_LIMIT: usize = 2_000;
pub const DEFAULT_LINE_TIMEOUT_SECS: f64 = 1.5;
pub const DEFAULT_ARTIFACT_PREFIX: &str = "corpus";

const MIN_LINE_TIMEOUT_SECS: f64 = 0.1;
const MAX_HASH_CONCURRENCY: usize = 8;

const DEFAULT_AUDIT_DIR: &str = "logs/corpus_full_audit";
const DEFAULT_OUT_DIR: &str = "reports/ops";

pub const INVENTORY_FILE_NAME: &str = "file_inventory.tsv";
pub const LINE_COUNTS_FILE_NAME: &str = "text_line_counts.tsv";
pub const PRIORITY_FILE_NAME: &str = "priority_corpus_manifest.tsv";
pub const CRITICAL_FILE_NAME: &str = "critical_hashes.tsv";
pub const STATE_FILE_NAME: &str = "state.json";

/// Resolved settings for one audit run.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditConfig {
    /// Corpus root; inventory paths are relative to it.
    pub root: PathBuf,
    pub audit_dir: PathBuf,
    pub out_dir: PathBuf,
    pub artifact_prefix: String,
    pub inventory_path: Option<PathBuf>,
    pub line_counts_path: Option<PathBuf>,
    pub priority_path: Option<PathBuf>,
    pub critical_path: Option<PathBuf>,
    pub state_path: Option<PathBuf>,
    pub max_dedupe_bytes: u64,
    pub max_dedupe_files: usize,
    pub fallback_limit: usize,
    pub line_timeout_secs: f64,
    pub hash_concurrency: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            audit_dir: PathBuf::from(DEFAULT_AUDIT_DIR),
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            artifact_prefix: DEFAULT_ARTIFACT_PREFIX.to_string(),
            inventory_path: None,
            line_counts_path: None,
            priority_path: None,
            critical_path: None,
            state_path: None,
            max_dedupe_bytes: DEFAULT_MAX_DEDUPE_BYTES,
            max_dedupe_files: DEFAULT_MAX_DEDUPE_FILES,
            fallback_limit: DEFAULT_FALLBACK_LIMIT,
            line_timeout_secs: DEFAULT_LINE_TIMEOUT_SECS,
            hash_concurrency: default_hash_concurrency(),
        }
    }
}

/// Config file shape: every key optional, unknown keys rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAuditConfig {
    root: Option<PathBuf>,
    audit_dir: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    artifact_prefix: Option<String>,
    inventory_path: Option<PathBuf>,
    line_counts_path: Option<PathBuf>,
    priority_path: Option<PathBuf>,
    critical_path: Option<PathBuf>,
    state_path: Option<PathBuf>,
    max_dedupe_bytes: Option<u64>,
    max_dedupe_files: Option<usize>,
    fallback_limit: Option<usize>,
    line_timeout_secs: Option<f64>,
    hash_concurrency: Option<usize>,
}

impl AuditConfig {
    /// Layers a TOML document over the current values.
    pub fn merge_toml(&mut self, text: &str) -> Result<()> {
        let raw: RawAuditConfig = toml::from_str(text)?;
        self.apply_raw(raw);
        self.validate()
    }

    pub fn merge_toml_file(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        self.merge_toml(&text).map_err(|err| match err {
            AuditError::TomlError(inner) => {
                AuditError::InvalidConfig(format!("{}: {inner}", path.display()))
            }
            other => other,
        })
    }

    fn apply_raw(&mut self, raw: RawAuditConfig) {
        if let Some(root) = raw.root {
            self.root = root;
        }
        if let Some(dir) = raw.audit_dir {
            self.audit_dir = dir;
        }
        if let Some(dir) = raw.out_dir {
            self.out_dir = dir;
        }
        if let Some(prefix) = raw.artifact_prefix {
            self.artifact_prefix = prefix;
        }
        self.inventory_path = raw.inventory_path.or(self.inventory_path.take());
        self.line_counts_path = raw.line_counts_path.or(self.line_counts_path.take());
        self.priority_path = raw.priority_path.or(self.priority_path.take());
        self.critical_path = raw.critical_path.or(self.critical_path.take());
        self.state_path = raw.state_path.or(self.state_path.take());
        if let Some(v) = raw.max_dedupe_bytes {
            self.max_dedupe_bytes = v;
        }
        if let Some(v) = raw.max_dedupe_files {
            self.max_dedupe_files = v;
        }
        if let Some(v) = raw.fallback_limit {
            self.fallback_limit = v;
        }
        if let Some(v) = raw.line_timeout_secs {
            self.line_timeout_secs = v;
        }
        if let Some(v) = raw.hash_concurrency {
            self.hash_concurrency = v;
        }
    }

    /// Applies `CORPUS_AUDIT_*` overrides from the process environment.
    pub fn merge_env(&mut self) {
        self.merge_env_with(|key| std::env::var(key).ok());
    }

    /// Blank or unparsable values leave the current setting in place.
    pub fn merge_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup("CORPUS_AUDIT_ROOT").and_then(non_blank) {
            self.root = PathBuf::from(root);
        }
        self.max_dedupe_bytes = parse_env_number(
            lookup("CORPUS_AUDIT_MAX_DEDUPE_BYTES").as_deref(),
            self.max_dedupe_bytes,
        );
        self.max_dedupe_files = parse_env_number(
            lookup("CORPUS_AUDIT_MAX_DEDUPE_FILES").as_deref(),
            self.max_dedupe_files,
        );
        self.fallback_limit = parse_env_number(
            lookup("CORPUS_AUDIT_FALLBACK_LIMIT").as_deref(),
            self.fallback_limit,
        );
        self.line_timeout_secs = parse_env_number(
            lookup("CORPUS_AUDIT_LINE_TIMEOUT_SECS").as_deref(),
            self.line_timeout_secs,
        );
        self.hash_concurrency = parse_env_number(
            lookup("CORPUS_AUDIT_HASH_CONCURRENCY").as_deref(),
            self.hash_concurrency,
        );
    }

    pub fn validate(&self) -> Result<()> {
        if !self.line_timeout_secs.is_finite() || self.line_timeout_secs <= 0.0 {
            return Err(AuditError::InvalidConfig(format!(
                "line_timeout_secs must be a positive number (got {})",
                self.line_timeout_secs
            )));
        }
        Duration::try_from_secs_f64(self.line_timeout_secs).map_err(|err| {
            AuditError::InvalidConfig(format!(
                "line_timeout_secs {} is out of range: {err}",
                self.line_timeout_secs
            ))
        })?;
        validate_artifact_prefix(&self.artifact_prefix)
    }

    #[must_use]
    pub fn line_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.line_timeout_secs.max(MIN_LINE_TIMEOUT_SECS))
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_LINE_TIMEOUT_SECS))
    }

    #[must_use]
    pub fn effective_hash_concurrency(&self) -> usize {
        self.hash_concurrency.clamp(1, MAX_HASH_CONCURRENCY)
    }

    #[must_use]
    pub fn resolved_audit_dir(&self) -> PathBuf {
        resolve_under(&self.root, &self.audit_dir)
    }

    #[must_use]
    pub fn resolved_out_dir(&self) -> PathBuf {
        resolve_under(&self.root, &self.out_dir)
    }

    #[must_use]
    pub fn inventory_source(&self) -> PathBuf {
        self.source_path(self.inventory_path.as_deref(), INVENTORY_FILE_NAME)
    }

    #[must_use]
    pub fn line_counts_source(&self) -> PathBuf {
        self.source_path(self.line_counts_path.as_deref(), LINE_COUNTS_FILE_NAME)
    }

    #[must_use]
    pub fn priority_source(&self) -> PathBuf {
        self.source_path(self.priority_path.as_deref(), PRIORITY_FILE_NAME)
    }

    #[must_use]
    pub fn critical_source(&self) -> PathBuf {
        self.source_path(self.critical_path.as_deref(), CRITICAL_FILE_NAME)
    }

    #[must_use]
    pub fn state_source(&self) -> PathBuf {
        self.source_path(self.state_path.as_deref(), STATE_FILE_NAME)
    }

    fn source_path(&self, explicit: Option<&Path>, file_name: &str) -> PathBuf {
        match explicit {
            Some(path) => resolve_under(&self.root, path),
            None => self.resolved_audit_dir().join(file_name),
        }
    }
}

/// Artifact prefixes become part of file names, so they must not carry path
/// separators or whitespace.
pub fn validate_artifact_prefix(prefix: &str) -> Result<()> {
    if prefix.trim().is_empty() {
        return Err(AuditError::InvalidConfig(
            "artifact_prefix must not be empty".to_string(),
        ));
    }
    if prefix
        .chars()
        .any(|c| std::path::is_separator(c) || c.is_whitespace())
    {
        return Err(AuditError::InvalidConfig(format!(
            "artifact_prefix {prefix:?} must be a plain file-name fragment"
        )));
    }
    Ok(())
}

fn resolve_under(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_env_number<T: std::str::FromStr>(raw: Option<&str>, current: T) -> T {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(current)
}

fn default_hash_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_HASH_CONCURRENCY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_budgets() {
        let cfg = AuditConfig::default();
        assert_eq!(cfg.max_dedupe_bytes, 250_000);
        assert_eq!(cfg.max_dedupe_files, 5_000);
        assert_eq!(cfg.fallback_limit, 2_000);
        assert_eq!(cfg.line_timeout(), Duration::from_millis(1_500));
        assert!(cfg.effective_hash_concurrency() >= 1);
    }

    #[test]
    fn toml_layer_overrides_only_given_keys() {
        let mut cfg = AuditConfig::default();
        cfg.merge_toml(
            r#"
            root = "/data/corpus"
            max_dedupe_files = 10
            state_path = "/tmp/state.json"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.root, PathBuf::from("/data/corpus"));
        assert_eq!(cfg.max_dedupe_files, 10);
        assert_eq!(cfg.max_dedupe_bytes, DEFAULT_MAX_DEDUPE_BYTES);
        assert_eq!(cfg.state_source(), PathBuf::from("/tmp/state.json"));
        assert_eq!(
            cfg.inventory_source(),
            PathBuf::from("/data/corpus/logs/corpus_full_audit/file_inventory.tsv")
        );
    }

    #[test]
    fn toml_rejects_unknown_keys() {
        let mut cfg = AuditConfig::default();
        let err = cfg.merge_toml("max_dedupe_megabytes = 3").unwrap_err();
        assert!(matches!(err, AuditError::TomlError(_)));
    }

    #[test]
    fn toml_rejects_non_positive_timeout() {
        let mut cfg = AuditConfig::default();
        let err = cfg.merge_toml("line_timeout_secs = 0.0").unwrap_err();
        assert!(matches!(err, AuditError::InvalidConfig(_)));
    }

    #[test]
    fn env_layer_ignores_blank_and_garbage() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CORPUS_AUDIT_MAX_DEDUPE_BYTES", " 1024 "),
            ("CORPUS_AUDIT_MAX_DEDUPE_FILES", ""),
            ("CORPUS_AUDIT_FALLBACK_LIMIT", "abc"),
            ("CORPUS_AUDIT_LINE_TIMEOUT_SECS", "0.25"),
            ("CORPUS_AUDIT_ROOT", "   "),
        ]);
        let mut cfg = AuditConfig::default();
        cfg.merge_env_with(|key| env.get(key).map(|v| (*v).to_string()));
        assert_eq!(cfg.max_dedupe_bytes, 1024);
        assert_eq!(cfg.max_dedupe_files, DEFAULT_MAX_DEDUPE_FILES);
        assert_eq!(cfg.fallback_limit, DEFAULT_FALLBACK_LIMIT);
        assert_eq!(cfg.line_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.root, PathBuf::from("."));
    }

    #[test]
    fn tiny_timeouts_are_floored() {
        let cfg = AuditConfig {
            line_timeout_secs: 0.001,
            ..AuditConfig::default()
        };
        assert_eq!(cfg.line_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn oversized_timeouts_are_invalid_config() {
        let mut cfg = AuditConfig::default();
        cfg.merge_env_with(|key| {
            (key == "CORPUS_AUDIT_LINE_TIMEOUT_SECS").then(|| "1e20".to_string())
        });
        assert_eq!(cfg.line_timeout_secs, 1e20);
        assert!(matches!(cfg.validate(), Err(AuditError::InvalidConfig(_))));
        assert_eq!(cfg.line_timeout(), Duration::from_millis(1_500));

        let err = cfg.merge_toml("line_timeout_secs = 1e20").unwrap_err();
        assert!(matches!(err, AuditError::InvalidConfig(_)));
    }

    #[test]
    fn prefixes_with_separators_are_rejected() {
        assert!(validate_artifact_prefix("corpus").is_ok());
        assert!(validate_artifact_prefix("../x").is_err());
        assert!(validate_artifact_prefix("a b").is_err());
        assert!(validate_artifact_prefix("  ").is_err());
    }

    #[test]
    fn hash_concurrency_is_clamped() {
        let cfg = AuditConfig {
            hash_concurrency: 0,
            ..AuditConfig::default()
        };
        assert_eq!(cfg.effective_hash_concurrency(), 1);
        let cfg = AuditConfig {
            hash_concurrency: 999,
            ..AuditConfig::default()
        };
        assert_eq!(cfg.effective_hash_concurrency(), MAX_HASH_CONCURRENCY);
    }

    #[test]
    fn prefix_must_be_a_file_name_fragment() {
        let cfg = AuditConfig {
            artifact_prefix: "ops/corpus".to_string(),
            ..AuditConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
