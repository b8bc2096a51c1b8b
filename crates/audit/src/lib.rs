//! # Corpus Audit
//!
//! Inventory scoring, content dedupe and gap detection for a document corpus.
//!
//! ## Pipeline
//!
//! ```text
//! Fact sources (TSV + state JSON)
//!     │
//!     ├──> Fact Loader
//!     │      └─> Per-path indices
//!     │
//!     ├──> Scope Classifier ──> Dedupe Hasher (bounded, parallel)
//!     │
//!     ├──> Line-count Fallback (budgeted, timed)
//!     │
//!     ├──> Quality Scorer ──> Gap Detector
//!     │
//!     └──> Summary Aggregator ──> Report Emitter
//!            └─> CSV / JSON / Markdown artifacts
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use corpus_audit::{AuditConfig, CorpusAuditor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AuditConfig {
//!         root: "/path/to/corpus".into(),
//!         ..AuditConfig::default()
//!     };
//!     let auditor = CorpusAuditor::new(config)?;
//!     let (outcome, _artifacts) = auditor.run_and_emit(chrono::Utc::now()).await?;
//!
//!     println!(
//!         "Audited {} docs, {} open gaps",
//!         outcome.summary.docs_total, outcome.summary.open_gaps_total
//!     );
//!     Ok(())
//! }
//! ```

mod error;

pub mod config;
pub mod dedupe;
pub mod facts;
pub mod fallback;
pub mod gaps;
pub mod gate;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod scope;
pub mod score;
pub mod summary;

pub use config::AuditConfig;
pub use error::{AuditError, Result};
pub use fallback::{LineCountOutcome, LineCounter, WcLineCounter};
pub use gate::{evaluate, read_latest_snapshot, write_gate_artifacts, GateReport, GateThresholds};
pub use model::{DocumentRecord, GapRecord, GapType, LineScanStatus, ScopeClass, Severity};
pub use pipeline::{AuditOutcome, CorpusAuditor};
pub use report::ArtifactSet;
pub use summary::RunSummary;
