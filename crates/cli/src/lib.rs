use anyhow::{bail, Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use corpus_audit::config::validate_artifact_prefix;
use corpus_audit::{
    evaluate, read_latest_snapshot, write_gate_artifacts, AuditConfig, CorpusAuditor,
    GateThresholds, RunSummary,
};
use serde_json::json;
use std::io;
use std::path::PathBuf;

mod report;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "corpus-audit")]
#[command(about = "Inventory scoring, dedupe and gap detection for a document corpus", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the quality snapshot, inventory and gap register
    Run(RunArgs),

    /// Compute the phase readiness verdict from the latest snapshot
    Gate(GateArgs),

    /// Print the JSON Schema of the quality snapshot
    Schema,
}

#[derive(Args)]
struct RunArgs {
    /// Corpus root (inventory paths are relative to it)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Directory holding the upstream fact files
    #[arg(long)]
    audit_dir: Option<PathBuf>,

    /// Directory receiving the report artifacts
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// TOML config file layered under env and flags
    #[arg(long)]
    config: Option<PathBuf>,

    /// Largest file (bytes) considered for content hashing
    #[arg(long)]
    max_dedupe_bytes: Option<u64>,

    /// Maximum number of files hashed per run
    #[arg(long)]
    max_dedupe_files: Option<usize>,

    /// Maximum number of fallback line counts per run
    #[arg(long)]
    fallback_limit: Option<usize>,

    /// Per-file line count timeout in seconds
    #[arg(long)]
    line_timeout_secs: Option<f64>,

    /// Parallel hashing workers (clamped to 1..=8)
    #[arg(long)]
    hash_concurrency: Option<usize>,

    /// File name prefix for every artifact
    #[arg(long)]
    prefix: Option<String>,

    /// Print a JSON status object instead of a text summary
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct GateArgs {
    /// Directory holding the latest snapshot; gate artifacts land here too
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Corpus root used to resolve a relative --out-dir
    #[arg(long)]
    root: Option<PathBuf>,

    /// File name prefix shared with `run`
    #[arg(long)]
    prefix: Option<String>,

    #[arg(long)]
    min_priority_line_coverage: Option<f64>,

    #[arg(long)]
    min_core_line_coverage: Option<f64>,

    #[arg(long)]
    max_open_gaps: Option<usize>,

    #[arg(long)]
    max_critical_missing: Option<usize>,

    #[arg(long)]
    max_p0_gaps: Option<usize>,

    /// Exit non-zero when the verdict is NOT_READY
    #[arg(long)]
    fail_on_not_ready: bool,

    /// Print the gate report as JSON instead of a text summary
    #[arg(long)]
    json: bool,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let json_output = match &cli.command {
        Commands::Run(args) => args.json,
        Commands::Gate(args) => args.json,
        Commands::Schema => true,
    };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet || (json_output && !cli.verbose) {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Run(args) => run_audit(args).await,
        Commands::Gate(args) => run_gate(args),
        Commands::Schema => print_schema(),
    }
}

/// Defaults, then the TOML file, then `CORPUS_AUDIT_*`, then flags.
fn resolve_run_config(args: &RunArgs) -> Result<AuditConfig> {
    let mut config = AuditConfig::default();
    if let Some(path) = &args.config {
        config
            .merge_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?;
    }
    config.merge_env();

    if let Some(root) = &args.root {
        config.root = root.clone();
    }
    if let Some(dir) = &args.audit_dir {
        config.audit_dir = dir.clone();
    }
    if let Some(dir) = &args.out_dir {
        config.out_dir = dir.clone();
    }
    if let Some(prefix) = &args.prefix {
        config.artifact_prefix = prefix.clone();
    }
    if let Some(v) = args.max_dedupe_bytes {
        config.max_dedupe_bytes = v;
    }
    if let Some(v) = args.max_dedupe_files {
        config.max_dedupe_files = v;
    }
    if let Some(v) = args.fallback_limit {
        config.fallback_limit = v;
    }
    if let Some(v) = args.line_timeout_secs {
        config.line_timeout_secs = v;
    }
    if let Some(v) = args.hash_concurrency {
        config.hash_concurrency = v;
    }
    config.validate()?;
    Ok(config)
}

async fn run_audit(args: RunArgs) -> Result<()> {
    let config = resolve_run_config(&args)?;
    log::debug!("Resolved config: {config:?}");

    let auditor = CorpusAuditor::new(config)?;
    let (outcome, artifacts) = auditor
        .run_and_emit(chrono::Utc::now())
        .await
        .context("Corpus audit failed")?;
    let summary = &outcome.summary;

    if args.json {
        let status = json!({
            "status": "ok",
            "run_id": summary.run_id,
            "docs_total": summary.docs_total,
            "open_gaps_total": summary.open_gaps_total,
            "critical_missing_total": summary.critical_missing_total,
            "priority_line_coverage_pct": summary.priority_line_coverage_pct,
            "core_line_coverage_pct": summary.core_line_coverage_pct,
            "duplicate_groups_total": summary.duplicate_groups_total,
            "priority_line_fallback_scans_used": summary.priority_line_fallback_scans_used,
            "artifacts": artifacts,
        });
        print_stdout(&serde_json::to_string_pretty(&status)?)?;
    } else {
        print_stdout(&report::render_run_status(summary, &artifacts))?;
    }
    Ok(())
}

fn resolve_gate_out_dir(args: &GateArgs) -> PathBuf {
    let mut config = AuditConfig::default();
    config.merge_env();
    if let Some(root) = &args.root {
        config.root = root.clone();
    }
    if let Some(dir) = &args.out_dir {
        config.out_dir = dir.clone();
    }
    config.resolved_out_dir()
}

fn resolve_thresholds(args: &GateArgs) -> GateThresholds {
    let mut thresholds = GateThresholds::default();
    if let Some(v) = args.min_priority_line_coverage {
        thresholds.min_priority_line_coverage = v;
    }
    if let Some(v) = args.min_core_line_coverage {
        thresholds.min_core_line_coverage = v;
    }
    if let Some(v) = args.max_open_gaps {
        thresholds.max_open_gaps = v;
    }
    if let Some(v) = args.max_critical_missing {
        thresholds.max_critical_missing = v;
    }
    if let Some(v) = args.max_p0_gaps {
        thresholds.max_p0_gaps = v;
    }
    thresholds
}

fn run_gate(args: GateArgs) -> Result<()> {
    let out_dir = resolve_gate_out_dir(&args);
    let prefix = args
        .prefix
        .clone()
        .unwrap_or_else(|| corpus_audit::config::DEFAULT_ARTIFACT_PREFIX.to_string());
    validate_artifact_prefix(&prefix)?;
    let now = chrono::Utc::now();

    let snapshot = read_latest_snapshot(&out_dir, &prefix);
    let report = evaluate(snapshot.as_ref(), &resolve_thresholds(&args), now);
    let artifacts = write_gate_artifacts(&out_dir, &prefix, now, &report)
        .context("Failed to write readiness gate")?;
    log::info!(
        "Readiness {} ({} blockers) written to {}",
        report.readiness_level,
        report.hard_blockers.len(),
        artifacts.json_latest.display()
    );

    if args.json {
        print_stdout(&serde_json::to_string_pretty(&report)?)?;
    } else {
        print_stdout(&report::render_gate_status(&report, &artifacts.md_latest))?;
    }

    if args.fail_on_not_ready && !report.is_ready() {
        bail!(
            "Readiness gate is {}: {}",
            report.readiness_level,
            report.hard_blockers.join("; ")
        );
    }
    Ok(())
}

fn print_schema() -> Result<()> {
    let schema = schemars::schema_for!(RunSummary);
    print_stdout(&serde_json::to_string_pretty(&schema)?)
}
