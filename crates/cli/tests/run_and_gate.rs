use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const ENV_KEYS: [&str; 6] = [
    "CORPUS_AUDIT_ROOT",
    "CORPUS_AUDIT_MAX_DEDUPE_BYTES",
    "CORPUS_AUDIT_MAX_DEDUPE_FILES",
    "CORPUS_AUDIT_FALLBACK_LIMIT",
    "CORPUS_AUDIT_LINE_TIMEOUT_SECS",
    "CORPUS_AUDIT_HASH_CONCURRENCY",
];

#[allow(deprecated)]
fn cli() -> Command {
    let mut cmd = Command::cargo_bin("corpus-audit").expect("binary");
    for key in ENV_KEYS {
        cmd.env_remove(key);
    }
    cmd
}

fn run_json(args: &[&str]) -> Value {
    let output = cli().args(args).output().expect("command run");
    assert!(
        output.status.success(),
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

fn write_fixture(root: &Path) {
    fs::write(root.join("MAROON.md"), "a\nb\n").unwrap();
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(root.join("docs/guide.md"), "same\n").unwrap();
    fs::write(root.join("docs/copy.md"), "same\n").unwrap();

    let audit = root.join("logs/corpus_full_audit");
    fs::create_dir_all(&audit).unwrap();
    fs::write(
        audit.join("file_inventory.tsv"),
        "path\tbytes\tmtime_utc\n\
         MAROON.md\t4\t2026-01-01T00:00:00Z\n\
         docs/guide.md\t5\t2026-01-01T00:00:00Z\n\
         docs/copy.md\t5\t2026-01-01T00:00:00Z\n\
         assets/logo.png\t100\t2026-01-01T00:00:00Z\n",
    )
    .unwrap();
    fs::write(
        audit.join("text_line_counts.tsv"),
        "path\tline_count\tstatus\n\
         MAROON.md\t2\tok\n\
         docs/copy.md\t1\tok\n",
    )
    .unwrap();
    fs::write(
        audit.join("priority_corpus_manifest.tsv"),
        "path\tpriority_weight\tsource_tags\n\
         MAROON.md\t250\tcanon\n\
         docs/guide.md\t130\tguide\n\
         docs/copy.md\t10\t\n",
    )
    .unwrap();
    fs::write(
        audit.join("critical_hashes.tsv"),
        "path\tstatus\nMAROON.md\tOK\nchat.html\tMISSING\n",
    )
    .unwrap();
    fs::write(
        audit.join("state.json"),
        r#"{"complete": true, "processed": 3, "candidates_total": 3}"#,
    )
    .unwrap();
}

#[test]
fn run_writes_all_artifacts_and_gate_reads_them() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write_fixture(root);
    let root_arg = root.to_str().unwrap();

    let status = run_json(&["run", "--root", root_arg, "--json"]);
    assert_eq!(status["status"], "ok");
    assert_eq!(status["docs_total"], 4);
    assert_eq!(status["duplicate_groups_total"], 1);
    assert_eq!(status["critical_missing_total"], 1);

    let artifacts = status["artifacts"].as_object().expect("artifacts");
    assert_eq!(artifacts.len(), 8);
    for (name, path) in artifacts {
        let path = Path::new(path.as_str().unwrap());
        assert!(path.is_file(), "{name} missing at {}", path.display());
    }

    let out_dir = root.join("reports/ops");
    let inventory = fs::read_to_string(out_dir.join("corpus_file_inventory_latest.csv")).unwrap();
    assert!(inventory.starts_with("doc_id,source_path,bytes,"));
    assert_eq!(inventory.lines().count(), 5);
    let register = fs::read_to_string(out_dir.join("corpus_gap_register_latest.csv")).unwrap();
    assert!(register.contains("CGAP-0001,P0,critical_missing,chat.html"));

    let out_arg = out_dir.to_str().unwrap();
    let strict = run_json(&["gate", "--out-dir", out_arg, "--json"]);
    assert_eq!(strict["readiness_level"], "NOT_READY");
    assert_eq!(strict["recommended_stage"], "cleaning_hardening");
    let blockers: Vec<&str> = strict["hard_blockers"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(blockers.contains(&"critical_missing_total 1 > 0"));
    assert_eq!(strict["run_id"], status["run_id"]);

    let relaxed = run_json(&[
        "gate",
        "--out-dir",
        out_arg,
        "--min-priority-line-coverage",
        "0",
        "--max-open-gaps",
        "10",
        "--max-critical-missing",
        "1",
        "--max-p0-gaps",
        "1",
        "--json",
    ]);
    assert_eq!(relaxed["readiness_level"], "READY");
    assert!(out_dir
        .join("corpus_phase_readiness_gate_latest.json")
        .is_file());
    assert!(out_dir.join("corpus_phase_readiness_gate_latest.md").is_file());
}

#[test]
fn gate_without_snapshot_fails_when_asked() {
    let temp = tempdir().unwrap();
    cli()
        .args(["gate", "--out-dir", temp.path().to_str().unwrap()])
        .arg("--fail-on-not-ready")
        .assert()
        .failure()
        .stderr(predicate::str::contains("snapshot_missing"));
}

#[test]
fn run_on_empty_root_still_emits_a_snapshot() {
    let temp = tempdir().unwrap();
    let status = run_json(&[
        "run",
        "--root",
        temp.path().to_str().unwrap(),
        "--prefix",
        "empty",
        "--json",
    ]);
    assert_eq!(status["docs_total"], 0);
    assert_eq!(status["priority_line_coverage_pct"], 0.0);
    // A missing state file counts as an incomplete scan.
    assert_eq!(status["open_gaps_total"], 1);
    assert!(temp
        .path()
        .join("reports/ops/empty_quality_snapshot_latest.json")
        .is_file());
}

#[test]
fn invalid_prefix_is_rejected() {
    let temp = tempdir().unwrap();
    cli()
        .args(["run", "--root", temp.path().to_str().unwrap()])
        .args(["--prefix", "bad/prefix"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("artifact_prefix"));
}

#[test]
fn gate_rejects_prefix_that_escapes_out_dir() {
    let temp = tempdir().unwrap();
    let out_dir = temp.path().join("ops");
    fs::create_dir_all(&out_dir).unwrap();
    cli()
        .args(["gate", "--out-dir", out_dir.to_str().unwrap()])
        .args(["--prefix", "../escaped"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("artifact_prefix"));
    assert!(!temp
        .path()
        .join("escaped_phase_readiness_gate_latest.json")
        .exists());
}

#[test]
fn schema_describes_the_snapshot() {
    cli()
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("priority_line_coverage_pct"))
        .stdout(predicate::str::contains("run_id"));
}
