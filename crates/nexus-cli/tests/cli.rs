//! E2E CLI tests: each test runs `nx` as a subprocess against an isolated
//! temp project root.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/patents.json")
}

/// Build a Command targeting the nx binary, rooted in `dir`.
fn nx_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("nx"));
    cmd.current_dir(dir);
    cmd.env("NEXUS_LOG", "error");
    cmd.env_remove("NEXUS_FORMAT");
    cmd.env_remove("NEXUS_API_KEY");
    cmd
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("nx should not crash");
    assert!(
        output.status.success(),
        "nx failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("--json should produce valid JSON")
}

fn result_ids(response: &Value) -> Vec<String> {
    response["results"]
        .as_array()
        .expect("results array")
        .iter()
        .map(|r| r["candidate"]["id"].as_str().expect("id").to_string())
        .collect()
}

#[test]
fn profiles_lists_builtin_profiles() {
    let dir = TempDir::new().expect("tempdir");
    let listing = json_stdout(nx_cmd(dir.path()).args(["profiles", "--json"]));

    assert_eq!(listing["default_profile"], "standard");
    let names: Vec<&str> = listing["profiles"]
        .as_array()
        .expect("profiles")
        .iter()
        .map(|p| p["name"].as_str().expect("name"))
        .collect();
    assert!(names.contains(&"standard"));
    assert!(names.contains(&"enhanced"));
}

#[test]
fn profiles_include_configured_ones() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::create_dir_all(dir.path().join(".nexus")).expect("mkdir");
    std::fs::write(
        dir.path().join(".nexus/config.toml"),
        "[profiles.recall]\nlexical = 0.5\nsemantic = 0.5\ncoherence = 0.0\ngraph = 0.0\nfeedback = 0.0\nhistorical_feedback = 0.0\n",
    )
    .expect("write config");

    nx_cmd(dir.path())
        .args(["profiles"])
        .env("NEXUS_FORMAT", "text")
        .assert()
        .success()
        .stdout(predicate::str::contains("recall\t"));
}

#[test]
fn search_fixture_ranks_cryptography_patents() {
    let dir = TempDir::new().expect("tempdir");
    let fixture = fixture();
    let response = json_stdout(nx_cmd(dir.path()).args([
        "search",
        "cryptography",
        "--fixture",
        fixture.to_str().expect("utf8 path"),
        "--threshold",
        "0",
        "--json",
    ]));

    let ids = result_ids(&response);
    assert!(ids.contains(&"2".to_string()), "ids: {ids:?}");
    assert!(ids.contains(&"6".to_string()), "ids: {ids:?}");
    assert_eq!(response["context"]["domain"], "Cryptography");
    assert_eq!(response["trace"]["stages"].as_array().map(Vec::len), Some(9));
}

#[test]
fn index_then_basic_search_uses_the_store() {
    let dir = TempDir::new().expect("tempdir");
    let fixture = fixture();

    let summary = json_stdout(nx_cmd(dir.path()).args([
        "index",
        fixture.to_str().expect("utf8 path"),
        "--json",
    ]));
    assert_eq!(summary["indexed"], 8);
    assert_eq!(summary["embedded"], 8);
    assert_eq!(summary["total"], 8);
    assert!(dir.path().join(".nexus/documents.sqlite3").exists());

    let response = json_stdout(nx_cmd(dir.path()).args(["search", "ledger", "--basic", "--json"]));
    assert_eq!(result_ids(&response), ["2"]);
    assert_eq!(response["results"][0]["scores"]["final"], 1.0);
}

#[test]
fn reindexing_is_an_upsert() {
    let dir = TempDir::new().expect("tempdir");
    let fixture = fixture();
    let path = fixture.to_str().expect("utf8 path");

    nx_cmd(dir.path()).args(["index", path]).assert().success();
    let summary = json_stdout(nx_cmd(dir.path()).args(["index", path, "--json"]));
    assert_eq!(summary["total"], 8);
}

#[test]
fn search_without_store_reports_store_unavailable() {
    let dir = TempDir::new().expect("tempdir");
    nx_cmd(dir.path())
        .args(["search", "ledger", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E5001"));
}

#[test]
fn invalid_requests_report_error_codes() {
    let dir = TempDir::new().expect("tempdir");
    let fixture = fixture();
    let path = fixture.to_str().expect("utf8 path");

    nx_cmd(dir.path())
        .args(["search", "", "--fixture", path, "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1001"));

    nx_cmd(dir.path())
        .args(["search", "ledger", "--fixture", path, "--profile", "turbo", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2001"));

    nx_cmd(dir.path())
        .args(["search", "ledger", "--fixture", path, "--threshold", "1.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("suggestion:"));
}

#[test]
fn feedback_accumulates_per_context() {
    let dir = TempDir::new().expect("tempdir");

    let first = json_stdout(nx_cmd(dir.path()).args([
        "feedback",
        "2",
        "--domain",
        "Cryptography",
        "--json",
    ]));
    assert_eq!(first["action"], "accepted");
    assert_eq!(first["context"], "cryptography");
    assert_eq!(first["context_outcomes"], 1);
    assert!(first["historical_score"].as_f64().expect("score") > 0.5);

    let second = json_stdout(nx_cmd(dir.path()).args([
        "feedback",
        "2",
        "--query",
        "cryptography patents",
        "--reject",
        "--json",
    ]));
    assert_eq!(second["action"], "rejected");
    assert_eq!(second["context"], "cryptography");
    assert_eq!(second["context_outcomes"], 2);

    assert!(dir.path().join(".nexus/feedback.jsonl").exists());
}

#[test]
fn adaptive_search_reads_recorded_feedback() {
    let dir = TempDir::new().expect("tempdir");
    let fixture = fixture();
    nx_cmd(dir.path())
        .args(["feedback", "6", "--domain", "Cryptography"])
        .assert()
        .success();

    let response = json_stdout(nx_cmd(dir.path()).args([
        "search",
        "cryptography",
        "--fixture",
        fixture.to_str().expect("utf8 path"),
        "--profile",
        "adaptive",
        "--threshold",
        "0",
        "--json",
    ]));
    assert_eq!(response["profile"], "adaptive");
    let six = response["results"]
        .as_array()
        .expect("results")
        .iter()
        .find(|r| r["candidate"]["id"] == "6")
        .expect("6 is ranked");
    assert!(six["scores"]["historical_feedback"].as_f64().expect("history") > 0.5);
}

#[test]
fn pretty_output_explains_scores() {
    let dir = TempDir::new().expect("tempdir");
    let fixture = fixture();
    nx_cmd(dir.path())
        .args([
            "search",
            "neural network",
            "--fixture",
            fixture.to_str().expect("utf8 path"),
            "--explain",
        ])
        .env("NEXUS_FORMAT", "pretty")
        .assert()
        .success()
        .stdout(predicate::str::contains("signals:"))
        .stdout(predicate::str::contains("mmr_diversity"));
}
