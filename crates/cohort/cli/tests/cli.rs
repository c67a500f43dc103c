//! Binary-level checks that need no record store.

use assert_cmd::Command;
use predicates::prelude::*;

fn cohort() -> Command {
    let mut cmd = Command::cargo_bin("cohort").expect("binary should build");
    cmd.env_remove("COHORT_ENDPOINT")
        .env_remove("COHORT_TEAM")
        .env_remove("COHORT_CONFIG")
        .args(["--config", "/nonexistent/cohort/config.toml"]);
    cmd
}

#[test]
fn config_prints_effective_settings() {
    cohort()
        .args([
            "--endpoint",
            "https://cohort.example/api",
            "--team",
            "t1",
            "--output",
            "json",
            "config",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"endpoint\": \"https://cohort.example/api\""))
        .stdout(predicate::str::contains("\"team\": \"t1\""));
}

#[test]
fn config_falls_back_to_default_endpoint() {
    cohort()
        .args(["--output", "yaml", "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://localhost:3000/api"));
}

#[test]
fn submit_without_evidence_is_rejected_before_any_request() {
    cohort()
        .args([
            "--endpoint",
            "http://127.0.0.1:9",
            "--team",
            "t1",
            "submit",
            "--milestone",
            "m1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--file"));
}

#[test]
fn status_requires_a_team() {
    cohort()
        .args(["status", "--program", "p1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no team configured"));
}
