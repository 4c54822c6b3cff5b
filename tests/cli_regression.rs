#![cfg(unix)]
// The binary is driven end to end against the fake compiler and toolchain.

mod common;

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use common::{tools, Fixture};
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

fn goldrun(fixture: &Fixture) -> Command {
    goldrun_at(fixture.root())
}

fn goldrun_at(root: &Path) -> Command {
    let tools = tools();
    let mut cmd = Command::cargo_bin("goldrun").unwrap();
    cmd.arg("--root")
        .arg(root)
        .arg("--compiler")
        .arg(&tools.compiler)
        .arg("--cc")
        .arg(&tools.cc)
        .arg("--runtime")
        .arg(&tools.runtime)
        .arg("--no-color");
    cmd
}

#[test]
fn passing_suite_exits_zero() {
    let fixture = Fixture::new();
    fixture
        .program("algorithm", "product", &["echo $((6 * 7))"], "42")
        .rejected("error", "semi", "Unexpected token ';' at line 3", "Unexpected token ';' at line 3");

    goldrun(&fixture)
        .assert()
        .success()
        .stdout(contains("PASS algorithm/product"))
        .stdout(contains("PASS error/semi"))
        .stdout(contains("PASS 2 of 2 cases passed"));
}

#[test]
fn failing_suite_exits_one_and_shows_both_texts() {
    let fixture = Fixture::new();
    fixture
        .program("function", "double", &["read n", "echo $((n * 2))"], "10")
        .stdin("function", "double", "7");

    goldrun(&fixture)
        .assert()
        .code(1)
        .stdout(contains("FAIL function/double"))
        .stdout(contains("observed:\n    14"))
        .stdout(contains("expected:\n    10"))
        .stdout(contains("Failed cases:\n  - function/double (output mismatch)"));
}

#[test]
fn missing_fixture_root_is_fatal() {
    let fixture = Fixture::new();
    goldrun_at(&fixture.root().join("missing"))
        .assert()
        .code(2)
        .stderr(contains("does not exist").and(contains("goldrun::fixtures::missing_root")));
}

#[test]
fn unknown_category_is_fatal() {
    let fixture = Fixture::new();
    goldrun(&fixture)
        .args(["--category", "perf"])
        .assert()
        .code(2)
        .stderr(contains("unknown category 'perf'"));
}

#[test]
fn list_prints_cases_without_running_them() {
    let fixture = Fixture::new();
    fixture
        .program("algorithm", "binary_search", &["echo 1"], "wrong")
        .stdin("algorithm", "binary_search", "3");

    goldrun(&fixture)
        .arg("--list")
        .assert()
        .success()
        .stdout(contains("== algorithm (1 cases)"))
        .stdout(contains("  binary_search [stdin]"))
        .stdout(contains("FAIL").not());
}

#[test]
fn json_summary_is_written() {
    let fixture = Fixture::new();
    fixture
        .program("algorithm", "ok", &["echo 1"], "1")
        .program("algorithm", "bad", &["BAD"], "1");
    let json_path = fixture.root().join("summary.json");

    goldrun(&fixture)
        .arg("--json")
        .arg(&json_path)
        .assert()
        .code(1)
        .stdout(contains("build failure"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["outcome"], "some_failed");
    assert_eq!(json["passed"], 1);
    assert_eq!(json["failures"][0]["id"], "algorithm/bad");
    assert_eq!(json["failures"][0]["kind"], "build_failed");
}

#[test]
fn config_file_supplies_categories() {
    let fixture = Fixture::new();
    fixture.rejected("negative", "oops", "nope", "nope");
    let config_path = fixture.root().join("goldrun.yaml");
    fs::write(
        &config_path,
        "categories:\n  - name: negative\n    expect_rejection: true\n",
    )
    .unwrap();

    goldrun(&fixture)
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(contains("PASS negative/oops"))
        .stdout(contains("algorithm").not());
}
