//! End-to-end tests for the ap binary (no generation service needed)

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// `ap` isolated from the user's config, data dir and working directory
fn ap(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ap").expect("ap binary should build");
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env("NO_COLOR", "1");
    cmd
}

const TOOLS: &str = r#"
- name: search_flights
  signature: search_flights(origin, destination)
- name: book_flight
  signature: book_flight(flight_id)
  ordering-constraints:
    - kind: after
      tool: search_flights
"#;

#[test]
fn test_config_prints_defaults() {
    let home = TempDir::new().unwrap();
    ap(&home)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("reject-threshold: high"))
        .stdout(predicate::str::contains("plateau-window: 5"))
        .stdout(predicate::str::contains("irreversible"));
}

#[test]
fn test_validate_clean_plan() {
    let home = TempDir::new().unwrap();
    fs::write(home.path().join("tools.yml"), TOOLS).unwrap();
    fs::write(
        home.path().join("plan.yml"),
        "- tool: search_flights\n  input: SFO\n  cost: 1\n- tool: book_flight\n  input: UA1\n  cost: 1\n",
    )
    .unwrap();

    ap(&home)
        .args(["validate", "plan.yml", "--tools", "tools.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("approved"));
}

#[test]
fn test_validate_critical_plan_rejected() {
    let home = TempDir::new().unwrap();
    fs::write(
        home.path().join("plan.yml"),
        "- tool: drop_table\n  input: users\n  cost: 1\n",
    )
    .unwrap();

    ap(&home)
        .args(["validate", "plan.yml", "--json"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("\"approved\": false"))
        .stdout(predicate::str::contains("irreversible"));
}

#[test]
fn test_feedback_from_plan() {
    let home = TempDir::new().unwrap();
    let store = home.path().join("store");
    fs::write(
        home.path().join("config.yml"),
        format!("experience:\n  store-path: {}\n", store.display()),
    )
    .unwrap();
    fs::write(
        home.path().join("plan.yml"),
        "- tool: search_flights\n  input: SFO\n  cost: 1\n- tool: book_flight\n  input: UA1\n  cost: 2\n",
    )
    .unwrap();

    ap(&home)
        .args([
            "--config",
            "config.yml",
            "feedback",
            "--plan",
            "plan.yml",
            "--observed",
            "2,2",
            "--task-type",
            "travel",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Recorded 2 outcome(s) for travel"));

    let log = fs::read_to_string(store.join(experiencestore::RECORDS_FILE)).unwrap();
    assert_eq!(log.lines().count(), 2);
}

#[test]
fn test_feedback_requires_task_type_for_bare_plan() {
    let home = TempDir::new().unwrap();
    fs::write(home.path().join("plan.yml"), "- tool: a\n  cost: 1\n").unwrap();

    ap(&home)
        .args(["feedback", "--plan", "plan.yml", "--observed", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--task-type"));
}
