mod common;

use assert_cmd::Command;
use common::{book_file, first_fortnight_spend, november_book, write_json};
use predicates::str::contains;
use tempfile::tempdir;

fn pacing_cli(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("pacing_cli").unwrap();
    cmd.env("BUDGET_PACING_HOME", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn version_reports_package_version() {
    let dir = tempdir().unwrap();
    pacing_cli(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(contains(format!("budget_pacing {}", env!("CARGO_PKG_VERSION"))));
}

#[test]
fn unknown_command_fails_with_usage() {
    let dir = tempdir().unwrap();
    pacing_cli(dir.path())
        .arg("rebalance")
        .assert()
        .failure()
        .stderr(contains("unknown command `rebalance`"));
}

#[test]
fn reprocess_then_project_from_files() {
    let dir = tempdir().unwrap();
    let fixture = november_book();
    let book_path = book_file(dir.path());
    let spend_path = dir.path().join("spend.json");
    write_json(&book_path, &fixture.book);
    write_json(&spend_path, &first_fortnight_spend(fixture.campaign));

    pacing_cli(dir.path())
        .args(["reprocess", "--book"])
        .arg(&book_path)
        .arg("--spend")
        .arg(&spend_path)
        .args(["--from", "2023-11-01", "--today", "2023-11-16", "--spend-pcts"])
        .assert()
        .success()
        .stdout(contains("Holiday"))
        .stdout(contains("Effective spend"))
        .stdout(contains("1 campaign(s), 16 day(s) reprocessed"));

    assert!(dir.path().join("books/backups/november").is_dir());

    pacing_cli(dir.path())
        .args(["projections", "--book"])
        .arg(&book_path)
        .args(["--start", "2023-11-01", "--end", "2023-11-30", "--today", "2023-11-16"])
        .assert()
        .success()
        .stdout(contains("Projections by account 2023-11-01 to 2023-11-30 (as of 2023-11-15)"))
        .stdout(contains("Acme"))
        .stdout(contains("2400.0000"));
}

#[test]
fn projections_can_print_json() {
    let dir = tempdir().unwrap();
    let fixture = november_book();
    let book_path = book_file(dir.path());
    write_json(&book_path, &fixture.book);

    let output = pacing_cli(dir.path())
        .args(["projections", "--book"])
        .arg(&book_path)
        .args([
            "--start",
            "2023-11-01",
            "--end",
            "2023-11-30",
            "--today",
            "2023-11-01",
            "--breakdown",
            "campaign",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(payload["breakdown"], "campaign");
    let row = &payload["data"][fixture.campaign.to_string()];
    assert_eq!(row["allocated_total_budget"], "3000.0000");
    assert!(row["flat_fee"].is_null());
}

#[test]
fn missing_required_option_is_reported() {
    let dir = tempdir().unwrap();
    pacing_cli(dir.path())
        .args(["projections", "--start", "2023-11-01", "--end", "2023-11-30"])
        .assert()
        .failure()
        .stderr(contains("missing --book"));
}
