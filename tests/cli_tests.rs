#![cfg(feature = "cli_api")]

use std::io::Write;

use assert_cmd::Command;
use predicates::str::contains as str_contains;
use tempfile::{Builder, NamedTempFile};

const TEMPLATE_JSON: &str = r#"{
    "id": "filing",
    "name": "Annual filing",
    "steps": [
        { "id": "step1", "sequence": 1, "anchor": { "kind": "goal_date" }, "offset_days": -10 },
        { "id": "step2", "sequence": 2, "anchor": { "kind": "previous_step" }, "offset_days": 3 },
        { "id": "step3", "sequence": 3, "anchor": { "kind": "previous_step" }, "offset_days": 2 }
    ]
}"#;

#[allow(deprecated)]
fn run_cli(script: &str) -> assert_cmd::assert::Assert {
    let mut cmd = Command::cargo_bin("cli").expect("cli binary");
    cmd.env_remove("CASE_SCHEDULE_CONFIG")
        .write_stdin(script.to_string())
        .assert()
}

fn template_file() -> NamedTempFile {
    let mut file = Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(TEMPLATE_JSON.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn script_path(file: &NamedTempFile) -> String {
    file.path().to_string_lossy().replace('\\', "\\\\")
}

#[test]
fn cli_reports_unknown_commands() {
    run_cli("frobnicate\nquit\n")
        .success()
        .stdout(str_contains("Unknown command. Type 'help'."));
}

#[test]
fn cli_computes_schedule_from_template_file() {
    let template = template_file();
    let script = format!(
        "template load {}\nschedule filing 2025-12-31\nquit\n",
        script_path(&template)
    );
    run_cli(&script)
        .success()
        .stdout(str_contains("Template filing registered (3 steps)."))
        .stdout(str_contains("2025-12-17"))
        .stdout(str_contains("2025-12-22"))
        .stdout(str_contains("2025-12-24"));
}

#[test]
fn cli_replan_keeps_locked_step() {
    let template = template_file();
    let script = format!(
        "template load {}\ncase create c1 filing 2025-12-31\nlock c1 step2\npreview c1 2026-01-15\napply c1 2026-01-15\nshow c1\nquit\n",
        script_path(&template)
    );
    let assert = run_cli(&script).success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(output.contains("Case c1 created."));
    assert!(output.contains("Step step2 locked (due 2025-12-22)."));
    assert!(output.contains("Replan would change: 2 step(s)."));
    assert!(output.contains("Replan applied: 2 step(s)."));
    let after_show = output.split("Case c1 (template filing").last().unwrap_or_default();
    assert!(after_show.contains("2026-01-01"));
    assert!(after_show.contains("2025-12-22"));
    assert!(after_show.contains("2026-01-08"));
}

#[test]
fn cli_holidays_shift_due_dates() {
    let template = template_file();
    let script = format!(
        "holiday add 2025-12-17\nholiday list\ntemplate load {}\nschedule filing 2025-12-31\nquit\n",
        script_path(&template)
    );
    run_cli(&script)
        .success()
        .stdout(str_contains("Holiday 2025-12-17 added."))
        .stdout(str_contains("2025-12-16"));
}

#[test]
fn cli_rejects_cyclic_template() {
    let mut file = Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(
        br#"{ "id": "loop", "steps": [
            { "id": "a", "sequence": 1, "anchor": { "kind": "explicit_dependencies", "depends_on": ["b"] }, "offset_days": 1 },
            { "id": "b", "sequence": 2, "anchor": { "kind": "explicit_dependencies", "depends_on": ["a"] }, "offset_days": 1 }
        ] }"#,
    )
    .unwrap();
    file.flush().unwrap();
    let script = format!("template load {}\nquit\n", script_path(&file));
    run_cli(&script)
        .success()
        .stdout(str_contains("Error: cyclic dependency between steps a, b"));
}

#[test]
fn cli_unknown_case_is_reported() {
    run_cli("preview missing 2026-01-15\nquit\n")
        .success()
        .stdout(str_contains("Error: case missing not found"));
}
