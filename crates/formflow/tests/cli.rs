use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

fn formflow() -> Command {
    Command::cargo_bin("formflow").expect("formflow binary")
}

fn write_json(dir: &TempDir, name: &str, value: &Value) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, serde_json::to_string_pretty(value).expect("json")).expect("write fixture");
    path
}

fn tier_form() -> Value {
    json!({
        "id": "plans",
        "pages": [
            {
                "id": "start",
                "fields": [
                    { "id": "tier", "type": "radio", "required": true, "variableName": "tier" },
                    {
                        "id": "seats",
                        "type": "number",
                        "conditionalVisibility": {
                            "enabled": true,
                            "dependsOn": "tier",
                            "condition": "not_equals",
                            "value": "basic"
                        }
                    }
                ]
            },
            {
                "id": "premium",
                "fields": [],
                "conditionalVisibility": {
                    "enabled": true,
                    "conditions": [{ "dependsOn": "tier", "condition": "equals", "value": "premium" }],
                    "logic": "AND"
                }
            },
            { "id": "finish", "fields": [] }
        ]
    })
}

fn stdout_json(command: &mut Command) -> Value {
    let output = command.output().expect("run formflow");
    assert!(
        output.status.success(),
        "formflow failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json output")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

#[test]
fn check_accepts_acyclic_form() {
    let dir = TempDir::new().expect("tempdir");
    let form = write_json(&dir, "form.json", &tier_form());
    formflow()
        .args(["check", path_arg(&form)])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "plans: 1 field condition(s), 1 page group(s), 0 button rule(s)",
        ));
}

#[test]
fn check_fails_on_cycles() {
    let dir = TempDir::new().expect("tempdir");
    let form = write_json(
        &dir,
        "cycle.json",
        &json!({
            "id": "loop",
            "pages": [{
                "id": "p1",
                "fields": [
                    {
                        "id": "a",
                        "conditionalVisibility": { "enabled": true, "dependsOn": "b", "condition": "is_not_empty" }
                    },
                    {
                        "id": "b",
                        "conditionalVisibility": { "enabled": true, "dependsOn": "a", "condition": "is_not_empty" }
                    }
                ]
            }]
        }),
    );
    formflow()
        .args(["check", path_arg(&form)])
        .assert()
        .failure()
        .stdout(predicate::str::contains("error: circular dependency detected for field 'a'"))
        .stderr(predicate::str::contains("2 field(s) in circular dependencies"));
}

#[test]
fn check_json_reports_dangling_warnings() {
    let dir = TempDir::new().expect("tempdir");
    let form = write_json(
        &dir,
        "dangling.json",
        &json!({
            "id": "dangling",
            "pages": [{
                "id": "p1",
                "fields": [{
                    "id": "notes",
                    "conditionalVisibility": { "enabled": true, "dependsOn": "ghost", "condition": "is_empty" }
                }]
            }]
        }),
    );
    let report = stdout_json(formflow().args(["check", path_arg(&form), "--json"]));
    assert_eq!(report["valid"], true);
    assert_eq!(report["errors"][0]["kind"], "dangling");
    assert_eq!(report["errors"][0]["depends_on"], "ghost");
}

#[test]
fn evaluate_applies_variables() {
    let dir = TempDir::new().expect("tempdir");
    let form = write_json(&dir, "form.json", &tier_form());
    let vars = write_json(&dir, "vars.json", &json!({ "tier": "premium" }));
    let snapshot = stdout_json(formflow().args([
        "evaluate",
        path_arg(&form),
        "--vars",
        path_arg(&vars),
    ]));
    assert_eq!(snapshot["fields"]["seats"], true);
    assert_eq!(snapshot["pages"]["premium"], true);
    assert_eq!(snapshot["buttons"]["next"], true);
}

#[test]
fn evaluate_without_variables_hides_conditioned_page() {
    let dir = TempDir::new().expect("tempdir");
    let form = write_json(&dir, "form.json", &tier_form());
    let snapshot = stdout_json(formflow().args(["evaluate", path_arg(&form)]));
    assert_eq!(snapshot["pages"]["premium"], false);
    assert_eq!(snapshot["pages"]["finish"], true);
}

#[test]
fn simulate_replays_navigation() {
    let dir = TempDir::new().expect("tempdir");
    let form = write_json(&dir, "form.json", &tier_form());
    let script = write_json(
        &dir,
        "steps.json",
        &json!([
            { "step": "next" },
            { "step": "input", "field": "tier", "value": "basic" },
            { "step": "next" },
            { "step": "next" },
            { "step": "previous" }
        ]),
    );
    let report = stdout_json(formflow().args([
        "simulate",
        path_arg(&form),
        "--script",
        path_arg(&script),
    ]));
    let trace = report["trace"].as_array().expect("trace");
    assert_eq!(trace[0]["transition"]["outcome"], "blocked");
    assert_eq!(trace[0]["transition"]["errors"][0]["code"], "required");
    assert!(trace[1].get("transition").is_none());
    assert_eq!(trace[2]["transition"], json!({ "outcome": "moved", "from": 0, "to": 2 }));
    assert_eq!(trace[3]["transition"]["outcome"], "reached_end");
    assert_eq!(trace[4]["page_index"], 0);
    assert_eq!(report["final"]["fields"]["seats"], false);
}

#[test]
fn export_writes_conditions_file() {
    let dir = TempDir::new().expect("tempdir");
    let form = write_json(&dir, "form.json", &tier_form());
    let out = dir.path().join("conditions.json");
    formflow()
        .args(["export", path_arg(&form), "--out", path_arg(&out)])
        .assert()
        .success();
    let conditions: Value =
        serde_json::from_str(&fs::read_to_string(&out).expect("read export")).expect("json");
    assert_eq!(conditions["fieldConditions"][0]["fieldId"], "seats");
    assert_eq!(conditions["pageConditions"][0]["pageIndex"], 1);
}

#[test]
fn schema_describes_form_definition() {
    formflow()
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("FormDefinition"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let form = write_json(&dir, "form.json", &tier_form());
    let config = dir.path().join("formflow.toml");
    fs::write(&config, "max_reentrant_passes = 0\n").expect("write config");
    formflow()
        .args(["--config", path_arg(&config), "check", path_arg(&form)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_reentrant_passes"));
}

#[test]
fn missing_form_is_reported() {
    formflow()
        .args(["check", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read form"));
}
