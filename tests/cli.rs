use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::{fs, process::Command};
use tempfile::tempdir;

fn cli() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("epcis-testdata-flow"));
    cmd.env_remove("API_URL").env("RUST_LOG", "off");
    cmd
}

#[test]
fn template_prints_json() {
    let output = cli()
        .arg("template")
        .arg("fixtures/simple.json")
        .arg("--utc-offset=+02:00")
        .output()
        .unwrap();
    assert!(output.status.success());

    let template: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(template["events"][0]["nodeId"], 1);
    assert_eq!(
        template["events"][0]["eventTime"]["timeZoneOffset"],
        "+02:00"
    );
    assert_eq!(template["identifiers"][0]["identifierId"], 2);
}

#[test]
fn template_writes_out_file() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("template.json");

    cli()
        .arg("template")
        .arg("fixtures/chain.json")
        .arg("--out")
        .arg(&out)
        .arg("--utc-offset=-05:00")
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("wrote"));

    let template: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(template["events"].as_array().unwrap().len(), 2);
    assert_eq!(
        template["events"][1]["parentReferencedIdentifier"]["identifierId"],
        4
    );
}

#[test]
fn check_passes_balanced_design() {
    cli()
        .arg("check")
        .arg("fixtures/chain.json")
        .assert()
        .success()
        .stdout(predicate::str::contains("OK  fixtures/chain.json"));
}

#[test]
fn check_fails_on_violation() {
    cli()
        .arg("check")
        .arg("fixtures/violation.json")
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "inheritance: Instance Identifiers on ObjectEvent 2",
        ))
        .stderr(predicate::str::contains("1 violation(s)"));
}

#[test]
fn check_json_reports_schema_errors() {
    let output = cli()
        .arg("check")
        .arg("fixtures/invalid_schema.json")
        .arg("--json")
        .output()
        .unwrap();
    assert!(!output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["ok"], false);
    assert_eq!(report["errors"][0]["json_pointer"], "/connectors/0");
    assert_eq!(
        report["errors"][0]["source_path"],
        "fixtures/invalid_schema.json"
    );
}

#[test]
fn check_lists_resolver_warnings() {
    cli()
        .arg("check")
        .arg("fixtures/missing_connector.json")
        .assert()
        .success()
        .stdout(predicate::str::contains("WARN missing_connector"));
}

#[test]
fn weighted_flag_changes_parent_count() {
    let dir = tempdir().unwrap();
    let design = dir.path().join("design.json");
    let mut doc: Value =
        serde_json::from_str(&fs::read_to_string("fixtures/chain.json").unwrap()).unwrap();
    doc["events"][0]["eventCount"] = 6.into();
    fs::write(&design, serde_json::to_string(&doc).unwrap()).unwrap();

    let output = cli()
        .arg("--weighted-parent-count")
        .arg("template")
        .arg(&design)
        .output()
        .unwrap();
    assert!(output.status.success());
    let template: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        template["events"][1]["parentReferencedIdentifier"]["parentCount"],
        6
    );
}

#[test]
fn generate_requires_a_service_url() {
    cli()
        .arg("generate")
        .arg("fixtures/simple.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--api-url"));
}

#[test]
fn generate_reports_unreachable_service() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    cli()
        .env("API_URL", format!("http://{addr}"))
        .arg("generate")
        .arg("fixtures/simple.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Unable to reach the generation service",
        ));
}

#[test]
fn missing_file_is_reported() {
    cli()
        .arg("template")
        .arg("fixtures/nope.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read fixtures/nope.json"));
}
