use epcis_testdata_flow::{
    BuildOptions, build_template,
    json_output::CheckJsonOutput,
    lint::{ViolationKind, lint_builtin_rules},
    load_design_from_path,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::Path;

#[test]
fn child_demanding_more_than_parent_supplies_is_reported() {
    let doc = load_design_from_path(Path::new("fixtures/violation.json")).unwrap();
    let build = build_template(&doc, &BuildOptions::default()).unwrap();

    assert_eq!(build.violations.len(), 1);
    let violation = &build.violations[0];
    assert_eq!(violation.kind, ViolationKind::Instance);
    assert_eq!(violation.event_id, 2);
    assert_eq!((violation.supplied, violation.demanded), (5, 6));
    assert_eq!(violation.business_step.as_deref(), Some("SHIPPING"));
    assert_eq!(
        violation.message,
        "Child node/event is inheriting more EPC identifiers than available in Parent node/event."
    );
    // Violations never hold the template back.
    assert_eq!(build.bundle.template.events.len(), 2);
}

#[test]
fn builtin_rules_render_findings() {
    let doc = load_design_from_path(Path::new("fixtures/violation.json")).unwrap();
    let build = build_template(&doc, &BuildOptions::default()).unwrap();

    let findings = lint_builtin_rules(&build.bundle.template.events);
    assert_eq!(findings.len(), 1);
    assert!(findings[0].starts_with("inheritance: Instance Identifiers on ObjectEvent 2"));
    assert!(findings[0].contains("supplied 5, demanded 6"));
}

#[test]
fn json_report_lists_violations() {
    let doc = load_design_from_path(Path::new("fixtures/violation.json")).unwrap();
    let build = build_template(&doc, &BuildOptions::default()).unwrap();
    let report: serde_json::Value =
        serde_json::from_str(&CheckJsonOutput::from_build(&build).into_string()).unwrap();

    assert_eq!(report["ok"], json!(false));
    assert_eq!(report["violations"][0]["kind"], json!("Instance"));
    assert_eq!(report["violations"][0]["eventId"], json!(2));
    assert_eq!(report["violations"][0]["supplied"], json!(5));
    assert_eq!(report["violations"][0]["demanded"], json!(6));
    assert!(report.get("errors").is_none());
}

#[test]
fn balanced_chain_passes() {
    let doc = load_design_from_path(Path::new("fixtures/chain.json")).unwrap();
    let build = build_template(&doc, &BuildOptions::default()).unwrap();
    assert!(build.is_clean(), "{:?}", build.violations);
}
