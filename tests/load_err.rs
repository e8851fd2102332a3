use epcis_testdata_flow::{
    BuildOptions, build_template, error::DesignError, json_output::design_error_to_reports,
    load_design_from_path, load_design_from_str,
};
use std::path::Path;

#[test]
fn schema_errors_carry_json_pointers() {
    let err = load_design_from_path(Path::new("fixtures/invalid_schema.json")).unwrap_err();
    let DesignError::Schema { details, .. } = &err else {
        panic!("expected schema error, got {err}");
    };
    assert!(
        details
            .iter()
            .any(|d| d.location.json_pointer.as_deref() == Some("/connectors/0")),
        "{details:?}"
    );
    assert!(err.to_string().contains("target"));

    let reports = design_error_to_reports(err);
    assert!(!reports.is_empty());
    assert!(reports.iter().all(|r| r.json_pointer.is_some()));
}

#[test]
fn broken_yaml_is_a_parse_error_labelled_with_the_file() {
    let err = load_design_from_path(Path::new("fixtures/broken.yaml")).unwrap_err();
    assert!(matches!(err, DesignError::Parse { .. }), "{err}");
    assert_eq!(
        err.location().source_path.as_deref(),
        Some(Path::new("fixtures/broken.yaml"))
    );
}

#[test]
fn missing_diagram_is_rejected() {
    let err = load_design_from_str(r#"{"connectors": []}"#).unwrap_err();
    assert!(matches!(err, DesignError::Schema { .. }), "{err}");
}

#[test]
fn unknown_node_kind_fails_the_build() {
    let doc = load_design_from_str(
        r#"{"diagram": {"1": {"id": 1, "name": "Comment", "data": {}}}}"#,
    )
    .unwrap();
    let err = build_template(&doc, &BuildOptions::default()).unwrap_err();
    assert!(matches!(err, DesignError::UnknownNodeKind { .. }), "{err}");
}

const TWO_EVENTS_WITH_A_STRAY_LINK: &str = r#"{
  "diagram": {
    "1": {"id": 1, "name": "Events", "data": {"ID": 1, "eventType": "ObjectEvent"},
          "outputs": {"output_1": {"connections": [{"node": "99", "output": "input_1"}]}}},
    "2": {"id": 2, "name": "Events", "data": {"ID": 2, "eventType": "ObjectEvent"}}
  },
  "events": [
    {"nodeId": 1, "event": {"eventTime": "2024-03-01T10:00", "action": "ADD"}},
    {"nodeId": 2, "event": {"eventTime": "2024-03-01T11:00", "action": "OBSERVE"}}
  ]
}"#;

#[test]
fn dangling_connection_is_dropped_with_a_warning() {
    let doc = load_design_from_str(TWO_EVENTS_WITH_A_STRAY_LINK).unwrap();
    let build = build_template(&doc, &BuildOptions::default()).unwrap();

    let ids: Vec<u32> = build
        .bundle
        .template
        .events
        .iter()
        .map(|e| e.event_id)
        .collect();
    assert_eq!(ids, vec![1, 2]);
    assert!(build.node_errors.is_empty());
    let warning = build
        .warnings
        .iter()
        .find(|w| w.code == "missing_node")
        .expect("missing_node warning");
    assert_eq!(warning.node_id, Some(1));
    assert!(warning.message.contains("99"), "{warning}");
}

#[test]
fn unknown_event_type_only_drops_its_node() {
    let text = TWO_EVENTS_WITH_A_STRAY_LINK.replacen(
        r#""ID": 2, "eventType": "ObjectEvent""#,
        r#""ID": 2, "eventType": "ShippingEvent""#,
        1,
    );
    let doc = load_design_from_str(&text).unwrap();
    let build = build_template(&doc, &BuildOptions::default()).unwrap();

    assert_eq!(build.bundle.template.events.len(), 1);
    assert_eq!(build.bundle.template.events[0].event_id, 1);
    assert_eq!(build.node_errors.len(), 1);
    let err = &build.node_errors[0];
    assert!(matches!(err, DesignError::UnknownEventType { .. }), "{err}");
    assert_eq!(err.location().path.as_deref(), Some("diagram.2.data.eventType"));
    assert!(!build.is_clean());
}

#[test]
fn repeated_node_id_fails_the_build() {
    let doc = load_design_from_str(
        r#"{"diagram": {
              "1": {"id": 1, "name": "Identifiers"},
              "2": {"id": 1, "name": "Identifiers"}}}"#,
    )
    .unwrap();
    let err = build_template(&doc, &BuildOptions::default()).unwrap_err();
    assert!(matches!(err, DesignError::DuplicateNode { node_id: 1, .. }), "{err}");
    let reports = design_error_to_reports(err);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].source_path.as_deref(), Some("diagram.2"));
}

#[test]
fn duplicate_connector_rows_are_rejected() {
    let doc = load_design_from_path(Path::new("fixtures/duplicate_connector.json")).unwrap();
    let err = build_template(&doc, &BuildOptions::default()).unwrap_err();
    let DesignError::DuplicateConnector {
        source_id,
        target_id,
        location,
    } = err
    else {
        panic!("expected duplicate connector error");
    };
    assert_eq!((source_id, target_id), (2, 1));
    assert_eq!(location.json_pointer.as_deref(), Some("/connectors/1"));
}

#[test]
fn a_bad_timestamp_only_drops_its_event() {
    let doc = load_design_from_path(Path::new("fixtures/bad_timestamp.json")).unwrap();
    let build = build_template(&doc, &BuildOptions::default()).unwrap();

    assert_eq!(build.bundle.template.events.len(), 1);
    assert_eq!(build.bundle.template.events[0].event_id, 1);
    assert_eq!(build.node_errors.len(), 1);
    let err = &build.node_errors[0];
    assert!(matches!(err, DesignError::MalformedTimestamp { .. }), "{err}");
    assert!(err.to_string().contains("events[1].event.eventTime"), "{err}");
    assert!(!build.is_clean());
}
