use epcis_testdata_flow::{
    event::EventType,
    load_design_from_path, load_design_from_str,
};
use pretty_assertions::assert_eq;
use std::path::Path;

#[test]
fn loads_plain_node_map() {
    let doc = load_design_from_path(Path::new("fixtures/simple.json")).unwrap();

    assert_eq!(doc.diagram.nodes.len(), 2);
    let event = &doc.diagram.nodes["1"];
    assert_eq!(event.name, "Events");
    assert_eq!(event.data.event_type.as_deref(), Some("ObjectEvent"));
    assert_eq!(doc.connectors.len(), 1);
    assert_eq!(doc.connectors[0].epc_count, 2);
    assert_eq!(doc.events[0].node_id, 1);
    assert_eq!(doc.identifiers[0].identifiers_id, 2);
}

#[test]
fn unwraps_editor_export_and_reads_yaml() {
    let doc = load_design_from_path(Path::new("fixtures/drawflow.yaml")).unwrap();

    let ids: Vec<u32> = doc.diagram.nodes.values().map(|n| n.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(doc.diagram.nodes["1"].data.form_id, Some(1));
    // Form inputs arrive as strings; blanks count as nothing.
    assert_eq!(doc.connectors[0].source, 2);
    assert_eq!(doc.connectors[0].epc_count, 3);
    assert_eq!(doc.connectors[0].class_count, 0);
    assert_eq!(doc.events[0].event_count, 2);
}

#[test]
fn sections_default_when_absent() {
    let doc = load_design_from_str(
        r#"{"diagram": {"5": {"id": "5", "name": "Events", "data": {"eventType": "TransactionEvent"}}}}"#,
    )
    .unwrap();
    assert!(doc.connectors.is_empty());
    assert!(doc.events.is_empty());
    assert!(doc.identifiers.is_empty());
    assert_eq!(
        doc.diagram.nodes["5"]
            .data
            .event_type
            .as_deref()
            .map(|t| t.parse::<EventType>().unwrap()),
        Some(EventType::TransactionEvent)
    );
}
