use epcis_testdata_flow::{
    Build, BuildOptions, build_template,
    event::{EventRecord, ParentReference},
    load_design_from_path, load_design_from_str,
    resolve::{ParentCountPolicy, ResolveOptions},
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::path::Path;

fn build_fixture(name: &str, options: &BuildOptions) -> Build {
    let doc = load_design_from_path(&Path::new("fixtures").join(name)).unwrap();
    build_template(&doc, options).unwrap()
}

fn event(build: &Build, id: u32) -> &EventRecord {
    build
        .bundle
        .template
        .events
        .iter()
        .find(|e| e.event_id == id)
        .unwrap()
}

fn supply_json(record: &EventRecord) -> Value {
    serde_json::to_value(&record.referenced_identifier).unwrap()
}

#[test]
fn identifier_supply_comes_from_the_connector() {
    let build = build_fixture("simple.json", &BuildOptions::default());

    assert_eq!(
        supply_json(event(&build, 1)),
        json!([{"identifierId": 2, "epcCount": 2, "classCount": 0, "inheritParentCount": 0, "quantity": 0}])
    );
    assert!(build.violations.is_empty());
    assert!(build.warnings.is_empty(), "{:?}", build.warnings);
}

#[test]
fn chained_events_inherit_from_their_parent() {
    let build = build_fixture("chain.json", &BuildOptions::default());

    let child = event(&build, 2);
    assert_eq!(
        supply_json(child),
        json!([{"parentNodeId": 1, "epcCount": 4, "classCount": 0, "inheritParentCount": 1, "quantity": 0}])
    );
    assert_eq!(
        child.parent_referenced_identifier,
        Some(ParentReference {
            identifier_id: 4,
            parent_count: 1
        })
    );
    assert!(build.violations.is_empty(), "{:?}", build.violations);
}

#[test]
fn resolution_is_deterministic() {
    let first = build_fixture("diamond.json", &BuildOptions::default());
    let second = build_fixture("diamond.json", &BuildOptions::default());

    assert_eq!(first.bundle.hash_blake3, second.bundle.hash_blake3);
    for (a, b) in first
        .bundle
        .template
        .events
        .iter()
        .zip(&second.bundle.template.events)
    {
        assert_eq!(a.referenced_identifier, b.referenced_identifier);
    }
}

#[test]
fn an_ancestor_is_listed_once_however_many_links_lead_from_it() {
    let build = build_fixture("diamond.json", &BuildOptions::default());

    let parents: Vec<Option<u32>> = event(&build, 4)
        .referenced_identifier
        .iter()
        .map(|r| r.parent_node_id())
        .collect();
    assert_eq!(parents, vec![Some(2), Some(3)]);
    assert!(build.violations.is_empty(), "{:?}", build.violations);
}

#[test]
fn transformation_legs_stay_separate() {
    let build = build_fixture("transformation.json", &BuildOptions::default());

    let transformation = event(&build, 1);
    assert_eq!(
        supply_json(transformation),
        json!([{"identifierId": 2, "epcCount": 3, "classCount": 0, "inheritParentCount": 0, "quantity": 0}])
    );
    assert_eq!(
        serde_json::to_value(&transformation.output_referenced_identifier).unwrap(),
        json!([{"identifierId": 3, "epcCount": 2, "classCount": 0, "inheritParentCount": 0, "quantity": 0}])
    );
    // The downstream event inherits from the output leg.
    assert_eq!(
        supply_json(event(&build, 4)),
        json!([{"parentNodeId": 1, "epcCount": 2, "classCount": 0, "inheritParentCount": 0, "quantity": 0}])
    );
    assert!(build.violations.is_empty(), "{:?}", build.violations);
}

#[test]
fn missing_connectors_fall_back_or_skip_with_warnings() {
    let build = build_fixture("missing_connector.json", &BuildOptions::default());

    assert_eq!(
        supply_json(event(&build, 1)),
        json!([{"identifierId": 3, "epcCount": 7, "classCount": 0}])
    );
    assert!(event(&build, 2).referenced_identifier.is_empty());
    let codes: Vec<&str> = build.warnings.iter().map(|w| w.code).collect();
    assert_eq!(codes, vec!["missing_connector", "missing_connector"]);
    assert_eq!(build.warnings[0].node_id, Some(1));
    assert_eq!(build.warnings[1].node_id, Some(2));
}

#[test]
fn weighted_parent_count_uses_upstream_events() {
    let options = BuildOptions {
        resolve: ResolveOptions {
            parent_count: ParentCountPolicy::WeightedByAncestry,
        },
        ..BuildOptions::default()
    };
    let doc = load_design_from_str(
        r#"{
          "diagram": {
            "1": {"id": 1, "name": "Events", "data": {"eventType": "ObjectEvent"},
                  "outputs": {"output_1": {"connections": [{"node": 3, "output": "input_1"}]}}},
            "2": {"id": 2, "name": "Events", "data": {"eventType": "ObjectEvent"},
                  "outputs": {"output_1": {"connections": [{"node": 3, "output": "input_1"}]}}},
            "3": {"id": 3, "name": "Events", "data": {"eventType": "AggregationEvent"}},
            "4": {"id": 4, "name": "ParentIdentifiers",
                  "outputs": {"output_1": {"connections": [{"node": 3, "output": "input_1"}]}}}
          },
          "connectors": [
            {"source": 1, "target": 3, "epcCount": 1},
            {"source": 2, "target": 3, "epcCount": 1},
            {"source": 4, "target": 3}
          ],
          "events": [
            {"nodeId": 1, "eventCount": 4, "event": {"eventTime": "2024-01-01T09:00"}},
            {"nodeId": 2, "eventCount": 2, "event": {"eventTime": "2024-01-01T09:00"}},
            {"nodeId": 3, "eventCount": 3, "event": {"eventTime": "2024-01-01T10:00"}}
          ],
          "identifiers": [
            {"identifiersId": 4, "parentData": {"identifierType": "sscc", "serialType": "none"}}
          ]
        }"#,
    )
    .unwrap();

    let own = build_template(&doc, &BuildOptions::default()).unwrap();
    assert_eq!(
        event(&own, 3).parent_referenced_identifier.map(|p| p.parent_count),
        Some(3)
    );
    // 3 × (4 + 2) / 2 upstream events
    let weighted = build_template(&doc, &options).unwrap();
    assert_eq!(
        event(&weighted, 3).parent_referenced_identifier.map(|p| p.parent_count),
        Some(9)
    );
}

#[test]
fn parent_identifiers_are_ignored_on_object_events() {
    let doc = load_design_from_str(
        r#"{
          "diagram": {
            "1": {"id": 1, "name": "Events", "data": {"eventType": "ObjectEvent"}},
            "2": {"id": 2, "name": "ParentIdentifiers",
                  "outputs": {"output_1": {"connections": [{"node": 1, "output": "input_1"}]}}}
          },
          "events": [{"nodeId": 1, "event": {"eventTime": "2024-01-01T10:00"}}],
          "identifiers": [{"identifiersId": 2, "parentData": {"identifierType": "sscc", "serialType": "none"}}]
        }"#,
    )
    .unwrap();
    let build = build_template(&doc, &BuildOptions::default()).unwrap();

    assert_eq!(event(&build, 1).parent_referenced_identifier, None);
    assert_eq!(build.warnings.len(), 1);
    assert_eq!(build.warnings[0].code, "parent_identifier_ignored");
}

#[test]
fn children_see_supply_inherited_by_a_higher_numbered_parent() {
    // 5 -> 2 -> 1: the middle event has the highest id.
    let doc = load_design_from_str(
        r#"{
          "diagram": {
            "1": {"id": 1, "name": "Events", "data": {"eventType": "ObjectEvent"}},
            "2": {"id": 2, "name": "Events", "data": {"eventType": "ObjectEvent"},
                  "outputs": {"output_1": {"connections": [{"node": 1, "output": "input_1"}]}}},
            "5": {"id": 5, "name": "Events", "data": {"eventType": "ObjectEvent"},
                  "outputs": {"output_1": {"connections": [{"node": 2, "output": "input_1"}]}}},
            "9": {"id": 9, "name": "Identifiers",
                  "outputs": {"output_1": {"connections": [{"node": 5, "output": "input_1"}]}}}
          },
          "connectors": [
            {"source": 9, "target": 5, "epcCount": 3},
            {"source": 5, "target": 2, "epcCount": 3},
            {"source": 2, "target": 1, "epcCount": 3}
          ],
          "events": [
            {"nodeId": 1, "event": {"eventTime": "2024-01-01T12:00"}},
            {"nodeId": 2, "event": {"eventTime": "2024-01-01T11:00"}},
            {"nodeId": 5, "event": {"eventTime": "2024-01-01T10:00"}}
          ],
          "identifiers": [{"identifiersId": 9, "instanceData": {"identifierType": "sgtin", "serialType": "range", "count": 3}}]
        }"#,
    )
    .unwrap();
    let build = build_template(&doc, &BuildOptions::default()).unwrap();

    assert_eq!(
        event(&build, 1)
            .referenced_identifier
            .iter()
            .map(|r| r.parent_node_id())
            .collect::<Vec<_>>(),
        vec![Some(2)]
    );
    assert!(build.warnings.is_empty(), "{:?}", build.warnings);
}
