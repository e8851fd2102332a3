use std::{collections::BTreeMap, fmt};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    connector::{ConnectorInfo, ConnectorLedger},
    diagram::{Connection, DiagramModel, DiagramNode, InputPort, NodeId, NodeKind},
    event::{EventRecord, EventType, ParentReference, ReferencedIdentifier, SupplySource},
    identifier::IdentifierRecord,
};

/// How `parentReferencedIdentifier.parentCount` is derived for a parent identifier group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParentCountPolicy {
    /// The target event's own `eventCount`.
    #[default]
    OwnEventCount,
    /// `eventCount × Σ upstream eventCount / upstream event nodes`.
    WeightedByAncestry,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    pub parent_count: ParentCountPolicy,
}

/// A non-fatal problem found while walking the diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveWarning {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
}

impl ResolveWarning {
    fn new(code: &'static str, node_id: NodeId, message: String) -> Self {
        warn!(code, node = node_id, "{message}");
        ResolveWarning {
            code,
            message,
            node_id: Some(node_id),
        }
    }
}

impl fmt::Display for ResolveWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Additions the resolver makes to one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
    pub referenced_identifier: Vec<ReferencedIdentifier>,
    pub output_referenced_identifier: Vec<ReferencedIdentifier>,
    pub parent_referenced_identifier: Option<ParentReference>,
}

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub overlay: BTreeMap<NodeId, EventPatch>,
    pub warnings: Vec<ResolveWarning>,
}

impl Resolution {
    /// Fresh records with the overlay merged in; the inputs are left untouched.
    pub fn apply<'a, I>(&self, records: I) -> Vec<EventRecord>
    where
        I: IntoIterator<Item = &'a EventRecord>,
    {
        records
            .into_iter()
            .map(|record| {
                let mut merged = record.clone();
                if let Some(patch) = self.overlay.get(&record.event_id) {
                    merged
                        .referenced_identifier
                        .extend(patch.referenced_identifier.iter().cloned());
                    merged
                        .output_referenced_identifier
                        .extend(patch.output_referenced_identifier.iter().cloned());
                    if patch.parent_referenced_identifier.is_some() {
                        merged.parent_referenced_identifier = patch.parent_referenced_identifier;
                    }
                }
                merged
            })
            .collect()
    }
}

struct Resolver<'a> {
    diagram: &'a DiagramModel,
    connectors: &'a ConnectorLedger,
    events: &'a BTreeMap<NodeId, EventRecord>,
    identifiers: &'a BTreeMap<NodeId, IdentifierRecord>,
    options: &'a ResolveOptions,
    out: Resolution,
}

/// Attach identifier supply and ancestry to the events of `diagram`.
///
/// `events` and `identifiers` are keyed by diagram node id. Identifier supply is attached
/// first, then parent identifier groups, then supply is propagated along Event→Event
/// edges, parents before children.
pub fn resolve(
    diagram: &DiagramModel,
    connectors: &ConnectorLedger,
    events: &BTreeMap<NodeId, EventRecord>,
    identifiers: &BTreeMap<NodeId, IdentifierRecord>,
    options: &ResolveOptions,
) -> Resolution {
    let mut resolver = Resolver {
        diagram,
        connectors,
        events,
        identifiers,
        options,
        out: Resolution::default(),
    };
    resolver.report_unresolved();
    resolver.attach_identifiers();
    resolver.attach_parent_identifiers();
    resolver.propagate_ancestry();
    info!(
        events = events.len(),
        patched = resolver.out.overlay.len(),
        warnings = resolver.out.warnings.len(),
        "resolved design"
    );
    resolver.out
}

impl Resolver<'_> {
    fn report_unresolved(&mut self) {
        for link in self.diagram.dangling_links() {
            self.out.warnings.push(ResolveWarning::new(
                "missing_node",
                link.node,
                format!(
                    "connection {}.{} points at node {}, which is not on the diagram; link ignored",
                    link.node, link.port, link.peer
                ),
            ));
        }
        for node in self.diagram.nodes() {
            match node.kind {
                NodeKind::Event if !self.events.contains_key(&node.id) => {
                    self.out.warnings.push(ResolveWarning::new(
                        "event_without_form",
                        node.id,
                        format!("event node {} has no event form and is skipped", node.id),
                    ));
                }
                NodeKind::Identifier | NodeKind::ParentIdentifier
                    if !self.identifiers.contains_key(&node.id) =>
                {
                    self.out.warnings.push(ResolveWarning::new(
                        "identifier_without_form",
                        node.id,
                        format!("identifier node {} has no identifier form and is skipped", node.id),
                    ));
                }
                _ => {}
            }
        }
    }

    /// Event targets of `node`'s outgoing connections that carry an event record.
    fn event_targets<'s, 'n>(
        &'s self,
        node: &'n DiagramNode,
    ) -> impl Iterator<Item = (&'n Connection, &'s EventRecord)> {
        node.outputs.iter().filter_map(move |conn| {
            let target = self.diagram.node(conn.peer)?;
            if target.kind != NodeKind::Event {
                debug!(source = node.id, target = conn.peer, "ignoring link to non-event node");
                return None;
            }
            self.events.get(&conn.peer).map(|record| (conn, record))
        })
    }

    fn attach_identifiers(&mut self) {
        for node in self.diagram.nodes_of_kind(NodeKind::Identifier) {
            let Some(identifier) = self.identifiers.get(&node.id) else {
                continue;
            };
            let mut attached = Vec::new();
            let mut warnings = Vec::new();
            for (conn, target) in self.event_targets(node) {
                let reference = match self.connectors.get(node.id, target.event_id) {
                    Some(info) => from_connector(SupplySource::Identifier(node.id), info),
                    None => {
                        let (epc_count, class_count) = identifier.recipe_counts();
                        warnings.push(ResolveWarning::new(
                            "missing_connector",
                            target.event_id,
                            format!(
                                "no connector info for {} -> {}; using the identifier recipe counts ({epc_count} instances, {class_count} classes)",
                                node.id, target.event_id
                            ),
                        ));
                        ReferencedIdentifier {
                            source: SupplySource::Identifier(node.id),
                            epc_count,
                            class_count,
                            inherit_parent_count: None,
                            quantity: None,
                        }
                    }
                };
                attached.push((target.event_id, target.event_type, conn.target_port(), reference));
            }
            self.out.warnings.extend(warnings);

            for (target_id, event_type, port, reference) in attached {
                let patch = self.out.overlay.entry(target_id).or_default();
                match (event_type, port) {
                    (EventType::TransformationEvent, InputPort::First) => {
                        patch.referenced_identifier.push(reference);
                    }
                    (EventType::TransformationEvent, InputPort::Second) => {
                        patch.output_referenced_identifier.push(reference);
                    }
                    (EventType::TransformationEvent, InputPort::Other(port)) => {
                        self.out.warnings.push(ResolveWarning::new(
                            "unknown_port",
                            target_id,
                            format!(
                                "identifier {} enters transformation event {target_id} on unknown port '{port}'",
                                node.id
                            ),
                        ));
                    }
                    (
                        EventType::ObjectEvent
                        | EventType::AggregationEvent
                        | EventType::TransactionEvent
                        | EventType::AssociationEvent,
                        _,
                    ) => patch.referenced_identifier.push(reference),
                }
                debug!(identifier = node.id, event = target_id, "attached identifier supply");
            }
        }
    }

    fn attach_parent_identifiers(&mut self) {
        for node in self.diagram.nodes_of_kind(NodeKind::ParentIdentifier) {
            if !self.identifiers.contains_key(&node.id) {
                continue;
            }
            let targets: Vec<NodeId> = self.event_targets(node).map(|(_, t)| t.event_id).collect();
            for target_id in targets {
                let Some(target) = self.events.get(&target_id) else {
                    continue;
                };
                if !target.event_type.takes_parent_identifier() {
                    self.out.warnings.push(ResolveWarning::new(
                        "parent_identifier_ignored",
                        target.event_id,
                        format!(
                            "parent identifiers {} are ignored on {} {}",
                            node.id, target.event_type, target.event_id
                        ),
                    ));
                    continue;
                }
                let parent_count = self.parent_count(target);
                self.out
                    .overlay
                    .entry(target.event_id)
                    .or_default()
                    .parent_referenced_identifier = Some(ParentReference {
                    identifier_id: node.id,
                    parent_count,
                });
                debug!(identifier = node.id, event = target.event_id, parent_count, "attached parent identifiers");
            }
        }
    }

    fn parent_count(&self, target: &EventRecord) -> u32 {
        match self.options.parent_count {
            ParentCountPolicy::OwnEventCount => target.event_count,
            ParentCountPolicy::WeightedByAncestry => {
                let upstream: Vec<&EventRecord> = self
                    .diagram
                    .upstream_events(target.event_id)
                    .into_iter()
                    .filter_map(|id| self.events.get(&id))
                    .collect();
                let node_count = (upstream.len() as u64).max(1);
                let parent_event_count = upstream
                    .iter()
                    .map(|e| u64::from(e.event_count))
                    .sum::<u64>()
                    .max(1);
                let weighted = u64::from(target.event_count) * parent_event_count / node_count;
                u32::try_from(weighted.max(1)).unwrap_or(u32::MAX)
            }
        }
    }

    /// Current outgoing supply of `id`: the record's own lists plus what was attached.
    fn supply_len(&self, id: NodeId) -> usize {
        let Some(record) = self.events.get(&id) else {
            return 0;
        };
        let patched = self.out.overlay.get(&id).map_or(0, |patch| match record.event_type {
            EventType::TransformationEvent => patch.output_referenced_identifier.len(),
            EventType::ObjectEvent
            | EventType::AggregationEvent
            | EventType::TransactionEvent
            | EventType::AssociationEvent => patch.referenced_identifier.len(),
        });
        record.outgoing_supply().len() + patched
    }

    fn inherits_from(&self, target: NodeId, ancestor: NodeId) -> bool {
        let own = self
            .events
            .get(&target)
            .into_iter()
            .flat_map(|r| r.referenced_identifier.iter());
        let patched = self
            .out
            .overlay
            .get(&target)
            .into_iter()
            .flat_map(|p| p.referenced_identifier.iter());
        own.chain(patched)
            .any(|r| r.parent_node_id() == Some(ancestor))
    }

    fn propagate_ancestry(&mut self) {
        let (order, cyclic) = self.diagram.events_in_dependency_order();
        if let Some(first) = cyclic.first() {
            self.out.warnings.push(ResolveWarning::new(
                "event_cycle",
                *first,
                format!(
                    "events {cyclic:?} form a cycle; they are propagated in id order"
                ),
            ));
        }

        for source_id in order {
            let Some(source_node) = self.diagram.node(source_id) else {
                continue;
            };
            if !self.events.contains_key(&source_id) {
                continue;
            }
            let targets: Vec<NodeId> = self
                .event_targets(source_node)
                .map(|(_, t)| t.event_id)
                .collect();
            for target_id in targets {
                let Some(info) = self.connectors.get(source_id, target_id).copied() else {
                    self.out.warnings.push(ResolveWarning::new(
                        "missing_connector",
                        target_id,
                        format!("no connector info for {source_id} -> {target_id}; inheritance skipped"),
                    ));
                    continue;
                };
                if self.supply_len(source_id) == 0 {
                    debug!(source = source_id, target = target_id, "source has no supply to pass on");
                    continue;
                }
                if self.inherits_from(target_id, source_id) {
                    continue;
                }
                self.out
                    .overlay
                    .entry(target_id)
                    .or_default()
                    .referenced_identifier
                    .push(from_connector(SupplySource::ParentEvent(source_id), &info));
                debug!(source = source_id, target = target_id, "propagated ancestry");
            }
        }
    }
}

fn from_connector(source: SupplySource, info: &ConnectorInfo) -> ReferencedIdentifier {
    ReferencedIdentifier {
        source,
        epc_count: info.epc_count,
        class_count: info.class_count,
        inherit_parent_count: Some(info.inherit_parent_count),
        quantity: Some(info.quantity),
    }
}
