use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use serde::Serialize;
use tracing::debug;

use crate::{
    diagram::NodeId,
    event::{EventRecord, EventType},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViolationKind {
    Instance,
    Class,
    Parent,
}

impl ViolationKind {
    fn message(self) -> &'static str {
        match self {
            ViolationKind::Instance => {
                "Child node/event is inheriting more EPC identifiers than available in Parent node/event."
            }
            ViolationKind::Class => {
                "Child node/event is inheriting more Class identifiers than available in Parent node/event."
            }
            ViolationKind::Parent => {
                "Child node/event is inheriting more Parent Identifiers than available in Parent node/event."
            }
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViolationKind::Instance => "Instance Identifiers",
            ViolationKind::Class => "Class Identifiers",
            ViolationKind::Parent => "Parent Identifiers",
        })
    }
}

/// A child event demanding more identifiers than its ancestors supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InheritanceViolation {
    pub kind: ViolationKind,
    pub event_id: NodeId,
    pub event_type: EventType,
    pub event_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disposition: Option<String>,
    pub supplied: u64,
    pub demanded: u64,
    pub message: String,
}

impl fmt::Display for InheritanceViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} {} (eventCount {}): supplied {}, demanded {}. {}",
            self.kind,
            self.event_type,
            self.event_id,
            self.event_count,
            self.supplied,
            self.demanded,
            self.message
        )
    }
}

#[derive(Debug, Default)]
struct Totals {
    epc: u64,
    class: u64,
    parent: u64,
}

/// Compare what every inheriting event demands against what its ancestors supply.
/// Findings are advisory; every shortfall of every event is reported.
pub fn check_inheritance(records: &[EventRecord]) -> Vec<InheritanceViolation> {
    let by_id: BTreeMap<NodeId, &EventRecord> = records.iter().map(|r| (r.event_id, r)).collect();
    let mut violations = Vec::new();

    for record in records {
        let inherited: Vec<_> = record
            .referenced_identifier
            .iter()
            .filter(|r| r.parent_node_id().is_some())
            .collect();
        if inherited.is_empty() {
            continue;
        }

        let count = u64::from(record.event_count);
        let mut demand = Totals::default();
        let mut ancestors = BTreeSet::new();
        for reference in &inherited {
            demand.epc += count * u64::from(reference.epc_count);
            demand.class += count * u64::from(reference.class_count);
            demand.parent += count * u64::from(reference.inherit_parent_count.unwrap_or(0));
            ancestors.extend(reference.parent_node_id());
        }

        let mut supply = Totals::default();
        for ancestor_id in ancestors {
            let Some(ancestor) = by_id.get(&ancestor_id) else {
                debug!(event = record.event_id, ancestor = ancestor_id, "ancestor has no record");
                continue;
            };
            for entry in ancestor.outgoing_supply() {
                supply.epc += u64::from(entry.epc_count);
                supply.class += u64::from(entry.class_count);
            }
            supply.parent += u64::from(ancestor.event_count);
        }

        for (kind, supplied, demanded) in [
            (ViolationKind::Instance, supply.epc, demand.epc),
            (ViolationKind::Class, supply.class, demand.class),
            (ViolationKind::Parent, supply.parent, demand.parent),
        ] {
            if supplied < demanded {
                violations.push(InheritanceViolation {
                    kind,
                    event_id: record.event_id,
                    event_type: record.event_type,
                    event_count: record.event_count,
                    business_step: record.business_step.clone(),
                    disposition: record.disposition.clone(),
                    supplied,
                    demanded,
                    message: kind.message().to_string(),
                });
            }
        }
    }
    violations
}
