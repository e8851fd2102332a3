use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use tracing::warn;

use crate::{
    error::{DesignError, DesignErrorLocation, Result},
    event::EventType,
    model::{DiagramDoc, PortDoc},
};

pub type NodeId = u32;

/// Classification of a canvas node by its editor `name` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Event,
    Identifier,
    ParentIdentifier,
}

impl NodeKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Events" => Some(NodeKind::Event),
            "Identifiers" => Some(NodeKind::Identifier),
            "ParentIdentifiers" => Some(NodeKind::ParentIdentifier),
            _ => None,
        }
    }
}

/// Input port a connection lands on. TransformationEvent nodes distinguish the
/// input leg (`input_1`) from the output leg (`input_2`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPort {
    First,
    Second,
    Other(String),
}

impl InputPort {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "input_1" => InputPort::First,
            "input_2" => InputPort::Second,
            other => InputPort::Other(other.to_string()),
        }
    }
}

/// A directed link seen from one node: `port` is this node's port, `peer` the node on
/// the other end and `peer_port` the port it uses there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub port: String,
    pub peer: NodeId,
    pub peer_port: String,
}

impl Connection {
    /// For outgoing connections, the target's input port.
    pub fn target_port(&self) -> InputPort {
        InputPort::from_tag(&self.peer_port)
    }

    /// The same link as seen from `peer`, given that `owner` holds `self`.
    fn reversed(&self, owner: NodeId) -> Connection {
        Connection {
            port: self.peer_port.clone(),
            peer: owner,
            peer_port: self.port.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiagramNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub event_type: Option<EventType>,
    /// Key of the form payload attached to this node (`data.ID`, else the node id).
    pub form_id: NodeId,
    pub outputs: Vec<Connection>,
    pub inputs: Vec<Connection>,
}

/// A connection whose far end is not on the diagram. It is left out of the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingLink {
    pub node: NodeId,
    pub port: String,
    pub peer: NodeId,
}

/// Read-only view of the editor canvas, nodes ordered by numeric id.
#[derive(Debug, Clone, Default)]
pub struct DiagramModel {
    nodes: BTreeMap<NodeId, DiagramNode>,
    dangling: Vec<DanglingLink>,
}

impl DiagramModel {
    /// Index the canvas. The second value holds per-node errors: an Event node with an
    /// unrecognised event type is dropped and reported there, and links to it become
    /// dangling. An unknown node kind or a repeated node id fails the whole diagram.
    pub fn from_doc(doc: &DiagramDoc) -> Result<(Self, Vec<DesignError>)> {
        let mut nodes = BTreeMap::new();
        let mut rejected = Vec::new();
        let mut seen = BTreeSet::new();
        for (key, node) in &doc.nodes {
            let location = DesignErrorLocation::at_path(format!("diagram.{key}"));
            let kind = NodeKind::from_tag(&node.name).ok_or_else(|| DesignError::UnknownNodeKind {
                node_id: key.clone(),
                name: node.name.clone(),
                location: location.clone(),
            })?;
            if !seen.insert(node.id) {
                return Err(DesignError::DuplicateNode {
                    node_id: node.id,
                    location,
                });
            }
            let event_type = match (&kind, node.data.event_type.as_deref()) {
                (NodeKind::Event, Some(raw)) if !raw.trim().is_empty() => {
                    match EventType::from_str(raw) {
                        Ok(event_type) => Some(event_type),
                        Err(_) => {
                            warn!(node = node.id, event_type = raw, "event node dropped");
                            rejected.push(DesignError::UnknownEventType {
                                value: raw.to_string(),
                                location: DesignErrorLocation::at_path(format!(
                                    "diagram.{key}.data.eventType"
                                )),
                            });
                            continue;
                        }
                    }
                }
                _ => None,
            };
            nodes.insert(
                node.id,
                DiagramNode {
                    id: node.id,
                    kind,
                    event_type,
                    form_id: node.data.form_id.unwrap_or(node.id),
                    outputs: flatten_ports(&node.outputs),
                    inputs: flatten_ports(&node.inputs),
                },
            );
        }

        let known: BTreeSet<NodeId> = nodes.keys().copied().collect();
        let mut dangling = Vec::new();
        for node in nodes.values_mut() {
            let id = node.id;
            for side in [&mut node.outputs, &mut node.inputs] {
                side.retain(|conn| {
                    if known.contains(&conn.peer) {
                        return true;
                    }
                    dangling.push(DanglingLink {
                        node: id,
                        port: conn.port.clone(),
                        peer: conn.peer,
                    });
                    false
                });
            }
        }

        // Exports written by hand often list a link on one side only.
        let outgoing = links_of(&nodes, |n| &n.outputs);
        let incoming = links_of(&nodes, |n| &n.inputs);
        for (source, conn) in outgoing {
            if let Some(target) = nodes.get_mut(&conn.peer) {
                push_unique(&mut target.inputs, conn.reversed(source));
            }
        }
        for (target, conn) in incoming {
            if let Some(source) = nodes.get_mut(&conn.peer) {
                push_unique(&mut source.outputs, conn.reversed(target));
            }
        }

        Ok((DiagramModel { nodes, dangling }, rejected))
    }

    pub fn node(&self, id: NodeId) -> Option<&DiagramNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DiagramNode> {
        self.nodes.values()
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &DiagramNode> {
        self.nodes.values().filter(move |n| n.kind == kind)
    }

    /// Connections that were dropped because their far end is missing.
    pub fn dangling_links(&self) -> &[DanglingLink] {
        &self.dangling
    }

    /// Distinct Event nodes with a connection into `target`, in id order.
    pub fn upstream_events(&self, target: NodeId) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(&target) else {
            return Vec::new();
        };
        node.inputs
            .iter()
            .map(|c| c.peer)
            .filter(|id| {
                self.nodes
                    .get(id)
                    .is_some_and(|n| n.kind == NodeKind::Event)
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Event nodes ordered so every Event→Event source precedes its targets; ties and
    /// anything left over by a cycle fall back to id order. The second value lists the
    /// nodes that sit on a cycle.
    pub fn events_in_dependency_order(&self) -> (Vec<NodeId>, Vec<NodeId>) {
        let mut pending: BTreeMap<NodeId, usize> = self
            .nodes_of_kind(NodeKind::Event)
            .map(|n| (n.id, 0))
            .collect();
        for node in self.nodes_of_kind(NodeKind::Event) {
            for target in self.event_targets(node.id) {
                if let Some(count) = pending.get_mut(&target) {
                    *count += 1;
                }
            }
        }

        let mut ordered = Vec::with_capacity(pending.len());
        let mut ready: BTreeSet<NodeId> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        while let Some(id) = ready.pop_first() {
            pending.remove(&id);
            ordered.push(id);
            for target in self.event_targets(id) {
                if let Some(count) = pending.get_mut(&target) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(target);
                    }
                }
            }
        }

        let cyclic: Vec<NodeId> = pending.keys().copied().collect();
        ordered.extend(cyclic.iter().copied());
        (ordered, cyclic)
    }

    /// Outgoing Event→Event edges of `source`, one entry per connection.
    fn event_targets(&self, source: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&source)
            .map(|node| {
                node.outputs
                    .iter()
                    .map(|c| c.peer)
                    .filter(|id| {
                        self.nodes
                            .get(id)
                            .is_some_and(|n| n.kind == NodeKind::Event)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn links_of(
    nodes: &BTreeMap<NodeId, DiagramNode>,
    side: impl Fn(&DiagramNode) -> &Vec<Connection>,
) -> Vec<(NodeId, Connection)> {
    nodes
        .values()
        .flat_map(|n| side(n).iter().map(move |c| (n.id, c.clone())))
        .collect()
}

fn push_unique(conns: &mut Vec<Connection>, conn: Connection) {
    if !conns.contains(&conn) {
        conns.push(conn);
    }
}

fn flatten_ports(ports: &indexmap::IndexMap<String, PortDoc>) -> Vec<Connection> {
    ports
        .iter()
        .flat_map(|(port, doc)| {
            doc.connections.iter().map(move |c| Connection {
                port: port.clone(),
                peer: c.node,
                peer_port: c.port.clone(),
            })
        })
        .collect()
}
