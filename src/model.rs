use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::util::{de_lenient_count, de_node_id, de_opt_node_id};

fn default_event_count() -> u32 {
    1
}

/// Everything the resolver needs, as exported by the design editor.
#[derive(Debug, Clone, Deserialize)]
pub struct DesignDoc {
    pub diagram: DiagramDoc,
    #[serde(default)]
    pub connectors: Vec<ConnectorDoc>,
    #[serde(default)]
    pub events: Vec<EventFormDoc>,
    #[serde(default)]
    pub identifiers: Vec<IdentifierFormDoc>,
}

/// Node map of the editor canvas, keyed by the editor's node id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct DiagramDoc {
    pub nodes: IndexMap<String, NodeDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeDoc {
    #[serde(deserialize_with = "de_node_id")]
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub data: NodeDataDoc,
    #[serde(default)]
    pub inputs: IndexMap<String, PortDoc>,
    #[serde(default)]
    pub outputs: IndexMap<String, PortDoc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeDataDoc {
    #[serde(rename = "eventType", default)]
    pub event_type: Option<String>,
    #[serde(rename = "ID", default, deserialize_with = "de_opt_node_id")]
    pub form_id: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortDoc {
    #[serde(default)]
    pub connections: Vec<ConnectionDoc>,
}

/// One end of an editor connection. On output ports `port` names the target's input
/// port; on input ports it names the source's output port.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionDoc {
    #[serde(deserialize_with = "de_node_id")]
    pub node: u32,
    #[serde(rename = "output", alias = "input", default)]
    pub port: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorDoc {
    #[serde(deserialize_with = "de_node_id")]
    pub source: u32,
    #[serde(deserialize_with = "de_node_id")]
    pub target: u32,
    #[serde(default, deserialize_with = "de_lenient_count")]
    pub epc_count: u32,
    #[serde(default, deserialize_with = "de_lenient_count")]
    pub class_count: u32,
    #[serde(default, deserialize_with = "de_lenient_count")]
    pub quantity: u32,
    #[serde(default, deserialize_with = "de_lenient_count")]
    pub inherit_parent_count: u32,
    #[serde(default, deserialize_with = "de_lenient_count")]
    pub hide_inherit_parent_count: u32,
}

/// Form data the user entered for one event node.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFormDoc {
    #[serde(alias = "eventId", deserialize_with = "de_node_id")]
    pub node_id: u32,
    #[serde(default = "default_event_count", deserialize_with = "de_lenient_count")]
    pub event_count: u32,
    #[serde(default)]
    pub event_time_selector: Option<String>,
    #[serde(default)]
    pub vocabulary_syntax: Option<String>,
    #[serde(default)]
    pub event_id_type: Option<String>,
    #[serde(default)]
    pub hash_algorithm: Option<String>,
    /// EPCIS-shaped event body; its shape depends on the event type.
    #[serde(default)]
    pub event: Map<String, Value>,
}

/// Form data the user entered for one identifier node.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierFormDoc {
    #[serde(alias = "identifierId", deserialize_with = "de_node_id")]
    pub identifiers_id: u32,
    #[serde(default)]
    pub identifier_syntax: Option<String>,
    #[serde(default)]
    pub instance_data: Option<Map<String, Value>>,
    #[serde(default)]
    pub class_data: Option<Map<String, Value>>,
    #[serde(default)]
    pub parent_data: Option<Map<String, Value>>,
}
