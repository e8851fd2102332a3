use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    diagram::{DiagramNode, NodeId},
    error::{DesignError, DesignErrorLocation, Result},
    extension::{Extension, NamespaceContext, read_extensions},
    model::EventFormDoc,
    timestamp::is_valid_timestamp,
    util::vocabulary_term,
};

const DEFAULT_SYNTAX: &str = "URN";
const DEFAULT_EVENT_ID_TYPE: &str = "UUID";
const DEFAULT_HASH_ALGORITHM: &str = "sha-256";
const RECORD_TIME_SAME_AS_EVENT: &str = "SAME_AS_EVENT_TIME";
const SENSOR_METADATA_TIMES: [&str; 3] = ["time", "startTime", "endTime"];

/// Members of a raw event that map onto canonical fields rather than extensions.
const CANONICAL_KEYS: [&str; 29] = [
    "@context",
    "type",
    "eventTime",
    "eventTimeZoneOffset",
    "recordTime",
    "readPoint",
    "bizLocation",
    "bizStep",
    "disposition",
    "sourceList",
    "destinationList",
    "eventID",
    "action",
    "errorDeclaration",
    "persistentDisposition",
    "bizTransactionList",
    "sensorElementList",
    "certificationInfo",
    "ilmd",
    "epcList",
    "quantityList",
    "parentID",
    "childEPCs",
    "childQuantityList",
    "inputEPCList",
    "inputQuantityList",
    "outputEPCList",
    "outputQuantityList",
    "transformationID",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    ObjectEvent,
    AggregationEvent,
    TransactionEvent,
    TransformationEvent,
    AssociationEvent,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::ObjectEvent => "ObjectEvent",
            EventType::AggregationEvent => "AggregationEvent",
            EventType::TransactionEvent => "TransactionEvent",
            EventType::TransformationEvent => "TransformationEvent",
            EventType::AssociationEvent => "AssociationEvent",
        }
    }

    /// Whether a parent identifier group may be attached to this event.
    pub fn takes_parent_identifier(self) -> bool {
        match self {
            EventType::AggregationEvent
            | EventType::TransactionEvent
            | EventType::AssociationEvent => true,
            EventType::ObjectEvent | EventType::TransformationEvent => false,
        }
    }

    pub fn keeps_ilmd(self) -> bool {
        match self {
            EventType::ObjectEvent | EventType::TransformationEvent => true,
            EventType::AggregationEvent
            | EventType::TransactionEvent
            | EventType::AssociationEvent => false,
        }
    }

    fn has_action(self) -> bool {
        !matches!(self, EventType::TransformationEvent)
    }

    /// Canonical identifier slot for a raw member of this event type.
    fn bucket_for(self, key: &str) -> Option<Bucket> {
        match self {
            EventType::ObjectEvent => match key {
                "epcList" => Some(Bucket::Epc),
                "quantityList" => Some(Bucket::Quantity),
                _ => None,
            },
            EventType::AggregationEvent | EventType::AssociationEvent => match key {
                "parentID" => Some(Bucket::Parent),
                "childEPCs" => Some(Bucket::Epc),
                "childQuantityList" => Some(Bucket::Quantity),
                _ => None,
            },
            EventType::TransactionEvent => match key {
                "parentID" => Some(Bucket::Parent),
                "epcList" => Some(Bucket::Epc),
                "quantityList" => Some(Bucket::Quantity),
                _ => None,
            },
            EventType::TransformationEvent => match key {
                "inputEPCList" => Some(Bucket::Epc),
                "inputQuantityList" => Some(Bucket::Quantity),
                "outputEPCList" => Some(Bucket::OutputEpc),
                "outputQuantityList" => Some(Bucket::OutputQuantity),
                "transformationID" => Some(Bucket::TransformationId),
                _ => None,
            },
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "ObjectEvent" => Ok(EventType::ObjectEvent),
            "AggregationEvent" => Ok(EventType::AggregationEvent),
            "TransactionEvent" => Ok(EventType::TransactionEvent),
            "TransformationEvent" => Ok(EventType::TransformationEvent),
            "AssociationEvent" => Ok(EventType::AssociationEvent),
            other => Err(format!("unknown event type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Epc,
    Quantity,
    Parent,
    OutputEpc,
    OutputQuantity,
    TransformationId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Add,
    Observe,
    Delete,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADD" => Ok(Action::Add),
            "OBSERVE" => Ok(Action::Observe),
            "DELETE" => Ok(Action::Delete),
            _ => Err(format!("expected ADD, OBSERVE or DELETE, got '{s}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTimeSelector {
    SpecificTime,
    TimeRange,
}

impl FromStr for EventTimeSelector {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "SpecificTime" => Ok(EventTimeSelector::SpecificTime),
            "TimeRange" => Ok(EventTimeSelector::TimeRange),
            other => Err(format!("expected SpecificTime or TimeRange, got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specific_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone_offset: Option<String>,
}

impl EventTime {
    pub fn specific(timestamp: &str) -> Self {
        EventTime {
            specific_time: Some(timestamp.to_string()),
            ..Default::default()
        }
    }

    pub fn timestamps_mut(&mut self) -> impl Iterator<Item = &mut String> {
        [
            &mut self.specific_time,
            &mut self.from_time,
            &mut self.to_time,
        ]
        .into_iter()
        .flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationRef {
    #[serde(rename = "manualURI")]
    pub manual_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDestination {
    #[serde(rename = "type")]
    pub kind: String,
    pub manual_type: String,
    #[serde(rename = "manualURI")]
    pub manual_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BizTransaction {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub biz_transaction: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistentDisposition {
    pub set: Vec<String>,
    pub unset: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDeclaration {
    pub declaration_time: EventTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declaration_reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub corrective_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<Extension>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorElement {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sensor_report: Vec<Map<String, Value>>,
}

impl SensorElement {
    pub fn timestamps_mut(&mut self) -> impl Iterator<Item = &mut String> {
        let metadata = self.sensor_metadata.iter_mut().flat_map(|meta| {
            meta.iter_mut()
                .filter(|(key, _)| SENSOR_METADATA_TIMES.contains(&key.as_str()))
                .filter_map(|(_, value)| match value {
                    Value::String(s) => Some(s),
                    _ => None,
                })
        });
        let reports = self
            .sensor_report
            .iter_mut()
            .filter_map(|report| match report.get_mut("time") {
                Some(Value::String(s)) => Some(s),
                _ => None,
            });
        metadata.chain(reports)
    }
}

/// Where a unit of identifier supply comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SupplySource {
    #[serde(rename = "identifierId")]
    Identifier(NodeId),
    #[serde(rename = "parentNodeId")]
    ParentEvent(NodeId),
}

/// One supply edge resolved onto an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencedIdentifier {
    #[serde(flatten)]
    pub source: SupplySource,
    pub epc_count: u32,
    pub class_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherit_parent_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

impl ReferencedIdentifier {
    pub fn parent_node_id(&self) -> Option<NodeId> {
        match self.source {
            SupplySource::ParentEvent(id) => Some(id),
            SupplySource::Identifier(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentReference {
    pub identifier_id: NodeId,
    pub parent_count: u32,
}

/// Canonical event shape, serialized with the generation service's field names.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(rename = "nodeId")]
    pub event_id: NodeId,
    pub event_count: u32,
    pub event_type: EventType,
    pub location_party_identifier_syntax: String,
    pub ordinary_event: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(rename = "eventID")]
    pub with_event_id: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_algorithm: Option<String>,
    pub event_time: EventTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_time_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_point: Option<LocationRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biz_location: Option<LocationRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disposition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_disposition: Option<PersistentDisposition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub biz_transactions: Vec<BizTransaction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceDestination>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<SourceDestination>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sensor_element_list: Vec<SensorElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certification_info: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_extensions: Vec<Extension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_declaration: Option<ErrorDeclaration>,
    pub referenced_identifier: Vec<ReferencedIdentifier>,
    pub output_referenced_identifier: Vec<ReferencedIdentifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_referenced_identifier: Option<ParentReference>,
    pub epc_list: Vec<String>,
    pub quantity_list: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_identifier: Option<String>,
    #[serde(rename = "outputEPCList")]
    pub output_epc_list: Vec<String>,
    pub output_quantity_list: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ilmd: Vec<Extension>,
    #[serde(rename = "transformationID", skip_serializing_if = "Option::is_none")]
    pub transformation_id: Option<String>,
}

impl EventRecord {
    /// Identifier supply this event hands to the events it precedes.
    pub fn outgoing_supply(&self) -> &[ReferencedIdentifier] {
        match self.event_type {
            EventType::TransformationEvent => &self.output_referenced_identifier,
            EventType::ObjectEvent
            | EventType::AggregationEvent
            | EventType::TransactionEvent
            | EventType::AssociationEvent => &self.referenced_identifier,
        }
    }

    /// Every raw timestamp carried by this event.
    pub fn timestamps_mut(&mut self) -> Vec<&mut String> {
        let mut out: Vec<&mut String> = self.event_time.timestamps_mut().collect();
        if let Some(declaration) = self.error_declaration.as_mut() {
            out.extend(declaration.declaration_time.timestamps_mut());
        }
        for sensor in &mut self.sensor_element_list {
            out.extend(sensor.timestamps_mut());
        }
        out
    }
}

/// Build the canonical record for one event node from its form payload. `path` labels
/// the payload in error locations.
pub fn normalize_event(node: &DiagramNode, form: &EventFormDoc, path: &str) -> Result<EventRecord> {
    let raw = &form.event;
    let at = |field: &str| DesignErrorLocation::at_path(format!("{path}.{field}"));

    let event_type = match (node.event_type, raw.get("type").and_then(Value::as_str)) {
        (Some(event_type), _) => event_type,
        (None, Some(tag)) => EventType::from_str(tag).map_err(|_| DesignError::UnknownEventType {
            value: tag.to_string(),
            location: at("event.type"),
        })?,
        (None, None) => {
            return Err(DesignError::MissingField {
                field: "eventType",
                location: at("event.type"),
            });
        }
    };

    if form.event_count == 0 {
        return Err(DesignError::InvalidValue {
            field: "eventCount",
            detail: "must be at least 1".to_string(),
            location: at("eventCount"),
        });
    }

    let selector = match form.event_time_selector.as_deref() {
        Some(raw) => EventTimeSelector::from_str(raw).map_err(|detail| DesignError::InvalidValue {
            field: "eventTimeSelector",
            detail,
            location: at("eventTimeSelector"),
        })?,
        None => EventTimeSelector::SpecificTime,
    };

    let context = NamespaceContext::from_value(raw.get("@context"));
    let mut record = EventRecord {
        event_id: node.id,
        event_count: form.event_count,
        event_type,
        location_party_identifier_syntax: form
            .vocabulary_syntax
            .clone()
            .unwrap_or_else(|| DEFAULT_SYNTAX.to_string()),
        ordinary_event: true,
        action: event_type.has_action().then_some(Action::Add),
        with_event_id: false,
        event_id_type: None,
        hash_algorithm: None,
        event_time: read_time(
            raw.get("eventTime"),
            selector,
            "eventTime",
            &format!("{path}.event.eventTime"),
        )?,
        record_time_type: None,
        read_point: None,
        biz_location: None,
        business_step: None,
        disposition: None,
        persistent_disposition: None,
        biz_transactions: Vec::new(),
        sources: Vec::new(),
        destinations: Vec::new(),
        sensor_element_list: Vec::new(),
        certification_info: None,
        user_extensions: Vec::new(),
        error_declaration: None,
        referenced_identifier: Vec::new(),
        output_referenced_identifier: Vec::new(),
        parent_referenced_identifier: None,
        epc_list: Vec::new(),
        quantity_list: Vec::new(),
        parent_identifier: None,
        output_epc_list: Vec::new(),
        output_quantity_list: Vec::new(),
        ilmd: Vec::new(),
        transformation_id: None,
    };

    if let Some(offset) = raw.get("eventTimeZoneOffset").and_then(Value::as_str)
        && record.event_time.time_zone_offset.is_none()
    {
        record.event_time.time_zone_offset = Some(offset.to_string());
    }

    let mut unknown: Vec<(&String, &Value)> = Vec::new();
    for (key, value) in raw {
        let field_path = format!("{path}.event.{key}");
        if let Some(bucket) = event_type.bucket_for(key) {
            fill_bucket(&mut record, bucket, value);
            continue;
        }
        match key.as_str() {
            "@context" | "type" | "eventTime" | "eventTimeZoneOffset" => {}
            "recordTime" => {
                record.record_time_type = Some(RECORD_TIME_SAME_AS_EVENT.to_string());
            }
            "readPoint" => record.read_point = Some(read_location(value, &field_path)?),
            "bizLocation" => record.biz_location = Some(read_location(value, &field_path)?),
            "bizStep" => record.business_step = vocabulary_upper(value),
            "disposition" => record.disposition = vocabulary_upper(value),
            "sourceList" => record.sources = read_source_destinations(value, "source"),
            "destinationList" => {
                record.destinations = read_source_destinations(value, "destination");
            }
            "eventID" => record.with_event_id = true,
            "action" => {
                if event_type.has_action()
                    && let Some(action) = value.as_str()
                {
                    record.action = Some(Action::from_str(action).map_err(|detail| {
                        DesignError::InvalidValue {
                            field: "action",
                            detail,
                            location: DesignErrorLocation::at_path(field_path.clone()),
                        }
                    })?);
                }
            }
            "errorDeclaration" => {
                if !value.is_null() {
                    record.ordinary_event = false;
                    record.error_declaration =
                        Some(read_error_declaration(value, &context, &field_path)?);
                }
            }
            "persistentDisposition" => {
                record.persistent_disposition = Some(read_persistent_disposition(value));
            }
            "bizTransactionList" => record.biz_transactions = read_biz_transactions(value),
            "sensorElementList" => {
                record.sensor_element_list = read_sensor_elements(value, &field_path)?;
            }
            "certificationInfo" => {
                record.certification_info = match value {
                    Value::Null => None,
                    Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                };
            }
            "ilmd" => {
                if event_type.keeps_ilmd()
                    && let Value::Object(obj) = value
                {
                    record.ilmd = read_extensions(obj, &context);
                } else {
                    debug!(event = node.id, %event_type, "ignoring ilmd on event type without ilmd");
                }
            }
            other if CANONICAL_KEYS.contains(&other) => {
                debug!(event = node.id, %event_type, field = other, "ignoring identifier field of another event type");
            }
            _ => unknown.push((key, value)),
        }
    }
    record.user_extensions = read_extensions(unknown, &context);

    if record.with_event_id || form.event_id_type.is_some() {
        record.with_event_id = true;
        let id_type = form
            .event_id_type
            .clone()
            .unwrap_or_else(|| DEFAULT_EVENT_ID_TYPE.to_string());
        if id_type == "HashId" {
            record.hash_algorithm = Some(
                form.hash_algorithm
                    .clone()
                    .unwrap_or_else(|| DEFAULT_HASH_ALGORITHM.to_string()),
            );
        }
        record.event_id_type = Some(id_type);
    }

    Ok(record)
}

fn fill_bucket(record: &mut EventRecord, bucket: Bucket, value: &Value) {
    match bucket {
        Bucket::Epc => record.epc_list = string_list(value),
        Bucket::Quantity => record.quantity_list = value_list(value),
        Bucket::Parent => record.parent_identifier = value.as_str().map(str::to_string),
        Bucket::OutputEpc => record.output_epc_list = string_list(value),
        Bucket::OutputQuantity => record.output_quantity_list = value_list(value),
        Bucket::TransformationId => {
            record.transformation_id = value.as_str().map(str::to_string);
        }
    }
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn value_list(value: &Value) -> Vec<Value> {
    value.as_array().cloned().unwrap_or_default()
}

fn vocabulary_upper(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(|s| vocabulary_term(s.trim()).to_uppercase())
}

fn checked_timestamp(value: &Value, path: &str) -> Result<String> {
    match value.as_str().map(str::trim) {
        Some(ts) if is_valid_timestamp(ts) => Ok(ts.to_string()),
        _ => Err(DesignError::MalformedTimestamp {
            value: value
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string()),
            location: DesignErrorLocation::at_path(path.to_string()),
        }),
    }
}

/// Read an EPCIS timestamp string or an editor time object.
fn read_time(
    value: Option<&Value>,
    selector: EventTimeSelector,
    field: &'static str,
    path: &str,
) -> Result<EventTime> {
    match value {
        None | Some(Value::Null) => Err(DesignError::MissingField {
            field,
            location: DesignErrorLocation::at_path(path.to_string()),
        }),
        Some(Value::Object(obj)) => {
            let required = |key: &str| -> Result<String> {
                let inner_path = format!("{path}.{key}");
                match obj.get(key) {
                    Some(v) => checked_timestamp(v, &inner_path),
                    None => Err(DesignError::MissingField {
                        field,
                        location: DesignErrorLocation::at_path(inner_path),
                    }),
                }
            };
            let mut time = match selector {
                EventTimeSelector::SpecificTime => EventTime {
                    specific_time: Some(required("specificTime")?),
                    ..Default::default()
                },
                EventTimeSelector::TimeRange => EventTime {
                    from_time: Some(required("fromTime")?),
                    to_time: Some(required("toTime")?),
                    ..Default::default()
                },
            };
            time.time_zone_offset = obj
                .get("timeZoneOffset")
                .and_then(Value::as_str)
                .map(str::to_string);
            Ok(time)
        }
        Some(other) => Ok(EventTime::specific(&checked_timestamp(other, path)?)),
    }
}

fn read_location(value: &Value, path: &str) -> Result<LocationRef> {
    let id = match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(obj) => obj.get("id").and_then(Value::as_str),
        _ => None,
    };
    id.map(|id| LocationRef {
        manual_uri: id.to_string(),
    })
    .ok_or_else(|| DesignError::InvalidValue {
        field: "id",
        detail: "location must carry an 'id'".to_string(),
        location: DesignErrorLocation::at_path(path.to_string()),
    })
}

fn read_source_destinations(value: &Value, uri_key: &str) -> Vec<SourceDestination> {
    value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|row| {
            let kind = row.get("type").and_then(Value::as_str).unwrap_or_default();
            let uri = row.get(uri_key).and_then(Value::as_str)?;
            Some(SourceDestination {
                kind: "OTHER".to_string(),
                manual_type: vocabulary_term(kind).to_string(),
                manual_uri: uri.to_string(),
            })
        })
        .collect()
}

fn read_persistent_disposition(value: &Value) -> PersistentDisposition {
    let terms = |key: &str| -> Vec<String> {
        value
            .get(key)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(vocabulary_upper)
            .collect()
    };
    PersistentDisposition {
        set: terms("set"),
        unset: terms("unset"),
    }
}

fn read_biz_transactions(value: &Value) -> Vec<BizTransaction> {
    value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|row| {
            let biz_transaction = row.get("bizTransaction").and_then(Value::as_str)?;
            Some(BizTransaction {
                kind: row
                    .get("type")
                    .and_then(Value::as_str)
                    .map(|t| vocabulary_term(t).to_string()),
                biz_transaction: biz_transaction.to_string(),
            })
        })
        .collect()
}

fn read_sensor_elements(value: &Value, path: &str) -> Result<Vec<SensorElement>> {
    let mut out = Vec::new();
    for (idx, item) in value.as_array().into_iter().flatten().enumerate() {
        let item_path = format!("{path}[{idx}]");
        let metadata = item
            .get("sensorMetadata")
            .and_then(Value::as_object)
            .cloned();
        if let Some(meta) = &metadata {
            for key in SENSOR_METADATA_TIMES {
                if let Some(ts) = meta.get(key) {
                    checked_timestamp(ts, &format!("{item_path}.sensorMetadata.{key}"))?;
                }
            }
        }
        let mut reports = Vec::new();
        for (report_idx, report) in item
            .get("sensorReport")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .enumerate()
        {
            let Value::Object(report) = report else {
                continue;
            };
            if let Some(ts) = report.get("time") {
                checked_timestamp(ts, &format!("{item_path}.sensorReport[{report_idx}].time"))?;
            }
            let mut report = report.clone();
            report.insert("ID".to_string(), Value::from(report_idx as u64));
            reports.push(report);
        }
        out.push(SensorElement {
            id: idx as u32 + 1,
            sensor_metadata: metadata.filter(|m| !m.is_empty()),
            sensor_report: reports,
        });
    }
    Ok(out)
}

fn read_error_declaration(
    value: &Value,
    context: &NamespaceContext,
    path: &str,
) -> Result<ErrorDeclaration> {
    let Value::Object(obj) = value else {
        return Err(DesignError::InvalidValue {
            field: "errorDeclaration",
            detail: "expected an object".to_string(),
            location: DesignErrorLocation::at_path(path.to_string()),
        });
    };
    let selector = match obj.get("declarationTime") {
        Some(Value::Object(inner)) if inner.contains_key("fromTime") => {
            EventTimeSelector::TimeRange
        }
        _ => EventTimeSelector::SpecificTime,
    };
    let declaration_time = read_time(
        obj.get("declarationTime"),
        selector,
        "declarationTime",
        &format!("{path}.declarationTime"),
    )?;
    let declaration_reason = obj.get("reason").and_then(vocabulary_upper);
    let corrective_ids = obj
        .get("correctiveEventIDs")
        .map(string_list)
        .unwrap_or_default();
    let rest = obj
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "declarationTime" | "reason" | "correctiveEventIDs"));
    Ok(ErrorDeclaration {
        declaration_time,
        declaration_reason,
        corrective_ids,
        extensions: read_extensions(rest, context),
    })
}
