use blake3::Hasher;
use serde::Serialize;
use serde_json::Value;

use crate::{
    error::{DesignError, DesignErrorLocation, Result},
    event::{EventRecord, EventTime},
    identifier::IdentifierRecord,
    timestamp::{UtcOffset, offset_of, with_offset},
};

/// The document posted to the generation service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    pub events: Vec<EventRecord>,
    pub identifiers: Vec<IdentifierRecord>,
}

/// Stamp every timestamp lacking an offset with `offset` and fill a missing
/// `timeZoneOffset`, preferring the offset the time was written with. Running it
/// twice changes nothing.
pub fn apply_offset(record: &mut EventRecord, offset: UtcOffset) {
    let event_zone = zone_of(&record.event_time, offset);
    let declaration_zone = record
        .error_declaration
        .as_ref()
        .map(|d| zone_of(&d.declaration_time, offset));
    for timestamp in record.timestamps_mut() {
        *timestamp = with_offset(timestamp, offset);
    }
    record.event_time.time_zone_offset.get_or_insert(event_zone);
    if let (Some(declaration), Some(zone)) = (record.error_declaration.as_mut(), declaration_zone) {
        declaration.declaration_time.time_zone_offset.get_or_insert(zone);
    }
}

fn zone_of(time: &EventTime, fallback: UtcOffset) -> String {
    time.specific_time
        .as_deref()
        .or(time.from_time.as_deref())
        .and_then(offset_of)
        .unwrap_or(fallback)
        .to_string()
}

pub fn assemble(
    mut events: Vec<EventRecord>,
    identifiers: Vec<IdentifierRecord>,
    offset: UtcOffset,
) -> Template {
    for record in &mut events {
        apply_offset(record, offset);
    }
    Template {
        events,
        identifiers,
    }
}

/// A template together with its canonical JSON and content hash.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateBundle {
    pub template: Template,
    #[serde(skip)]
    pub canonical_json: Value,
    pub hash_blake3: String,
}

impl TemplateBundle {
    pub fn new(template: Template) -> Result<Self> {
        let json = serde_json::to_value(&template).map_err(|e| DesignError::Internal {
            message: format!("template serialization: {e}"),
            location: DesignErrorLocation::default(),
        })?;
        let canonical_json = canonicalize_json(&json);
        let bytes = serde_json::to_vec(&canonical_json).map_err(|e| DesignError::Internal {
            message: format!("canonical json encode: {e}"),
            location: DesignErrorLocation::default(),
        })?;
        Ok(TemplateBundle {
            template,
            canonical_json,
            hash_blake3: blake3_hex(bytes),
        })
    }

    /// Pretty JSON in the service's field order.
    pub fn to_pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.template).map_err(|e| DesignError::Internal {
            message: format!("template serialization: {e}"),
            location: DesignErrorLocation::default(),
        })
    }
}

/// Canonicalize a JSON value by sorting object keys recursively.
pub fn canonicalize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            let mut ordered = serde_json::Map::with_capacity(map.len());
            for key in keys {
                ordered.insert(key.clone(), canonicalize_json(&map[key]));
            }
            Value::Object(ordered)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize_json).collect()),
        _ => value.clone(),
    }
}

pub fn blake3_hex(bytes: impl AsRef<[u8]>) -> String {
    let mut hasher = Hasher::new();
    hasher.update(bytes.as_ref());
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let value = json!({"b": 1, "a": {"d": 2, "c": [ {"z": 0, "y": 1} ]}});
        let canonical = serde_json::to_string(&canonicalize_json(&value)).unwrap();
        assert_eq!(canonical, r#"{"a":{"c":[{"y":1,"z":0}],"d":2},"b":1}"#);
    }

    #[test]
    fn hash_is_stable_for_equal_templates() {
        let template = Template {
            events: Vec::new(),
            identifiers: Vec::new(),
        };
        let first = TemplateBundle::new(template.clone()).unwrap();
        let second = TemplateBundle::new(template).unwrap();
        assert_eq!(first.hash_blake3, second.hash_blake3);
        assert_eq!(first.hash_blake3.len(), 64);
    }
}
