use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::{Map, Value};

use crate::{
    diagram::{DiagramNode, NodeId},
    error::{DesignError, DesignErrorLocation, Result},
    model::IdentifierFormDoc,
    util::count_from_value,
};

const DEFAULT_SYNTAX: &str = "URN";
const MANUAL_URI: &str = "manualURI";

/// A GS1 key type tag with its serialization recipe, serialized as `{tag: recipe}`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedPayload {
    pub key_type: String,
    pub recipe: Map<String, Value>,
}

impl Serialize for TypedPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.key_type, &self.recipe)?;
        map.end()
    }
}

impl TypedPayload {
    /// Number of identifiers one run of this recipe yields. Class recipes may state the
    /// count directly through `classIdentifiersCount`.
    pub fn supply_count(&self, class_level: bool) -> u32 {
        let field = |key: &str| self.recipe.get(key).and_then(count_from_value).unwrap_or(0);
        match self.recipe.get("serialType").and_then(Value::as_str) {
            Some("range") => return field("count"),
            Some("random") => return field("randomCount"),
            Some("none") => return 1,
            _ => {}
        }
        if class_level && self.recipe.contains_key("classIdentifiersCount") {
            return field("classIdentifiersCount");
        }
        if self.key_type == MANUAL_URI {
            return match self.recipe.get("manualUriType").and_then(Value::as_str) {
                Some("dynamic") => field("manualUriRangeTo").saturating_sub(field("manualUriRangeFrom")),
                Some("static") => 1,
                _ => 0,
            };
        }
        0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierRecord {
    pub identifier_id: NodeId,
    pub object_identifier_syntax: String,
    pub instance_data: Option<TypedPayload>,
    pub class_data: Option<TypedPayload>,
    pub parent_data: Option<TypedPayload>,
}

impl IdentifierRecord {
    /// `(epcCount, classCount)` an edge from this node supplies when no connector says
    /// otherwise.
    pub fn recipe_counts(&self) -> (u32, u32) {
        let instances = self
            .instance_data
            .as_ref()
            .or(self.parent_data.as_ref())
            .map_or(0, |p| p.supply_count(false));
        let classes = self.class_data.as_ref().map_or(0, |p| p.supply_count(true));
        (instances, classes)
    }
}

pub fn normalize_identifier(
    node: &DiagramNode,
    form: &IdentifierFormDoc,
    path: &str,
) -> Result<IdentifierRecord> {
    Ok(IdentifierRecord {
        identifier_id: node.id,
        object_identifier_syntax: form
            .identifier_syntax
            .clone()
            .unwrap_or_else(|| DEFAULT_SYNTAX.to_string()),
        instance_data: typed_section(form.instance_data.as_ref(), &format!("{path}.instanceData"))?,
        class_data: typed_section(form.class_data.as_ref(), &format!("{path}.classData"))?,
        parent_data: typed_section(form.parent_data.as_ref(), &format!("{path}.parentData"))?,
    })
}

/// `{identifierType: tag, ...recipe}` or `{identifierType: tag, tag: {recipe}}`.
fn typed_section(section: Option<&Map<String, Value>>, path: &str) -> Result<Option<TypedPayload>> {
    let Some(section) = section.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let key_type = section
        .get("identifierType")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| DesignError::MissingField {
            field: "identifierType",
            location: DesignErrorLocation::at_path(path.to_string()),
        })?
        .to_string();
    let recipe = match section.get(&key_type) {
        Some(Value::Object(nested)) => nested.clone(),
        _ => section
            .iter()
            .filter(|(key, _)| key.as_str() != "identifierType")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    };
    Ok(Some(TypedPayload { key_type, recipe }))
}
