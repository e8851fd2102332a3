use indexmap::IndexMap;
use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::{Map, Value};

use crate::util::split_qualified_name;

/// Prefix → namespace URI lookup built from an event's `@context`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceContext {
    prefixes: IndexMap<String, String>,
}

impl NamespaceContext {
    /// Reads the object entries of `@context`; bare context URLs carry no prefixes.
    /// When a prefix is declared twice the later declaration wins.
    pub fn from_value(context: Option<&Value>) -> Self {
        let mut prefixes = IndexMap::new();
        let mut collect = |obj: &Map<String, Value>| {
            for (prefix, uri) in obj {
                if let Some(uri) = uri.as_str() {
                    prefixes.insert(prefix.clone(), uri.to_string());
                }
            }
        };
        match context {
            Some(Value::Array(items)) => {
                for item in items {
                    if let Value::Object(obj) = item {
                        collect(obj);
                    }
                }
            }
            Some(Value::Object(obj)) => collect(obj),
            _ => {}
        }
        NamespaceContext { prefixes }
    }

    /// The URI registered for `prefix`, or the prefix itself when unknown.
    pub fn resolve(&self, prefix: &str) -> String {
        self.prefixes
            .get(prefix)
            .cloned()
            .unwrap_or_else(|| prefix.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionValue {
    Leaf(String),
    Complex(Vec<Extension>),
}

/// One user extension element with its namespace already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub namespace: String,
    pub local_name: String,
    pub value: ExtensionValue,
}

impl Extension {
    pub fn leaf(namespace: &str, local_name: &str, text: &str) -> Self {
        Extension {
            namespace: namespace.to_string(),
            local_name: local_name.to_string(),
            value: ExtensionValue::Leaf(text.to_string()),
        }
    }

    pub fn children(&self) -> &[Extension] {
        match &self.value {
            ExtensionValue::Complex(children) => children,
            ExtensionValue::Leaf(_) => &[],
        }
    }
}

impl Serialize for Extension {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("namespace", &self.namespace)?;
        map.serialize_entry("localName", &self.local_name)?;
        match &self.value {
            ExtensionValue::Leaf(text) => map.serialize_entry("text", text)?,
            ExtensionValue::Complex(children) => map.serialize_entry("complex", children)?,
        }
        map.end()
    }
}

/// Turn the unrecognized members of an EPCIS object into extension elements.
pub fn read_extensions<'a, I>(entries: I, context: &NamespaceContext) -> Vec<Extension>
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
{
    let mut out = Vec::new();
    for (key, value) in entries {
        let (prefix, local_name) = split_qualified_name(key);
        let namespace = context.resolve(prefix);
        push_value(&namespace, local_name, value, context, &mut out);
    }
    out
}

fn push_value(
    namespace: &str,
    local_name: &str,
    value: &Value,
    context: &NamespaceContext,
    out: &mut Vec<Extension>,
) {
    let extension_value = match value {
        Value::Array(items) => {
            for item in items {
                push_value(namespace, local_name, item, context, out);
            }
            return;
        }
        Value::Object(obj) => ExtensionValue::Complex(read_extensions(obj, context)),
        Value::Null => ExtensionValue::Leaf(String::new()),
        Value::String(s) => ExtensionValue::Leaf(s.clone()),
        other => ExtensionValue::Leaf(other.to_string()),
    };
    out.push(Extension {
        namespace: namespace.to_string(),
        local_name: local_name.to_string(),
        value: extension_value,
    });
}
