use crate::{
    error::{DesignError, DesignErrorLocation, Result, SchemaErrorDetail},
    model::DesignDoc,
};
use jsonschema::Draft;
use serde_json::Value;
use serde_yaml_bw::Location as YamlLocation;
use std::{fs, path::Path};

const INLINE_SOURCE: &str = "<inline>";
const EMBEDDED_SCHEMA_LABEL: &str = "<embedded design schema>";
const EMBEDDED_SCHEMA: &str = include_str!("../schemas/design.schema.json");

/// Load a design document (JSON or YAML) from a string using the embedded schema.
pub fn load_design_from_str(text: &str) -> Result<DesignDoc> {
    load_with_schema_text(text, EMBEDDED_SCHEMA, EMBEDDED_SCHEMA_LABEL, INLINE_SOURCE, None)
}

/// Load a design document from a file path using the embedded schema.
pub fn load_design_from_path(path: &Path) -> Result<DesignDoc> {
    let content = fs::read_to_string(path).map_err(|e| DesignError::Internal {
        message: format!("failed to read {}: {e}", path.display()),
        location: DesignErrorLocation::at_path(path.display().to_string())
            .with_source_path(Some(path)),
    })?;
    load_with_schema_text(
        &content,
        EMBEDDED_SCHEMA,
        EMBEDDED_SCHEMA_LABEL,
        path.display().to_string(),
        Some(path),
    )
}

pub(crate) fn load_with_schema_text(
    text: &str,
    schema_text: &str,
    schema_label: &str,
    source_label: impl Into<String>,
    source_path: Option<&Path>,
) -> Result<DesignDoc> {
    let source_label = source_label.into();
    let v_yaml: serde_yaml_bw::Value =
        serde_yaml_bw::from_str(text).map_err(|e| DesignError::Parse {
            message: e.to_string(),
            location: yaml_error_location(&source_label, source_path, e.location()),
        })?;
    let mut v_json: Value = serde_json::to_value(&v_yaml).map_err(|e| DesignError::Internal {
        message: format!("yaml->json: {e}"),
        location: DesignErrorLocation::at_path(source_label.clone()).with_source_path(source_path),
    })?;
    unwrap_drawflow_export(&mut v_json);
    validate_json(&v_json, schema_text, schema_label, &source_label, source_path)?;

    serde_json::from_value(v_json).map_err(|e| DesignError::Parse {
        message: e.to_string(),
        location: DesignErrorLocation::at_path(source_label.clone()).with_source_path(source_path),
    })
}

/// Replace an editor export (`{drawflow: {Home: {data: {...}}}}`) under `diagram` by its
/// node map.
pub fn unwrap_drawflow_export(doc: &mut Value) {
    let Some(diagram) = doc.get_mut("diagram") else {
        return;
    };
    if let Some(nodes) = diagram.pointer_mut("/drawflow/Home/data").map(Value::take) {
        *diagram = nodes;
    }
}

fn validate_json(
    doc: &Value,
    schema_text: &str,
    schema_label: &str,
    source_label: &str,
    source_path: Option<&Path>,
) -> Result<()> {
    let schema: Value = serde_json::from_str(schema_text).map_err(|e| DesignError::Internal {
        message: format!("schema parse for {schema_label}: {e}"),
        location: DesignErrorLocation::at_path(schema_label.to_string()),
    })?;
    let validator = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .map_err(|e| DesignError::Internal {
            message: format!("schema compile for {schema_label}: {e}"),
            location: DesignErrorLocation::at_path(schema_label.to_string()),
        })?;
    let details: Vec<SchemaErrorDetail> = validator
        .iter_errors(doc)
        .map(|e| {
            let pointer = e.instance_path().to_string();
            let pointer = if pointer.is_empty() {
                "/".to_string()
            } else {
                pointer
            };
            SchemaErrorDetail {
                message: e.to_string(),
                location: DesignErrorLocation::at_path(format!("{source_label}{pointer}"))
                    .with_source_path(source_path)
                    .with_json_pointer(Some(pointer.clone())),
            }
        })
        .collect();
    if !details.is_empty() {
        let message = details
            .iter()
            .map(|detail| {
                let where_str = detail
                    .location
                    .json_pointer
                    .clone()
                    .unwrap_or_else(|| source_label.to_string());
                format!("{source_label}{where_str}: {}", detail.message)
            })
            .collect::<Vec<_>>()
            .join("\n");
        return Err(DesignError::Schema {
            message,
            details,
            location: DesignErrorLocation::at_path(source_label.to_string())
                .with_source_path(source_path),
        });
    }
    Ok(())
}

fn yaml_error_location(
    source_label: &str,
    source_path: Option<&Path>,
    loc: Option<YamlLocation>,
) -> DesignErrorLocation {
    if let Some(loc) = loc {
        DesignErrorLocation::at_path_with_position(
            source_label.to_string(),
            Some(loc.line()),
            Some(loc.column()),
        )
        .with_source_path(source_path)
    } else {
        DesignErrorLocation::at_path(source_label.to_string()).with_source_path(source_path)
    }
}
