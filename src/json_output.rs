use crate::{
    Build,
    error::{DesignError, DesignErrorLocation},
    lint::InheritanceViolation,
    resolve::ResolveWarning,
};
use serde::Serialize;

#[derive(Serialize, Clone, Debug)]
pub struct JsonDiagnostic {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub col: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_pointer: Option<String>,
}

impl JsonDiagnostic {
    pub fn from_location(message: String, location: DesignErrorLocation) -> Self {
        let DesignErrorLocation {
            path,
            source_path,
            line,
            col,
            json_pointer,
        } = location;
        JsonDiagnostic {
            message,
            source_path: source_path
                .as_ref()
                .map(|p| p.display().to_string())
                .or(path),
            line,
            col,
            json_pointer,
        }
    }
}

/// Machine-readable report printed by `check --json`.
#[derive(Serialize, Clone, Debug)]
pub struct CheckJsonOutput {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_blake3: Option<String>,
    pub violations: Vec<InheritanceViolation>,
    pub warnings: Vec<ResolveWarning>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<JsonDiagnostic>,
}

impl CheckJsonOutput {
    /// `ok` is false when any violation was found or any node had to be skipped.
    pub fn from_build(build: &Build) -> Self {
        let errors: Vec<JsonDiagnostic> = build
            .node_errors
            .iter()
            .map(|err| JsonDiagnostic::from_location(err.to_string(), err.location().clone()))
            .collect();
        CheckJsonOutput {
            ok: build.violations.is_empty() && errors.is_empty(),
            hash_blake3: Some(build.bundle.hash_blake3.clone()),
            violations: build.violations.clone(),
            warnings: build.warnings.clone(),
            errors,
        }
    }

    pub fn error(err: DesignError) -> Self {
        CheckJsonOutput {
            ok: false,
            hash_blake3: None,
            violations: Vec::new(),
            warnings: Vec::new(),
            errors: design_error_to_reports(err),
        }
    }

    pub fn into_string(self) -> String {
        serde_json::to_string_pretty(&self).unwrap_or_else(|e| {
            format!(r#"{{"ok":false,"errors":[{{"message":"report serialization: {e}"}}]}}"#)
        })
    }
}

/// Flatten an error into diagnostics; schema failures yield one entry per detail.
pub fn design_error_to_reports(err: DesignError) -> Vec<JsonDiagnostic> {
    let display_message = err.to_string();
    match err {
        DesignError::Schema {
            details, location, ..
        } => {
            if details.is_empty() {
                vec![JsonDiagnostic::from_location(display_message, location)]
            } else {
                details
                    .into_iter()
                    .map(|detail| JsonDiagnostic::from_location(detail.message, detail.location))
                    .collect()
            }
        }
        DesignError::Parse { location, .. }
        | DesignError::UnknownNodeKind { location, .. }
        | DesignError::UnknownEventType { location, .. }
        | DesignError::DuplicateNode { location, .. }
        | DesignError::DuplicateConnector { location, .. }
        | DesignError::MalformedTimestamp { location, .. }
        | DesignError::MissingField { location, .. }
        | DesignError::InvalidValue { location, .. }
        | DesignError::Internal { location, .. } => {
            vec![JsonDiagnostic::from_location(display_message, location)]
        }
    }
}
