use std::{
    fmt,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Where in a design document an error was detected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesignErrorLocation {
    pub path: Option<String>,
    pub source_path: Option<PathBuf>,
    pub line: Option<usize>,
    pub col: Option<usize>,
    pub json_pointer: Option<String>,
}

impl DesignErrorLocation {
    pub fn at_path(path: String) -> Self {
        DesignErrorLocation {
            path: Some(path),
            ..Default::default()
        }
    }

    pub fn at_path_with_position(path: String, line: Option<usize>, col: Option<usize>) -> Self {
        DesignErrorLocation {
            path: Some(path),
            line,
            col,
            ..Default::default()
        }
    }

    pub fn with_source_path(mut self, source_path: Option<&Path>) -> Self {
        self.source_path = source_path.map(Path::to_path_buf);
        self
    }

    pub fn with_json_pointer(mut self, pointer: Option<String>) -> Self {
        self.json_pointer = pointer;
        self
    }

    /// Human readable `path:line:col` form, if anything is known.
    pub fn describe(&self) -> Option<String> {
        let base = self
            .source_path
            .as_ref()
            .map(|p| p.display().to_string())
            .or_else(|| self.path.clone())?;
        Some(match (self.line, self.col) {
            (Some(line), Some(col)) => format!("{base}:{line}:{col}"),
            (Some(line), None) => format!("{base}:{line}"),
            _ => base,
        })
    }
}

impl fmt::Display for DesignErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.describe() {
            Some(text) => f.write_str(&text),
            None => f.write_str("<unknown>"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchemaErrorDetail {
    pub message: String,
    pub location: DesignErrorLocation,
}

#[derive(Debug, Error)]
pub enum DesignError {
    #[error("parse error at {location}: {message}")]
    Parse {
        message: String,
        location: DesignErrorLocation,
    },
    #[error("Schema validation failed:\n{message}")]
    Schema {
        message: String,
        details: Vec<SchemaErrorDetail>,
        location: DesignErrorLocation,
    },
    #[error("node '{node_id}' has unknown kind '{name}' (expected Events, Identifiers or ParentIdentifiers)")]
    UnknownNodeKind {
        node_id: String,
        name: String,
        location: DesignErrorLocation,
    },
    #[error("unknown event type '{value}' at {location}")]
    UnknownEventType {
        value: String,
        location: DesignErrorLocation,
    },
    #[error("node id {node_id} appears more than once at {location}")]
    DuplicateNode {
        node_id: u32,
        location: DesignErrorLocation,
    },
    #[error("connector {source_id} -> {target_id} is declared more than once")]
    DuplicateConnector {
        source_id: u32,
        target_id: u32,
        location: DesignErrorLocation,
    },
    #[error("malformed timestamp '{value}' at {location}")]
    MalformedTimestamp {
        value: String,
        location: DesignErrorLocation,
    },
    #[error("required field '{field}' missing at {location}")]
    MissingField {
        field: &'static str,
        location: DesignErrorLocation,
    },
    #[error("invalid value for '{field}' at {location}: {detail}")]
    InvalidValue {
        field: &'static str,
        detail: String,
        location: DesignErrorLocation,
    },
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        location: DesignErrorLocation,
    },
}

impl DesignError {
    pub fn location(&self) -> &DesignErrorLocation {
        match self {
            DesignError::Parse { location, .. }
            | DesignError::Schema { location, .. }
            | DesignError::UnknownNodeKind { location, .. }
            | DesignError::UnknownEventType { location, .. }
            | DesignError::DuplicateNode { location, .. }
            | DesignError::DuplicateConnector { location, .. }
            | DesignError::MalformedTimestamp { location, .. }
            | DesignError::MissingField { location, .. }
            | DesignError::InvalidValue { location, .. }
            | DesignError::Internal { location, .. } => location,
        }
    }
}

pub type Result<T> = std::result::Result<T, DesignError>;
