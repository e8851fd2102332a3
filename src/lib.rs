//! Resolve supply-chain event design diagrams into the templates an EPCIS test-data
//! generation service consumes.
//!
//! The pipeline is: [`loader`] reads a design document, [`diagram`] and [`connector`]
//! index its graph, [`event`] and [`identifier`] normalize the form payloads,
//! [`resolve`] attaches identifier supply and ancestry, [`lint`] checks inheritance
//! and [`template`] assembles the output that [`generation`] submits.
#![forbid(unsafe_code)]

pub mod connector;
pub mod diagram;
pub mod error;
pub mod event;
pub mod extension;
pub mod generation;
pub mod identifier;
pub mod json_output;
pub mod lint;
pub mod loader;
pub mod model;
pub mod resolve;
pub mod template;
pub mod timestamp;
pub mod util;

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use crate::{
    connector::ConnectorLedger,
    diagram::{DiagramModel, NodeId, NodeKind},
    error::{DesignError, Result},
    event::{EventRecord, normalize_event},
    identifier::{IdentifierRecord, normalize_identifier},
    lint::{InheritanceViolation, check_inheritance},
    model::DesignDoc,
    resolve::{ResolveOptions, ResolveWarning, resolve},
    template::{TemplateBundle, assemble},
    timestamp::UtcOffset,
};

pub use generation::{GenerationClient, SubmissionError};
pub use loader::{load_design_from_path, load_design_from_str};
pub use template::Template;

#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub resolve: ResolveOptions,
    pub utc_offset: UtcOffset,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            resolve: ResolveOptions::default(),
            utc_offset: UtcOffset::UTC,
        }
    }
}

/// Result of [`build_template`]: the template plus everything worth telling the user.
#[derive(Debug)]
pub struct Build {
    pub bundle: TemplateBundle,
    pub violations: Vec<InheritanceViolation>,
    pub warnings: Vec<ResolveWarning>,
    /// Nodes whose event type or form payload could not be read; they are left out of
    /// the template.
    pub node_errors: Vec<DesignError>,
}

impl Build {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.node_errors.is_empty()
    }
}

/// Run the whole pipeline over a loaded design document.
///
/// A structurally broken diagram or connector list fails the build. A bad form or an
/// unknown event type on a single node only drops that node and is reported in
/// [`Build::node_errors`]; links to missing nodes become `missing_node` warnings.
pub fn build_template(doc: &DesignDoc, options: &BuildOptions) -> Result<Build> {
    let (diagram, mut node_errors) = DiagramModel::from_doc(&doc.diagram)?;
    let connectors = ConnectorLedger::from_docs(&doc.connectors)?;
    debug!(
        nodes = doc.diagram.nodes.len(),
        connectors = doc.connectors.len(),
        dropped_links = diagram.dangling_links().len(),
        "diagram indexed"
    );

    let event_forms: HashMap<NodeId, (usize, &model::EventFormDoc)> = doc
        .events
        .iter()
        .enumerate()
        .map(|(idx, form)| (form.node_id, (idx, form)))
        .collect();
    let mut events: BTreeMap<NodeId, EventRecord> = BTreeMap::new();
    for node in diagram.nodes_of_kind(NodeKind::Event) {
        let Some((idx, form)) = event_forms.get(&node.form_id) else {
            continue;
        };
        match normalize_event(node, form, &format!("events[{idx}]")) {
            Ok(record) => {
                events.insert(node.id, record);
            }
            Err(err) => {
                warn!(node = node.id, "event skipped: {err}");
                node_errors.push(err);
            }
        }
    }

    let identifier_forms: HashMap<NodeId, (usize, &model::IdentifierFormDoc)> = doc
        .identifiers
        .iter()
        .enumerate()
        .map(|(idx, form)| (form.identifiers_id, (idx, form)))
        .collect();
    let mut identifiers: BTreeMap<NodeId, IdentifierRecord> = BTreeMap::new();
    for node in diagram
        .nodes()
        .filter(|n| matches!(n.kind, NodeKind::Identifier | NodeKind::ParentIdentifier))
    {
        let Some((idx, form)) = identifier_forms.get(&node.form_id) else {
            continue;
        };
        match normalize_identifier(node, form, &format!("identifiers[{idx}]")) {
            Ok(record) => {
                identifiers.insert(node.id, record);
            }
            Err(err) => {
                warn!(node = node.id, "identifier skipped: {err}");
                node_errors.push(err);
            }
        }
    }

    let resolution = resolve(
        &diagram,
        &connectors,
        &events,
        &identifiers,
        &options.resolve,
    );
    let resolved = resolution.apply(events.values());
    let violations = check_inheritance(&resolved);
    for violation in &violations {
        warn!(event = violation.event_id, "{violation}");
    }

    let template = assemble(
        resolved,
        identifiers.into_values().collect(),
        options.utc_offset,
    );
    let bundle = TemplateBundle::new(template)?;
    info!(
        events = bundle.template.events.len(),
        identifiers = bundle.template.identifiers.len(),
        violations = violations.len(),
        hash = %bundle.hash_blake3,
        "template built"
    );
    Ok(Build {
        bundle,
        violations,
        warnings: resolution.warnings,
        node_errors,
    })
}
