use std::collections::BTreeMap;

use crate::{
    diagram::NodeId,
    error::{DesignError, DesignErrorLocation, Result},
    model::ConnectorDoc,
};

/// Per-edge counts the user entered on a connector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectorInfo {
    pub source: NodeId,
    pub target: NodeId,
    pub epc_count: u32,
    pub class_count: u32,
    pub quantity: u32,
    pub inherit_parent_count: u32,
}

impl From<&ConnectorDoc> for ConnectorInfo {
    fn from(doc: &ConnectorDoc) -> Self {
        ConnectorInfo {
            source: doc.source,
            target: doc.target,
            epc_count: doc.epc_count,
            class_count: doc.class_count,
            quantity: doc.quantity,
            inherit_parent_count: doc.inherit_parent_count,
        }
    }
}

/// Connector rows keyed by `(source, target)`; at most one row per pair.
#[derive(Debug, Clone, Default)]
pub struct ConnectorLedger {
    rows: BTreeMap<(NodeId, NodeId), ConnectorInfo>,
}

impl ConnectorLedger {
    pub fn from_docs(docs: &[ConnectorDoc]) -> Result<Self> {
        let mut rows = BTreeMap::new();
        for (idx, doc) in docs.iter().enumerate() {
            let info = ConnectorInfo::from(doc);
            if rows.insert((info.source, info.target), info).is_some() {
                return Err(DesignError::DuplicateConnector {
                    source_id: info.source,
                    target_id: info.target,
                    location: DesignErrorLocation::at_path(format!("connectors[{idx}]"))
                        .with_json_pointer(Some(format!("/connectors/{idx}"))),
                });
            }
        }
        Ok(ConnectorLedger { rows })
    }

    pub fn get(&self, source: NodeId, target: NodeId) -> Option<&ConnectorInfo> {
        self.rows.get(&(source, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(source: u32, target: u32, epc_count: u32) -> ConnectorDoc {
        ConnectorDoc {
            source,
            target,
            epc_count,
            ..Default::default()
        }
    }

    #[test]
    fn looks_up_by_pair() {
        let ledger = ConnectorLedger::from_docs(&[row(2, 1, 5), row(1, 2, 3)]).unwrap();
        assert_eq!(ledger.get(2, 1).map(|c| c.epc_count), Some(5));
        assert_eq!(ledger.get(1, 2).map(|c| c.epc_count), Some(3));
        assert!(ledger.get(3, 1).is_none());
    }

    #[test]
    fn rejects_second_row_for_same_pair() {
        let err = ConnectorLedger::from_docs(&[row(2, 1, 5), row(2, 1, 6)]).unwrap_err();
        assert!(matches!(
            err,
            DesignError::DuplicateConnector {
                source_id: 2,
                target_id: 1,
                ..
            }
        ));
        assert_eq!(err.location().json_pointer.as_deref(), Some("/connectors/1"));
    }
}
