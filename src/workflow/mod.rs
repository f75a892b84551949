//! Workflow model
//!
//! A [`Workflow`] is the editable, persisted unit: identity, name and the
//! action records in whatever state the editor left them. Edits go through
//! the id-based command methods. Compilation never reads a `Workflow`
//! directly; it takes a [`WorkflowSnapshot`], an immutable capture holding
//! only the active, valid nodes in execution order.

pub mod node;
pub mod record;
pub mod store;

pub use node::{
    GenericActionParams, LiquidityAddParams, LiquidityRemoveParams, NodeAction, NodeDescriptor,
    NodeKind, SwapParams, TransferParams, ValidationError,
};
pub use record::{ActionData, ActionRecord, Position};
pub use store::{MemoryWorkflowStore, SledWorkflowStore, StoreError, WorkflowStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("node '{0}' not found")]
    NodeNotFound(String),

    #[error("node '{0}' already exists")]
    DuplicateNode(String),
}

/// Named, identified collection of action records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actions: Vec<ActionRecord>,
}

impl Workflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            creation_date: Some(Utc::now()),
            actions: Vec::new(),
        }
    }

    pub fn action(&self, id: &str) -> Option<&ActionRecord> {
        self.actions.iter().find(|a| a.id == id)
    }

    fn action_mut(&mut self, id: &str) -> Result<&mut ActionRecord, WorkflowError> {
        self.actions
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| WorkflowError::NodeNotFound(id.to_string()))
    }

    /// Add a record with its `orderId` as given
    pub fn add_action(&mut self, record: ActionRecord) -> Result<(), WorkflowError> {
        if self.action(&record.id).is_some() {
            return Err(WorkflowError::DuplicateNode(record.id));
        }
        self.actions.push(record);
        Ok(())
    }

    /// Add a record ordered after the current last node
    pub fn append_action(&mut self, mut record: ActionRecord) -> Result<(), WorkflowError> {
        record.data.order_id = self
            .actions
            .iter()
            .map(|a| a.data.order_id)
            .max()
            .map_or(1, |last| last.max(0) + 1);
        self.add_action(record)
    }

    pub fn remove_action(&mut self, id: &str) -> Result<ActionRecord, WorkflowError> {
        let index = self
            .actions
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| WorkflowError::NodeNotFound(id.to_string()))?;
        Ok(self.actions.remove(index))
    }

    pub fn set_active(&mut self, id: &str, active: bool) -> Result<(), WorkflowError> {
        self.action_mut(id)?.data.is_active = active;
        Ok(())
    }

    pub fn rename(&mut self, id: &str, label: impl Into<String>) -> Result<(), WorkflowError> {
        self.action_mut(id)?.data.label = label.into();
        Ok(())
    }

    /// Move a node to zero-based `position` in execution order, then renumber
    pub fn move_action(&mut self, id: &str, position: usize) -> Result<(), WorkflowError> {
        self.normalize_order();
        let from = self
            .actions
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| WorkflowError::NodeNotFound(id.to_string()))?;
        let record = self.actions.remove(from);
        let to = position.min(self.actions.len());
        self.actions.insert(to, record);
        self.renumber();
        Ok(())
    }

    /// Stable-sort records by `orderId` and renumber them densely from 1
    pub fn normalize_order(&mut self) {
        self.actions.sort_by_key(|a| a.data.order_id);
        self.renumber();
    }

    fn renumber(&mut self) {
        for (i, action) in self.actions.iter_mut().enumerate() {
            action.data.order_id = i as i64 + 1;
        }
    }
}

/// A node excluded from compilation and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeWarning {
    pub node_id: String,
    pub label: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: ValidationError,
}

fn serialize_display<S: serde::Serializer>(
    error: &ValidationError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

impl std::fmt::Display for NodeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node '{}' ({}) skipped: {}", self.node_id, self.label, self.error)
    }
}

/// Immutable, compile-ready view of a workflow
///
/// Holds only active, valid nodes, stable-sorted by `orderId` (ties keep
/// list order) and renumbered densely from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSnapshot {
    pub workflow_id: String,
    pub name: String,
    nodes: Vec<NodeDescriptor>,
    warnings: Vec<NodeWarning>,
}

impl WorkflowSnapshot {
    pub fn capture(workflow: &Workflow) -> Self {
        let mut nodes = Vec::with_capacity(workflow.actions.len());
        let mut warnings = Vec::new();

        for record in &workflow.actions {
            if !record.data.is_active {
                debug!(node_id = %record.id, "Skipping inactive node");
                continue;
            }
            match record.to_descriptor() {
                Ok(node) => nodes.push(node),
                Err(error) => warnings.push(NodeWarning {
                    node_id: record.id.clone(),
                    label: record.display_label().to_string(),
                    error,
                }),
            }
        }

        Self::build(workflow.id.clone(), workflow.name.clone(), nodes, warnings)
    }

    /// Snapshot of already-typed nodes
    pub fn from_descriptors(
        workflow_id: impl Into<String>,
        name: impl Into<String>,
        descriptors: impl IntoIterator<Item = NodeDescriptor>,
    ) -> Self {
        let mut nodes = Vec::new();
        let mut warnings = Vec::new();
        for node in descriptors.into_iter().filter(|n| n.is_active) {
            match node.action.validate() {
                Ok(()) => nodes.push(node),
                Err(error) => warnings.push(NodeWarning {
                    node_id: node.id.clone(),
                    label: node.label.clone(),
                    error,
                }),
            }
        }
        Self::build(workflow_id.into(), name.into(), nodes, warnings)
    }

    fn build(
        workflow_id: String,
        name: String,
        mut nodes: Vec<NodeDescriptor>,
        warnings: Vec<NodeWarning>,
    ) -> Self {
        // sort_by_key is stable
        nodes.sort_by_key(|n| n.order_id);
        for (i, node) in nodes.iter_mut().enumerate() {
            node.order_id = i as u32 + 1;
        }
        Self {
            workflow_id,
            name,
            nodes,
            warnings,
        }
    }

    pub fn nodes(&self) -> &[NodeDescriptor] {
        &self.nodes
    }

    pub fn warnings(&self) -> &[NodeWarning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::pubkey::Pubkey;

    fn transfer(id: &str, order: i64) -> ActionRecord {
        ActionRecord::new(id, "transferNode", order)
            .with_arg("address", Pubkey::new_unique().to_string())
            .with_arg("amount", "1000")
    }

    fn ids(snapshot: &WorkflowSnapshot) -> Vec<&str> {
        snapshot.nodes().iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn test_snapshot_orders_filters_and_renumbers() {
        let mut workflow = Workflow::new("wf", "demo");
        workflow.actions = vec![
            transfer("c", 30),
            transfer("a", 10),
            transfer("inactive", 5),
            transfer("b", 10),
            ActionRecord::new("broken", "transferNode", 1),
        ];
        workflow.set_active("inactive", false).unwrap();

        let snapshot = WorkflowSnapshot::capture(&workflow);
        assert_eq!(ids(&snapshot), vec!["a", "b", "c"]);
        assert_eq!(
            snapshot.nodes().iter().map(|n| n.order_id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(snapshot.warnings().len(), 1);
        assert_eq!(snapshot.warnings()[0].node_id, "broken");
        assert_eq!(
            snapshot.warnings()[0].error,
            ValidationError::MissingParam("destinationAddress")
        );
    }

    #[test]
    fn test_commands_by_id() {
        let mut workflow = Workflow::new("wf", "demo");
        workflow.append_action(transfer("a", 0)).unwrap();
        workflow.append_action(transfer("b", 0)).unwrap();
        workflow.append_action(transfer("c", 0)).unwrap();
        assert_eq!(
            workflow.append_action(transfer("a", 0)),
            Err(WorkflowError::DuplicateNode("a".to_string()))
        );

        workflow.move_action("c", 0).unwrap();
        assert_eq!(ids(&WorkflowSnapshot::capture(&workflow)), vec!["c", "a", "b"]);

        workflow.rename("a", "First transfer").unwrap();
        assert_eq!(workflow.action("a").unwrap().display_label(), "First transfer");

        let removed = workflow.remove_action("c").unwrap();
        assert_eq!(removed.id, "c");
        assert_eq!(
            workflow.set_active("c", true),
            Err(WorkflowError::NodeNotFound("c".to_string()))
        );

        workflow.normalize_order();
        let orders: Vec<i64> = workflow.actions.iter().map(|a| a.data.order_id).collect();
        assert_eq!(orders, vec![1, 2]);
    }

    #[test]
    fn test_added_order_id_zero_is_kept() {
        let mut workflow = Workflow::new("wf", "demo");
        workflow.append_action(transfer("later", 0)).unwrap();
        workflow.add_action(transfer("first", 0)).unwrap();

        assert_eq!(workflow.action("later").unwrap().data.order_id, 1);
        assert_eq!(workflow.action("first").unwrap().data.order_id, 0);
        assert_eq!(ids(&WorkflowSnapshot::capture(&workflow)), vec!["first", "later"]);

        workflow.append_action(transfer("last", 0)).unwrap();
        assert_eq!(workflow.action("last").unwrap().data.order_id, 2);
    }

    #[test]
    fn test_workflow_document_shape() {
        let json = serde_json::json!({
            "id": "wf-1",
            "name": "Swap then LP",
            "creationDate": "2024-11-02T10:00:00Z",
            "actions": [{
                "id": "n1",
                "type": "transferNode",
                "data": { "args": {}, "orderId": 1 }
            }]
        });
        let workflow: Workflow = serde_json::from_value(json).unwrap();
        assert_eq!(workflow.name, "Swap then LP");
        assert!(workflow.creation_date.is_some());
        assert!(workflow.actions[0].data.is_active);
    }
}
