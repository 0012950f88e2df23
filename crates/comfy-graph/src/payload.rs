//! The flattened, backend-ready representation of a workflow document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use crate::document::DocumentError;

/// A reference to another node's output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, u32)")]
#[serde(into = "(String, u32)")]
pub struct NodeConnection {
    /// The node id of the node providing the input.
    pub node_id: String,
    /// The index of the output from the node providing the input.
    pub output_index: u32,
}

impl From<(String, u32)> for NodeConnection {
    fn from((node_id, output_index): (String, u32)) -> Self {
        Self {
            node_id,
            output_index,
        }
    }
}

impl From<NodeConnection> for (String, u32) {
    fn from(
        NodeConnection {
            node_id,
            output_index,
        }: NodeConnection,
    ) -> Self {
        (node_id, output_index)
    }
}

/// One entry in a payload node's `inputs` map: either a connection reference
/// or a literal widget value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadInput {
    Connection(NodeConnection),
    Value(Value),
}

impl PayloadInput {
    pub fn value(&self) -> Option<&Value> {
        match self {
            PayloadInput::Connection(_) => None,
            PayloadInput::Value(value) => Some(value),
        }
    }

    pub fn connection(&self) -> Option<&NodeConnection> {
        match self {
            PayloadInput::Connection(connection) => Some(connection),
            PayloadInput::Value(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeMeta {
    pub title: String,
}

/// One node in the execution payload.
#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayloadNode {
    pub class_type: String,
    #[serde(rename = "_meta")]
    pub meta: Option<NodeMeta>,
    #[serde(default)]
    pub inputs: BTreeMap<String, PayloadInput>,
}

/// The flat `{nodeId: {class_type, inputs}}` structure the backend accepts.
/// Built fresh from a workflow document and never mutated in place.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionPayload {
    pub nodes: BTreeMap<String, PayloadNode>,
}

impl ExecutionPayload {
    /// Accepts a document that is already in the flat API format. The
    /// original tooling passed such documents through untouched; this is
    /// the typed equivalent.
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        if !value.is_object() {
            return Err(DocumentError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn get(&self, node_id: &str) -> Option<&PayloadNode> {
        self.nodes.get(node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
