use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::{self, NodeClass};

/// Errors that can occur while parsing a workflow document.
///
/// These cover malformed input only. Once a document has been parsed,
/// the analyze/update/transform operations never fail; they degrade to
/// partial results with advisory warnings.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The top-level JSON value was not an object.
    #[error("workflow JSON is not an object")]
    NotAnObject,
    /// The JSON could not be deserialized into a workflow document.
    #[error("failed to parse workflow JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A node id as it appears in workflow exports: numeric in most graph
/// exports, string in some hand-edited documents.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Num(i64),
    Str(String),
}

impl NodeId {
    /// Whether this id matches its canonical string form.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            NodeId::Num(n) => {
                // Avoid allocating for the common numeric case.
                key.parse::<i64>().map(|k| k == *n).unwrap_or(false)
            }
            NodeId::Str(s) => s == key,
        }
    }

    pub(crate) fn from_value(value: &Value) -> Option<NodeId> {
        match value {
            Value::Number(n) => n.as_i64().map(NodeId::Num),
            Value::String(s) => Some(NodeId::Str(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Num(n) => write!(f, "{}", n),
            NodeId::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for NodeId {
    fn from(n: i64) -> Self {
        NodeId::Num(n)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId::Str(s.to_string())
    }
}

/// The widget-value store of a node.
///
/// Most node types use a positional array whose slot meanings are
/// determined entirely by the node type; a minority of newer types
/// (e.g. `VHS_VideoCombine`) use an object keyed by field name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WidgetValues {
    List(Vec<Value>),
    Keyed(Map<String, Value>),
}

impl WidgetValues {
    pub fn index(&self, idx: usize) -> Option<&Value> {
        match self {
            WidgetValues::List(values) => values.get(idx),
            WidgetValues::Keyed(_) => None,
        }
    }

    pub fn key(&self, key: &str) -> Option<&Value> {
        match self {
            WidgetValues::List(_) => None,
            WidgetValues::Keyed(map) => map.get(key),
        }
    }

    /// Writes `value` at `idx`, padding intermediate slots with null.
    /// Returns false if this store is object-keyed.
    pub fn set_index(&mut self, idx: usize, value: Value) -> bool {
        match self {
            WidgetValues::List(values) => {
                if idx >= values.len() {
                    values.resize(idx + 1, Value::Null);
                }
                values[idx] = value;
                true
            }
            WidgetValues::Keyed(_) => false,
        }
    }

    /// Writes `value` under `key`. Returns false if this store is positional.
    pub fn set_key(&mut self, key: &str, value: Value) -> bool {
        match self {
            WidgetValues::List(_) => false,
            WidgetValues::Keyed(map) => {
                map.insert(key.to_string(), value);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            WidgetValues::List(values) => values.len(),
            WidgetValues::Keyed(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A declared input connector on a node. `link` references an entry in the
/// document's link table when the input is wired to another node's output.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputSlot {
    pub name: String,
    #[serde(default)]
    pub link: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A link table entry. Graph exports store links as heterogeneous arrays
/// (`[link_id, source_node, source_output, target_node, target_input, type]`);
/// only the first three elements carry meaning for payload construction, so
/// the raw array is kept intact for round-tripping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Link(pub Vec<Value>);

impl Link {
    pub fn id(&self) -> Option<i64> {
        self.0.first().and_then(Value::as_i64)
    }

    pub fn source_node(&self) -> Option<NodeId> {
        self.0.get(1).and_then(NodeId::from_value)
    }

    pub fn source_output(&self) -> Option<u32> {
        self.0.get(2).and_then(Value::as_u64).map(|v| v as u32)
    }
}

/// One step in a workflow graph. The `type` tag selects which positional
/// table applies to `widgets_values`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<InputSlot>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widgets_values: Option<WidgetValues>,
    /// Layout and UI fields (`pos`, `size`, `flags`, …) preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GraphNode {
    /// The class type submitted to the backend. Some exports carry an
    /// explicit `class_type` distinct from the display `type`.
    pub fn class_type(&self) -> &str {
        self.extra
            .get("class_type")
            .and_then(Value::as_str)
            .unwrap_or(&self.node_type)
    }

    /// Capability class of this node, resolved from the schema registry.
    pub fn node_class(&self) -> NodeClass {
        schema::node_class(&self.node_type)
    }
}

/// A graph-shaped job description: an ordered sequence of nodes plus a link
/// table. Supplied externally and returned to the caller as a modified copy;
/// the operations in this crate never mutate a document in place.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorkflowDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<GraphNode>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
    /// `extra_data`, version markers, and anything else the export carries.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkflowDocument {
    /// Parses a document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Parses a document from an in-memory JSON value.
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        if !value.is_object() {
            return Err(DocumentError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Whether the document has a `nodes` array at all. A document without
    /// one is structurally invalid but still analyzable (empty result).
    pub fn has_nodes(&self) -> bool {
        self.nodes.is_some()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes
            .as_ref()?
            .iter()
            .find(|node| node.id.matches(id))
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes
            .as_mut()?
            .iter_mut()
            .find(|node| node.id.matches(id))
    }

    pub fn link_by_id(&self, id: i64) -> Option<&Link> {
        self.links.iter().find(|link| link.id() == Some(id))
    }

    /// Whether any node belongs to a video-generation family.
    pub fn contains_video_nodes(&self) -> bool {
        self.nodes
            .as_ref()
            .map(|nodes| {
                nodes
                    .iter()
                    .any(|node| node.node_class() == NodeClass::Video)
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_graph_form_document() {
        let doc = WorkflowDocument::from_value(json!({
            "nodes": [
                {
                    "id": 3,
                    "type": "KSampler",
                    "pos": [863, 186],
                    "widgets_values": [8566257, "randomize", 20, 8.0, "euler", "normal", 1.0],
                    "inputs": [
                        {"name": "model", "type": "MODEL", "link": 1},
                        {"name": "positive", "type": "CONDITIONING", "link": 4}
                    ]
                }
            ],
            "links": [[1, 4, 0, 3, 0, "MODEL"], [4, 6, 0, 3, 1, "CONDITIONING"]],
            "extra_data": {"version": 0.4}
        }))
        .unwrap();

        let node = doc.node("3").expect("node 3");
        assert_eq!(node.node_type, "KSampler");
        assert_eq!(node.widgets_values.as_ref().unwrap().len(), 7);
        assert_eq!(doc.link_by_id(4).unwrap().source_node(), Some(NodeId::Num(6)));
        assert_eq!(doc.link_by_id(4).unwrap().source_output(), Some(0));
        assert!(doc.extra.contains_key("extra_data"));
    }

    #[test]
    fn rejects_non_object_input() {
        assert!(matches!(
            WorkflowDocument::from_value(json!([1, 2, 3])),
            Err(DocumentError::NotAnObject)
        ));
    }

    #[test]
    fn missing_nodes_key_is_parseable_but_invalid() {
        let doc = WorkflowDocument::from_value(json!({"links": []})).unwrap();
        assert!(!doc.has_nodes());
    }

    #[test]
    fn string_and_numeric_ids_both_resolve() {
        let doc = WorkflowDocument::from_value(json!({
            "nodes": [
                {"id": "82", "type": "KSampler"},
                {"id": 16, "type": "CLIPTextEncode"}
            ]
        }))
        .unwrap();
        assert!(doc.node("82").is_some());
        assert!(doc.node("16").is_some());
        assert!(doc.node("99").is_none());
    }

    #[test]
    fn keyed_widget_store_round_trips() {
        let doc = WorkflowDocument::from_value(json!({
            "nodes": [{
                "id": 30,
                "type": "VHS_VideoCombine",
                "widgets_values": {"frame_rate": 24, "format": "video/h264-mp4"}
            }]
        }))
        .unwrap();
        let node = doc.node("30").unwrap();
        let widgets = node.widgets_values.as_ref().unwrap();
        assert_eq!(widgets.key("frame_rate"), Some(&json!(24)));
        assert_eq!(widgets.index(0), None);
    }

    #[test]
    fn set_index_pads_with_null() {
        let mut widgets = WidgetValues::List(vec![json!(1)]);
        assert!(widgets.set_index(3, json!("x")));
        assert_eq!(widgets.index(1), Some(&Value::Null));
        assert_eq!(widgets.index(3), Some(&json!("x")));
    }

    #[test]
    fn document_serialization_preserves_unknown_fields() {
        let original = json!({
            "nodes": [{"id": 1, "type": "Note", "pos": [0, 0], "widgets_values": ["hi"]}],
            "links": [],
            "version": 0.4,
            "groups": []
        });
        let doc = WorkflowDocument::from_value(original.clone()).unwrap();
        let round_tripped = serde_json::to_value(&doc).unwrap();
        assert_eq!(round_tripped.get("version"), original.get("version"));
        assert_eq!(
            round_tripped["nodes"][0].get("pos"),
            original["nodes"][0].get("pos")
        );
    }
}
