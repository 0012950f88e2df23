//! Flattening a graph-form document into the execution payload.
//!
//! Each node becomes a `{class_type, inputs}` entry: widget slots are named
//! through the schema registry, then declared input connectors are resolved
//! through the link table to `[sourceNodeId, outputIndex]` references. A
//! single pass, stateless; calling it twice on the same document yields
//! structurally identical output.

use serde_json::Value;
use tracing::{debug, warn};

use crate::document::{GraphNode, WorkflowDocument};
use crate::payload::{ExecutionPayload, NodeConnection, NodeMeta, PayloadInput, PayloadNode};
use crate::schema::{self, FieldSpec, NodeSchema};

/// The payload plus any advisory warnings produced while building it.
///
/// Warnings never block submission; a payload with incompletely mapped
/// inputs is still handed to the backend, whose validation error is the
/// signal of a bad mapping.
#[derive(Clone, Debug, Default)]
pub struct TransformOutcome {
    pub payload: ExecutionPayload,
    pub warnings: Vec<String>,
}

/// Converts a workflow document into the flat execution format.
pub fn to_execution_payload(document: &WorkflowDocument) -> TransformOutcome {
    let mut outcome = TransformOutcome::default();

    let nodes = match &document.nodes {
        Some(nodes) => nodes,
        None => {
            outcome
                .warnings
                .push("workflow document has no \"nodes\" array; payload is empty".to_string());
            return outcome;
        }
    };

    for node in nodes {
        // Note nodes are annotations; the backend rejects them.
        if node.node_type == "Note" {
            continue;
        }
        let mut payload_node = PayloadNode {
            class_type: node.class_type().to_string(),
            meta: node.title.clone().map(|title| NodeMeta { title }),
            inputs: Default::default(),
        };

        match schema::schema_for(&node.node_type) {
            Some(schema) => overlay_widget_inputs(node, schema, &mut payload_node, &mut outcome.warnings),
            None => {
                if node
                    .widgets_values
                    .as_ref()
                    .map(|w| !w.is_empty())
                    .unwrap_or(false)
                {
                    warn!(
                        node = %node.id,
                        node_type = %node.node_type,
                        "no widget table for node type; payload inputs may be incomplete"
                    );
                    outcome.warnings.push(format!(
                        "no widget table for node type \"{}\" on node {}; payload inputs may be incomplete",
                        node.node_type, node.id
                    ));
                }
            }
        }

        resolve_connections(node, document, &mut payload_node, &mut outcome.warnings);
        outcome
            .payload
            .nodes
            .insert(node.id.to_string(), payload_node);
    }
    outcome
}

fn overlay_widget_inputs(
    node: &GraphNode,
    schema: &NodeSchema,
    payload_node: &mut PayloadNode,
    warnings: &mut Vec<String>,
) {
    for field in schema.fields {
        if !field.emit {
            continue;
        }
        let raw = if !field.from_widget {
            None
        } else {
            node.widgets_values
                .as_ref()
                .and_then(|widgets| {
                    if schema.keyed {
                        widgets.key(field.name)
                    } else {
                        widgets.index(field.index)
                    }
                })
                .filter(|value| !value.is_null())
                .cloned()
        };

        let value = match raw {
            Some(value) => apply_sanitizer(field, value),
            None => match field.default {
                Some(default) => {
                    if field.required {
                        warn!(
                            node = %node.id,
                            field = field.name,
                            "required field missing; substituting default"
                        );
                        warnings.push(format!(
                            "node {} ({}) is missing required field \"{}\"; defaulting to {}",
                            node.id,
                            node.node_type,
                            field.name,
                            default.to_value()
                        ));
                    }
                    default.to_value()
                }
                // No value and no default policy: omit the field.
                None => continue,
            },
        };
        payload_node
            .inputs
            .insert(field.name.to_string(), PayloadInput::Value(value));
    }
}

fn apply_sanitizer(field: &FieldSpec, value: Value) -> Value {
    match field.sanitize {
        Some(sanitize) => sanitize(value),
        None => value,
    }
}

/// Resolves every wired input connector through the link table. Connection
/// entries land after the widget overlay and win name collisions, matching
/// the backend's expectation that a wired input supersedes a widget value.
fn resolve_connections(
    node: &GraphNode,
    document: &WorkflowDocument,
    payload_node: &mut PayloadNode,
    warnings: &mut Vec<String>,
) {
    let Some(slots) = &node.inputs else {
        return;
    };
    for slot in slots {
        let Some(link_id) = slot.link else {
            continue;
        };
        match document.link_by_id(link_id).and_then(|link| {
            Some(NodeConnection {
                node_id: link.source_node()?.to_string(),
                output_index: link.source_output()?,
            })
        }) {
            Some(connection) => {
                debug!(node = %node.id, input = %slot.name, source = %connection.node_id, "resolved link");
                payload_node
                    .inputs
                    .insert(slot.name.clone(), PayloadInput::Connection(connection));
            }
            None => {
                warn!(node = %node.id, input = %slot.name, link_id, "dangling link reference");
                warnings.push(format!(
                    "node {} input \"{}\" references missing link {}",
                    node.id, slot.name, link_id
                ));
            }
        }
    }
}
