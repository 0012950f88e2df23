//! Analysis, parameter rewriting, and API-format flattening of ComfyUI
//! workflow graphs.
//!
//! A workflow document is a graph-shaped job description: typed nodes with
//! positionally significant widget values, plus a link table. The positional
//! meaning of a widget slot is determined entirely by the node's type, so
//! this crate keeps that external knowledge in one declarative
//! [schema registry](schema) and offers three interpreters over it:
//!
//! * [`analyze`] — project every configurable widget slot into a named,
//!   typed parameter list, classifying ambiguous prompt slots on the way;
//! * [`apply_updates`] — rewrite widget slots on a deep copy of the
//!   document from a `"<nodeId>.<fieldName>" -> value` map;
//! * [`to_execution_payload`] — flatten the graph into the
//!   `{nodeId: {class_type, inputs}}` format the backend executes.
//!
//! All three are pure, synchronous functions. Malformed-but-parseable input
//! degrades to partial results with advisory warnings; nothing in here
//! performs I/O or raises errors mid-operation.

mod analyze;
mod document;
pub mod heuristics;
mod overrides;
mod payload;
pub mod schema;
mod transform;
mod update;

pub use analyze::{analyze, analyze_with, Analysis, ConfigurableParam, TextNode};
pub use document::{
    DocumentError, GraphNode, InputSlot, Link, NodeId, WidgetValues, WorkflowDocument,
};
pub use heuristics::{Classification, Polarity, PromptClassifier, Signal};
pub use overrides::GenerationOverrides;
pub use payload::{ExecutionPayload, NodeConnection, NodeMeta, PayloadInput, PayloadNode};
pub use schema::{NodeClass, Semantic, ValueKind};
pub use transform::{to_execution_payload, TransformOutcome};
pub use update::{apply_updates, ParamUpdates, UpdateOutcome};

/// Structural validation summary for a document, for callers that want a
/// quick verdict without the full analysis.
#[derive(Clone, Debug)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Checks that a document has the structure the other operations expect.
pub fn validate(document: &WorkflowDocument) -> Validation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    match &document.nodes {
        None => errors.push("workflow is missing \"nodes\"".to_string()),
        Some(nodes) => {
            if nodes.is_empty() {
                warnings.push("workflow has an empty \"nodes\" array".to_string());
            }
            for node in nodes {
                if node.node_type.is_empty() {
                    errors.push(format!("node {} has an empty type tag", node.id));
                }
            }
        }
    }
    Validation {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}
