//! Workflow analysis: a read-only projection of every configurable widget
//! slot in a document, plus polarity classification of ambiguous text slots.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use tracing::{debug, warn};

use crate::document::{GraphNode, WidgetValues, WorkflowDocument};
use crate::heuristics::{Polarity, PromptClassifier, Signal};
use crate::schema::{self, FieldSpec, Semantic, ValueKind};

/// A named, typed view of one widget slot. Recomputed in full on every
/// analysis call; has no lifecycle of its own.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigurableParam {
    pub node_id: String,
    pub node_type: String,
    pub name: String,
    pub semantic: Semantic,
    pub kind: ValueKind,
    pub current: Option<Value>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    pub required: bool,
}

/// A classified text-encode slot.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TextNode {
    pub node_id: String,
    pub title: Option<String>,
    pub text: String,
    pub is_negative_prompt: bool,
    pub signal: Signal,
    pub confidence: f32,
}

/// The result of analyzing a workflow document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Analysis {
    pub has_valid_structure: bool,
    pub configurable: Vec<ConfigurableParam>,
    pub text_nodes: Vec<TextNode>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Analyzes a document with the default prompt classifier.
pub fn analyze(document: &WorkflowDocument) -> Analysis {
    analyze_with(document, &PromptClassifier::default())
}

/// Analyzes a document, dispatching each node on its type to the schema
/// registry and falling back to a generic per-index extraction for
/// unrecognized types.
///
/// This is a pure function of its inputs: a structurally invalid document
/// (no `nodes` array) yields an empty result with an error entry rather
/// than a failure.
pub fn analyze_with(document: &WorkflowDocument, classifier: &PromptClassifier) -> Analysis {
    let mut analysis = Analysis::default();

    let nodes = match &document.nodes {
        Some(nodes) => nodes,
        None => {
            analysis
                .errors
                .push("workflow document has no \"nodes\" array".to_string());
            warn!("analysis requested for a document without a nodes array");
            return analysis;
        }
    };
    analysis.has_valid_structure = true;

    for node in nodes {
        // Note nodes are purely annotative; they carry no parameters worth
        // surfacing and never reach the backend.
        if node.node_type == "Note" {
            continue;
        }
        match schema::schema_for(&node.node_type) {
            Some(schema) => {
                debug!(node = %node.id, node_type = %node.node_type, "extracting schema parameters");
                for field in schema.fields.iter().filter(|f| f.from_widget) {
                    analysis
                        .configurable
                        .push(extract_param(node, field, schema.keyed, classifier, &mut analysis.text_nodes));
                }
            }
            None => extract_generic(node, &mut analysis),
        }
    }
    analysis
}

fn extract_param(
    node: &GraphNode,
    field: &FieldSpec,
    keyed: bool,
    classifier: &PromptClassifier,
    text_nodes: &mut Vec<TextNode>,
) -> ConfigurableParam {
    let current = node.widgets_values.as_ref().and_then(|widgets| {
        if keyed {
            widgets.key(field.name)
        } else {
            widgets.index(field.index)
        }
        .cloned()
    });

    // An ambiguous prompt slot (one text field serving either polarity) gets
    // classified; slots with fixed polarity keep their table semantic.
    let mut semantic = field.semantic;
    if semantic == Semantic::Prompt && field.name == "text" {
        if let Some(text) = current.as_ref().and_then(Value::as_str) {
            let verdict = classifier.classify(node.title.as_deref(), text);
            if verdict.polarity == Polarity::Negative {
                semantic = Semantic::NegativePrompt;
            }
            text_nodes.push(TextNode {
                node_id: node.id.to_string(),
                title: node.title.clone(),
                text: text.to_string(),
                is_negative_prompt: verdict.polarity == Polarity::Negative,
                signal: verdict.signal,
                confidence: verdict.confidence,
            });
        }
    }

    ConfigurableParam {
        node_id: node.id.to_string(),
        node_type: node.node_type.clone(),
        name: field.name.to_string(),
        semantic,
        kind: field.kind,
        current,
        min: field.min,
        max: field.max,
        choices: field.choices.iter().map(|c| c.to_string()).collect(),
        required: field.required,
    }
}

/// Unrecognized node types get one opaque parameter per widget slot so the
/// caller can still see and address them.
fn extract_generic(node: &GraphNode, analysis: &mut Analysis) {
    let widgets = match &node.widgets_values {
        Some(widgets) if !widgets.is_empty() => widgets,
        _ => return,
    };
    warn!(
        node = %node.id,
        node_type = %node.node_type,
        "unknown node type; exposing generic widget parameters"
    );
    analysis.warnings.push(format!(
        "unknown node type \"{}\" on node {}: exposing {} generic widget parameters",
        node.node_type,
        node.id,
        widgets.len()
    ));
    match widgets {
        WidgetValues::List(values) => {
            for (index, value) in values.iter().enumerate() {
                analysis.configurable.push(ConfigurableParam {
                    node_id: node.id.to_string(),
                    node_type: node.node_type.clone(),
                    name: format!("widget_{}", index),
                    semantic: Semantic::Generic,
                    kind: kind_of(value),
                    current: Some(value.clone()),
                    min: None,
                    max: None,
                    choices: Vec::new(),
                    required: false,
                });
            }
        }
        WidgetValues::Keyed(map) => {
            for (key, value) in map {
                analysis.configurable.push(ConfigurableParam {
                    node_id: node.id.to_string(),
                    node_type: node.node_type.clone(),
                    name: key.clone(),
                    semantic: Semantic::Generic,
                    kind: kind_of(value),
                    current: Some(value.clone()),
                    min: None,
                    max: None,
                    choices: Vec::new(),
                    required: false,
                });
            }
        }
    }
}

fn kind_of(value: &Value) -> ValueKind {
    match value {
        Value::Bool(_) => ValueKind::Bool,
        Value::Number(n) if n.is_i64() || n.is_u64() => ValueKind::Int,
        Value::Number(_) => ValueKind::Float,
        _ => ValueKind::Text,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> WorkflowDocument {
        WorkflowDocument::from_value(value).unwrap()
    }

    #[test]
    fn empty_nodes_array_is_valid_and_empty() {
        let analysis = analyze(&doc(json!({"nodes": []})));
        assert!(analysis.has_valid_structure);
        assert!(analysis.configurable.is_empty());
        assert!(analysis.errors.is_empty());
    }

    #[test]
    fn missing_nodes_key_is_invalid_with_errors() {
        let analysis = analyze(&doc(json!({"links": []})));
        assert!(!analysis.has_valid_structure);
        assert!(!analysis.errors.is_empty());
        assert!(analysis.configurable.is_empty());
    }

    #[test]
    fn ksampler_parameters_surface_steps_and_cfg() {
        let analysis = analyze(&doc(json!({
            "nodes": [{
                "id": "82",
                "type": "KSampler",
                "widgets_values": [12345, "fixed", 20, 7.0, "euler", "normal", 1.0]
            }]
        })));
        let steps = analysis
            .configurable
            .iter()
            .find(|p| p.name == "steps")
            .expect("steps parameter");
        assert_eq!(steps.current, Some(json!(20)));
        assert_eq!(steps.semantic, Semantic::Steps);
        let cfg = analysis
            .configurable
            .iter()
            .find(|p| p.name == "cfg")
            .expect("cfg parameter");
        assert_eq!(cfg.current, Some(json!(7.0)));
    }

    #[test]
    fn negative_titled_text_encode_is_classified_negative() {
        let analysis = analyze(&doc(json!({
            "nodes": [{
                "id": "16",
                "type": "CLIPTextEncode",
                "title": "Negative Prompt",
                "widgets_values": ["blurry, low quality"]
            }]
        })));
        let text_node = analysis.text_nodes.first().expect("text node");
        assert!(text_node.is_negative_prompt);
        assert_eq!(text_node.signal, Signal::Title);
        let param = analysis.configurable.first().unwrap();
        assert_eq!(param.semantic, Semantic::NegativePrompt);
    }

    #[test]
    fn untitled_text_encode_falls_back_to_keywords() {
        let analysis = analyze(&doc(json!({
            "nodes": [{
                "id": "7",
                "type": "CLIPTextEncode",
                "widgets_values": ["watermark, jpeg artifacts"]
            }]
        })));
        let text_node = analysis.text_nodes.first().unwrap();
        assert!(text_node.is_negative_prompt);
        assert_eq!(text_node.signal, Signal::Keywords);
    }

    #[test]
    fn unknown_type_yields_generic_parameters_and_warning() {
        let analysis = analyze(&doc(json!({
            "nodes": [{
                "id": "99",
                "type": "FooBar",
                "widgets_values": [1, "x", true]
            }]
        })));
        assert_eq!(analysis.configurable.len(), 3);
        let names: Vec<_> = analysis.configurable.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["widget_0", "widget_1", "widget_2"]);
        assert_eq!(analysis.configurable[0].kind, ValueKind::Int);
        assert_eq!(analysis.configurable[1].kind, ValueKind::Text);
        assert_eq!(analysis.configurable[2].kind, ValueKind::Bool);
        assert_eq!(analysis.warnings.len(), 1);
        assert!(analysis.warnings[0].contains("FooBar"));
    }

    #[test]
    fn note_nodes_are_skipped() {
        let analysis = analyze(&doc(json!({
            "nodes": [{"id": 1, "type": "Note", "widgets_values": ["remember the vae"]}]
        })));
        assert!(analysis.configurable.is_empty());
        assert!(analysis.warnings.is_empty());
    }

    #[test]
    fn keyed_store_parameters_read_by_name() {
        let analysis = analyze(&doc(json!({
            "nodes": [{
                "id": 30,
                "type": "VHS_VideoCombine",
                "widgets_values": {"frame_rate": 24, "pingpong": false}
            }]
        })));
        let frame_rate = analysis
            .configurable
            .iter()
            .find(|p| p.name == "frame_rate")
            .unwrap();
        assert_eq!(frame_rate.current, Some(json!(24)));
        assert_eq!(frame_rate.semantic, Semantic::Fps);
        // Keys the document does not carry still surface, with no current value.
        let format = analysis
            .configurable
            .iter()
            .find(|p| p.name == "format")
            .unwrap();
        assert_eq!(format.current, None);
    }

    #[test]
    fn classifier_fixtures_flow_through_analysis() {
        let classifier = PromptClassifier::new(&[], &["orange"]).unwrap();
        let analysis = analyze_with(
            &doc(json!({
                "nodes": [{
                    "id": "6",
                    "type": "CLIPTextEncode",
                    "widgets_values": ["an orange cat"]
                }]
            })),
            &classifier,
        );
        assert!(analysis.text_nodes[0].is_negative_prompt);
    }
}
