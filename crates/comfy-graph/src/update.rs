//! Workflow parameter rewriting.
//!
//! Updates are addressed as `"<nodeId>.<fieldName>" -> value` and routed
//! through the same schema registry the analyzer reads. The original
//! document is never mutated; the rewrite happens on a deep copy.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::document::{WidgetValues, WorkflowDocument};
use crate::schema;

/// A set of parameter writes, keyed by `"<nodeId>.<fieldName>"`.
pub type ParamUpdates = BTreeMap<String, Value>;

/// The result of applying an update map.
///
/// Unmapped fields are dropped rather than raised, but the drop is visible
/// here: `skipped` holds the exact keys that did not land, so callers do not
/// have to scrape logs to distinguish "applied" from "ignored".
#[derive(Clone, Debug)]
pub struct UpdateOutcome {
    pub document: WorkflowDocument,
    pub applied: usize,
    pub skipped: Vec<String>,
}

/// Applies `updates` to a deep copy of `document`.
///
/// Routing per key, in order:
/// 1. the node's schema entry for the field name, writing the mapped widget
///    slot (positional index or object key);
/// 2. the `widget_<N>` escape hatch, writing index `N` directly;
/// 3. otherwise the update is dropped with a warning.
///
/// Values are written as given; declared constraints (min/max/choices) are
/// not enforced here.
pub fn apply_updates(document: &WorkflowDocument, updates: &ParamUpdates) -> UpdateOutcome {
    let mut outcome = UpdateOutcome {
        document: document.clone(),
        applied: 0,
        skipped: Vec::new(),
    };

    for (key, value) in updates {
        let Some((node_id, field_name)) = key.split_once('.') else {
            warn!(key = %key, "malformed update key; expected \"<nodeId>.<fieldName>\"");
            outcome.skipped.push(key.clone());
            continue;
        };
        if apply_one(&mut outcome.document, node_id, field_name, value) {
            outcome.applied += 1;
        } else {
            outcome.skipped.push(key.clone());
        }
    }
    outcome
}

fn apply_one(document: &mut WorkflowDocument, node_id: &str, field_name: &str, value: &Value) -> bool {
    let Some(node) = document.node_mut(node_id) else {
        warn!(node_id, field_name, "update targets a node that does not exist");
        return false;
    };

    if let Some(schema) = schema::schema_for(&node.node_type) {
        if let Some(field) = schema.field(field_name) {
            debug!(node_id, field = field.name, "writing mapped widget slot");
            if schema.keyed {
                let widgets = node
                    .widgets_values
                    .get_or_insert_with(|| WidgetValues::Keyed(Default::default()));
                if widgets.set_key(field.name, value.clone()) {
                    return true;
                }
                warn!(
                    node_id,
                    field = field.name,
                    "widget store shape does not match the schema; update dropped"
                );
                return false;
            }
            let widgets = node
                .widgets_values
                .get_or_insert_with(|| WidgetValues::List(Vec::new()));
            if widgets.set_index(field.index, value.clone()) {
                return true;
            }
            warn!(
                node_id,
                field = field.name,
                "widget store shape does not match the schema; update dropped"
            );
            return false;
        }
    }

    // Generic escape hatch: `widget_<N>` addresses a positional slot directly
    // on any node type.
    if let Some(index) = field_name
        .strip_prefix("widget_")
        .and_then(|n| n.parse::<usize>().ok())
    {
        let widgets = node
            .widgets_values
            .get_or_insert_with(|| WidgetValues::List(Vec::new()));
        if widgets.set_index(index, value.clone()) {
            debug!(node_id, index, "writing generic widget slot");
            return true;
        }
        warn!(node_id, index, "generic index write on an object-keyed store; update dropped");
        return false;
    }

    warn!(
        node_id,
        field_name,
        node_type = %node.node_type,
        "no widget mapping for field on this node type; update dropped"
    );
    false
}
