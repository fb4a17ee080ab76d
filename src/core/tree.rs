//! Purpose: Render assembled envelopes as ordered, JSON-compatible trees.
//! Exports: `interchange_json`.
//! Role: Pure serializer; assumes its input already passed assembly checks.
//! Invariants: Key sets and key order are stable; same tree, same bytes.
//! Invariants: No validation and no mutation happen here.
use serde_json::{Map, Value, json};

use crate::core::envelope::{FunctionalGroup, Interchange, TransactionSet};
use crate::core::hloop::LoopNode;
use crate::core::segment::{Element, Segment};
use crate::core::warning::Warning;

pub fn interchange_json(interchange: &Interchange) -> Value {
    let mut map = Map::new();
    map.insert("type".to_string(), json!("interchange"));
    map.insert(
        "control_number".to_string(),
        json!(interchange.control_number),
    );
    map.insert("sender".to_string(), json!(interchange.sender));
    map.insert("receiver".to_string(), json!(interchange.receiver));
    insert_warnings(&mut map, &interchange.warnings);
    map.insert(
        "groups".to_string(),
        Value::Array(interchange.groups.iter().map(group_json).collect()),
    );
    Value::Object(map)
}

fn group_json(group: &FunctionalGroup) -> Value {
    let mut map = Map::new();
    map.insert("type".to_string(), json!("functional_group"));
    map.insert("functional_code".to_string(), json!(group.functional_code));
    map.insert("control_number".to_string(), json!(group.control_number));
    insert_warnings(&mut map, &group.warnings);
    map.insert(
        "transaction_sets".to_string(),
        Value::Array(
            group
                .transaction_sets
                .iter()
                .map(transaction_set_json)
                .collect(),
        ),
    );
    Value::Object(map)
}

fn transaction_set_json(txn: &TransactionSet) -> Value {
    let mut map = Map::new();
    map.insert("type".to_string(), json!("transaction_set"));
    map.insert("id".to_string(), json!(txn.id));
    map.insert("control_number".to_string(), json!(txn.control_number));
    insert_warnings(&mut map, &txn.warnings);
    map.insert(
        "segments".to_string(),
        Value::Array(txn.loops.leading.iter().map(segment_json).collect()),
    );
    map.insert(
        "loops".to_string(),
        Value::Array(txn.loops.roots.iter().map(loop_json).collect()),
    );
    Value::Object(map)
}

fn loop_json(node: &LoopNode) -> Value {
    let mut map = Map::new();
    map.insert("type".to_string(), json!("loop"));
    map.insert("id".to_string(), json!(node.id));
    map.insert("level_code".to_string(), json!(node.level_code));
    map.insert(
        "segments".to_string(),
        Value::Array(node.segments.iter().map(segment_json).collect()),
    );
    map.insert(
        "loops".to_string(),
        Value::Array(node.children.iter().map(loop_json).collect()),
    );
    Value::Object(map)
}

// Positions are zero-padded to two digits, matching the X12 convention of
// naming fields like NM101. Empty elements stay present so positions hold.
fn segment_json(segment: &Segment) -> Value {
    let mut map = Map::new();
    map.insert("id".to_string(), json!(segment.id));
    for (idx, element) in segment.elements.iter().enumerate() {
        map.insert(format!("{:02}", idx + 1), element_json(element));
    }
    Value::Object(map)
}

fn element_json(element: &Element) -> Value {
    match element {
        Element::Value(value) => json!(value),
        Element::Composite(parts) => json!(parts),
        Element::Repeated(instances) => {
            // Wrapped in an object so a repeat of scalars is never confused
            // with a component sequence.
            json!({
                "repeat": instances
                    .iter()
                    .map(element_json)
                    .collect::<Vec<_>>()
            })
        }
    }
}

fn insert_warnings(map: &mut Map<String, Value>, warnings: &[Warning]) {
    if warnings.is_empty() {
        return;
    }
    map.insert(
        "warnings".to_string(),
        Value::Array(warnings.iter().map(warning_json).collect()),
    );
}

fn warning_json(warning: &Warning) -> Value {
    serde_json::to_value(warning).unwrap_or(Value::Null)
}
