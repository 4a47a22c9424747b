//! JSON export.
//!
//! The document carries the object's class and name, a `tree` of named
//! nodes for people and web tools, and `view`, the raw
//! [`NodeView`](crate::NodeView) that deserializes back into a snapshot.

use super::{class_name, display_name, is_bare};
use crate::error::{Result, StoreError};
use crate::handle::ObjectHandle;
use crate::key::KeyKind;
use crate::lexicon::Lexicon;
use crate::tree::{NodeId, Tree, Value};
use serde_json::{json, Value as Json};

/// Export an object to pretty-printed JSON.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] if the snapshot cannot be encoded.
pub fn to_json(handle: &ObjectHandle) -> Result<String> {
    let lexicon = handle.lexicon().as_ref();
    let tree = handle.tree();
    let key = handle.key();

    let view = serde_json::to_value(handle.view())
        .map_err(|e| StoreError::serialization("Failed to encode object view", Some(e)))?;
    let nodes: Vec<Json> = tree
        .children(tree.root())
        .map(|child| node_to_json(tree, lexicon, child))
        .collect();

    let result = json!({
        "class": class_name(lexicon, key),
        "name": display_name(lexicon, key),
        "key": key,
        "tree": nodes,
        "view": view,
    });
    serde_json::to_string_pretty(&result)
        .map_err(|e| StoreError::serialization("Failed to serialize JSON", Some(e)))
}

fn node_to_json(tree: &Tree, lexicon: &dyn Lexicon, node: NodeId) -> Json {
    let key = tree.key(node);
    let mut entry = match tree.value(node) {
        Value::None if key.is_comment() => json!({ "comment": display_name(lexicon, key) }),
        Value::None if key.kind() == KeyKind::Text => json!({ "text": "" }),
        Value::None if is_bare(key) => json!({ "tag": display_name(lexicon, key) }),
        Value::None => json!({
            "class": class_name(lexicon, key),
            "ref": display_name(lexicon, key),
        }),
        Value::Int(v) => json!({ "int": v }),
        Value::Float(v) => json!({ "float": v }),
        Value::Date(v) => json!({ "date": v }),
        Value::Text(text) => json!({ "text": text }),
    };
    let children: Vec<Json> = tree
        .children(node)
        .map(|child| node_to_json(tree, lexicon, child))
        .collect();
    if !children.is_empty() {
        entry["children"] = Json::Array(children);
    }
    entry
}
