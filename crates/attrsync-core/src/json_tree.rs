//! Conversion between JSON documents and [`Tree`]s of JSON payloads.
//!
//! A JSON object whose `children` key (the key name is configurable) holds a
//! non-empty array is folded into a tree node: the payload is the object
//! without that key and the array elements become child nodes. Every other
//! value is stored as-is, so `tree_to_json(json_to_tree(doc))` reproduces
//! `doc` exactly.
//!
//! Nodes are addressed with JSON pointers such as `/children/0/children/2`.
//! The children-key tokens are optional: `/0/2` names the same node.

use serde_json::{Map, Value};

use crate::logging::targets;
use crate::tree::{NodeId, Tree};

/// A tree whose payloads are JSON values.
pub type JsonTree = Tree<Value>;

/// Key under which child arrays are stored in UI model documents.
pub const DEFAULT_CHILDREN_KEY: &str = "children";

/// Build a tree from a JSON document.
pub fn json_to_tree(value: &Value, children_key: &str) -> JsonTree {
    let (payload, children) = split_children(value, children_key);
    let mut tree = Tree::new(payload);
    let root = tree.root();
    if let Some(children) = children {
        append_children(&mut tree, root, children, children_key);
    }
    tree
}

/// Append the JSON document `value` as a new child of `parent`.
pub fn append_json(
    tree: &mut JsonTree,
    parent: NodeId,
    position: usize,
    value: &Value,
    children_key: &str,
) -> Option<NodeId> {
    let (payload, children) = split_children(value, children_key);
    let id = tree.insert(parent, position, payload)?;
    if let Some(children) = children {
        append_children(tree, id, children, children_key);
    }
    Some(id)
}

fn append_children(tree: &mut JsonTree, parent: NodeId, children: &[Value], children_key: &str) {
    for child in children {
        let position = tree.child_count(parent);
        append_json(tree, parent, position, child, children_key);
    }
}

fn split_children<'a>(value: &'a Value, children_key: &str) -> (Value, Option<&'a [Value]>) {
    match value {
        Value::Object(map) => match map.get(children_key) {
            Some(Value::Array(children)) if !children.is_empty() => {
                let payload: Map<String, Value> = map
                    .iter()
                    .filter(|(k, _)| k.as_str() != children_key)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                (Value::Object(payload), Some(children.as_slice()))
            }
            _ => (value.clone(), None),
        },
        _ => (value.clone(), None),
    }
}

/// Serialize the subtree rooted at `node` back into a JSON document.
pub fn tree_to_json(tree: &JsonTree, node: NodeId, children_key: &str) -> Value {
    let Some(payload) = tree.data(node) else {
        return Value::Null;
    };
    let children = tree.children(node);
    if children.is_empty() {
        return payload.clone();
    }

    let child_values: Vec<Value> = children
        .iter()
        .map(|&c| tree_to_json(tree, c, children_key))
        .collect();

    match payload {
        Value::Object(map) => {
            let mut map = map.clone();
            map.insert(children_key.to_string(), Value::Array(child_values));
            Value::Object(map)
        }
        Value::Null => {
            let mut map = Map::new();
            map.insert(children_key.to_string(), Value::Array(child_values));
            Value::Object(map)
        }
        other => {
            tracing::warn!(
                target: targets::TREE,
                children = children.len(),
                "non-object payload cannot hold children, dropping them"
            );
            other.clone()
        }
    }
}

/// Serialize the whole tree.
pub fn to_json(tree: &JsonTree, children_key: &str) -> Value {
    tree_to_json(tree, tree.root(), children_key)
}

/// Resolve a JSON pointer into a node id.
///
/// `""` and `"/"` name the root. Tokens equal to `children_key` are skipped;
/// every other token must be a child index.
pub fn pointer_to_node(tree: &JsonTree, children_key: &str, pointer: &str) -> Option<NodeId> {
    let mut current = tree.root();
    if pointer.is_empty() || pointer == "/" {
        return Some(current);
    }
    let rest = pointer.strip_prefix('/')?;
    for raw in rest.split('/') {
        let token = unescape_token(raw);
        if token == children_key || token.is_empty() {
            continue;
        }
        let index: usize = token.parse().ok()?;
        current = tree.child(current, index)?;
    }
    Some(current)
}

/// The canonical pointer for `node`, e.g. `/children/1/children/0`.
pub fn node_pointer(tree: &JsonTree, node: NodeId, children_key: &str) -> Option<String> {
    if !tree.is_valid(node) {
        return None;
    }
    let mut indices = Vec::new();
    let mut current = node;
    while let Some(index) = tree.index(current) {
        indices.push(index);
        current = tree.parent(current)?;
    }
    let key = escape_token(children_key);
    Some(
        indices
            .iter()
            .rev()
            .map(|i| format!("/{key}/{i}"))
            .collect(),
    )
}

/// First node (pre-order) whose object payload has `field == value`.
pub fn find_by_field(tree: &JsonTree, start: NodeId, field: &str, value: &Value) -> Option<NodeId> {
    tree.find(start, |payload| payload.get(field) == Some(value))
}

/// Read a string field of a node's payload.
pub fn str_field<'a>(tree: &'a JsonTree, node: NodeId, field: &str) -> Option<&'a str> {
    tree.data(node)?.get(field)?.as_str()
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}
