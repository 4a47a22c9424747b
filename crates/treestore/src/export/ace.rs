//! `.ace` text export.
//!
//! One header line `Class : "name"`, then one line per root-to-leaf path
//! with the path's nodes separated by tabs. Tags print bare, references
//! and text quoted, numbers as is, comments as `-C "text"`.

use super::{class_name, display_name, is_bare};
use crate::handle::ObjectHandle;
use crate::key::KeyKind;
use crate::lexicon::Lexicon;
use crate::tree::{NodeId, Tree, Value};

/// Dump an object in `.ace` format.
pub fn to_ace(handle: &ObjectHandle) -> String {
    let lexicon = handle.lexicon().as_ref();
    let tree = handle.tree();
    let key = handle.key();

    let mut out = format!(
        "{} : {}\n",
        class_name(lexicon, key),
        quote(&display_name(lexicon, key))
    );
    let mut path = Vec::new();
    for child in tree.children(tree.root()) {
        write_paths(tree, lexicon, child, &mut path, &mut out);
    }
    out.push('\n');
    out
}

/// Depth-first over the right columns; `path` holds the rendered prefix.
fn write_paths(
    tree: &Tree,
    lexicon: &dyn Lexicon,
    node: NodeId,
    path: &mut Vec<String>,
    out: &mut String,
) {
    path.push(render(tree, lexicon, node));
    let mut children = tree.children(node).peekable();
    if children.peek().is_none() {
        out.push_str(&path.join("\t"));
        out.push('\n');
    }
    for child in children {
        write_paths(tree, lexicon, child, path, out);
    }
    path.pop();
}

fn render(tree: &Tree, lexicon: &dyn Lexicon, node: NodeId) -> String {
    let key = tree.key(node);
    if key.is_comment() {
        return format!("-C {}", quote(&display_name(lexicon, key)));
    }
    match (key.kind(), tree.value(node)) {
        (KeyKind::Int, Value::Int(v)) => v.to_string(),
        (KeyKind::Float, Value::Float(v)) => v.to_string(),
        (KeyKind::Date, Value::Date(v)) => v.to_string(),
        (KeyKind::Text, Value::Text(text)) => quote(text),
        (KeyKind::Text, _) => quote(""),
        _ if is_bare(key) => display_name(lexicon, key),
        _ => quote(&display_name(lexicon, key)),
    }
}

fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        match c {
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(c);
            }
            '\n' => quoted.push_str("\\n"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
