//! Projection of a subtree onto fixed-width rows.

use super::ObjectHandle;
use crate::key::{Key, KeyKind};
use crate::tree::{NodeId, Value};
use serde::{Deserialize, Serialize};

/// One cell of a flattened row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Unit {
    /// No node at this depth
    #[default]
    Empty,
    /// Tag or object reference
    Key(Key),
    /// Integer value
    Int(i32),
    /// Float value
    Float(f32),
    /// Date value
    Date(u32),
    /// Text value
    Text(String),
}

impl Unit {
    fn of(key: Key, value: &Value) -> Self {
        match value {
            Value::Int(v) => Unit::Int(*v),
            Value::Float(v) => Unit::Float(*v),
            Value::Date(v) => Unit::Date(*v),
            Value::Text(text) => Unit::Text(text.clone()),
            Value::None if key.kind() == KeyKind::Text => Unit::Text(String::new()),
            Value::None => Unit::Key(key),
        }
    }
}

impl ObjectHandle {
    /// Flatten the subtree right of the cursor into rows of `width` cells.
    ///
    /// Every root-to-leaf path (cut at `width` nodes) becomes one row: the
    /// walk goes right first, then down, and each row repeats the shared
    /// prefix of its path. Rows shorter than `width` are filled with
    /// [`Unit::Empty`]. Comments are left out.
    pub fn flatten(&self, width: usize) -> Vec<Vec<Unit>> {
        let mut rows = Vec::new();
        if width == 0 {
            return rows;
        }
        let mut prefix = Vec::with_capacity(width);
        self.flatten_column(self.tree.right(self.cursor.curr), width, &mut prefix, &mut rows);
        rows
    }

    fn flatten_column(
        &self,
        first: Option<NodeId>,
        width: usize,
        prefix: &mut Vec<Unit>,
        rows: &mut Vec<Vec<Unit>>,
    ) {
        for node in self.tree.column(first) {
            let key = self.tree.key(node);
            if key.is_comment() {
                continue;
            }
            prefix.push(Unit::of(key, self.tree.value(node)));

            let leaf = self
                .tree
                .children(node)
                .all(|child| self.tree.key(child).is_comment());
            if leaf || prefix.len() == width {
                let mut row = prefix.clone();
                row.resize(width, Unit::Empty);
                rows.push(row);
            } else {
                self.flatten_column(self.tree.right(node), width, prefix, rows);
            }
            prefix.pop();
        }
    }
}
