//! Session cursor over one decoded object.
//!
//! An [`ObjectHandle`] owns the object's [`Tree`] and a cursor pairing the
//! current instance node with the schema node it matched. Reads move the
//! cursor; writes validate against the schema, edit the tree in place and
//! queue [`XrefEdit`]s that [`ObjectStore::save`](crate::ObjectStore::save)
//! applies to the referenced objects.

mod flatten;
mod read;
mod write;

pub use flatten::Unit;

use crate::cache::WriteLock;
use crate::constraint::ConstraintCheck;
use crate::error::{Result, StoreError};
use crate::key::{Key, KeyKind, QUOTED_IN};
use crate::lexicon::Lexicon;
use crate::schema::{Schema, SchemaPos, SchemaRegistry};
use crate::tree::{NodeId, NodeView, Tree};
use crate::xref::XrefEdit;
use std::fmt;
use std::sync::Arc;

/// Where a read or write applies, relative to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The column right of a tag, found by its path from the root
    Tag(Key),
    /// The column right of the cursor
    Right,
    /// The column holding the cursor, below it
    Down,
    /// The cursor itself
    Here,
}

/// Saved cursor position, restored with [`ObjectHandle::goto`].
///
/// The default mark is empty and sends the cursor to the root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mark {
    object: Option<Key>,
    cursor: Option<Cursor>,
}

impl Mark {
    /// Whether this mark sends the cursor to the root.
    pub fn is_empty(&self) -> bool {
        self.cursor.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Cursor {
    pub(crate) curr: NodeId,
    /// Schema node matching `curr`; `None` past the end of the schema or
    /// on a comment
    pub(crate) model: Option<SchemaPos>,
    /// Instance node whose right column starts the current (sub)model
    pub(crate) local_root: NodeId,
    /// Root of the current (sub)model
    pub(crate) local_model: SchemaPos,
}

#[derive(Clone)]
pub(crate) struct HandleContext {
    pub(crate) registry: Arc<SchemaRegistry>,
    pub(crate) lexicon: Arc<dyn Lexicon>,
    pub(crate) constraints: Arc<dyn ConstraintCheck>,
    pub(crate) stamp: u32,
    pub(crate) float_epsilon: f32,
    /// Deepest right-nesting a new node may sit at
    pub(crate) max_depth: usize,
}

/// One object opened for reading or writing.
pub struct ObjectHandle {
    key: Key,
    tree: Tree,
    schema: Arc<Schema>,
    ctx: HandleContext,
    lock: Option<WriteLock>,
    cursor: Cursor,
    xrefs: Vec<XrefEdit>,
    modified: bool,
}

impl ObjectHandle {
    pub(crate) fn new(tree: Tree, ctx: HandleContext, lock: Option<WriteLock>) -> Result<Self> {
        let key = tree.root_key();
        let schema = ctx.registry.schema_for_class(key.class())?;
        let root = tree.root();
        let model = SchemaPos::root(Arc::clone(&schema));
        Ok(Self {
            key,
            tree,
            cursor: Cursor {
                curr: root,
                model: Some(model.clone()),
                local_root: root,
                local_model: model,
            },
            schema,
            ctx,
            lock,
            xrefs: Vec::new(),
            modified: false,
        })
    }

    /// Object identity.
    pub fn key(&self) -> Key {
        self.key
    }

    /// The decoded tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Class schema the object is validated against.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Whether the handle holds the object's write lock.
    pub fn is_writable(&self) -> bool {
        self.lock.is_some()
    }

    /// Whether any edit changed the tree since open.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Reciprocal edits queued by this handle's writes.
    pub fn pending_xrefs(&self) -> &[XrefEdit] {
        &self.xrefs
    }

    /// Node under the cursor.
    pub fn current(&self) -> NodeId {
        self.cursor.curr
    }

    /// Key under the cursor.
    pub fn current_key(&self) -> Key {
        self.tree.key(self.cursor.curr)
    }

    /// Schema node matching the cursor, if any.
    pub fn current_model(&self) -> Option<&SchemaPos> {
        self.cursor.model.as_ref()
    }

    /// Owned snapshot of the whole object.
    pub fn view(&self) -> NodeView {
        self.tree.view()
    }

    /// Send the cursor back to the root.
    pub fn reset(&mut self) {
        self.cursor = self.root_cursor();
    }

    /// Capture the cursor.
    pub fn mark(&self) -> Mark {
        Mark {
            object: Some(self.key),
            cursor: Some(self.cursor.clone()),
        }
    }

    /// Restore a captured cursor, or the root for an empty mark.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StaleMark`] if the marked nodes have been
    /// removed since, and [`StoreError::InvalidOperation`] for a mark taken
    /// on another object.
    pub fn goto(&mut self, mark: &Mark) -> Result<()> {
        let Some(cursor) = &mark.cursor else {
            self.reset();
            return Ok(());
        };
        if mark.object != Some(self.key) {
            return Err(StoreError::InvalidOperation {
                message: format!("mark was taken on another object than {}", self.key),
            });
        }
        if !self.tree.contains(cursor.curr) || !self.tree.contains(cursor.local_root) {
            return Err(StoreError::StaleMark);
        }
        self.cursor = cursor.clone();
        Ok(())
    }

    pub(crate) fn lexicon(&self) -> &Arc<dyn Lexicon> {
        &self.ctx.lexicon
    }

    /// Keep only the queued edits `keep` accepts.
    pub(crate) fn retain_xrefs(&mut self, keep: impl Fn(&XrefEdit) -> bool) {
        self.xrefs.retain(|edit| keep(edit));
    }

    pub(crate) fn into_parts(self) -> (Tree, Vec<XrefEdit>, Option<WriteLock>, bool) {
        (self.tree, self.xrefs, self.lock, self.modified)
    }

    fn root_cursor(&self) -> Cursor {
        let root = self.tree.root();
        let model = SchemaPos::root(Arc::clone(&self.schema));
        Cursor {
            curr: root,
            model: Some(model.clone()),
            local_root: root,
            local_model: model,
        }
    }

    /// Cursor anchored on the local root of `cursor`'s frame.
    fn frame_of(cursor: &Cursor) -> Cursor {
        Cursor {
            curr: cursor.local_root,
            model: Some(cursor.local_model.clone()),
            local_root: cursor.local_root,
            local_model: cursor.local_model.clone(),
        }
    }

    /// Cursor on `child`, a node of the column right of `cursor.curr`.
    ///
    /// Entering a subtype column moves the local frame.
    fn descend_to(&self, cursor: &Cursor, child: NodeId) -> Result<Cursor> {
        let mut next = cursor.clone();
        next.curr = child;
        next.model = None;
        if self.tree.key(child).is_comment() {
            return Ok(next);
        }
        if let Some(pos) = &cursor.model {
            if let Some(column) = self.ctx.registry.right_step(pos)? {
                if !column.same_schema(pos) {
                    next.local_root = cursor.curr;
                    next.local_model = SchemaPos::root(Arc::clone(&column.schema));
                }
                next.model = column.matching(self.tree.key(child));
            }
        }
        Ok(next)
    }

    /// Cursor on `sibling`, a node of the column holding `cursor.curr`.
    fn across_to(&self, cursor: &Cursor, sibling: NodeId) -> Result<Cursor> {
        match &cursor.model {
            Some(pos) if !self.tree.key(sibling).is_comment() => {
                let mut next = cursor.clone();
                next.curr = sibling;
                next.model = pos.matching(self.tree.key(sibling));
                Ok(next)
            }
            _ => self.resolve(sibling),
        }
    }

    /// Full cursor for any live node, recomputed from the root.
    fn resolve(&self, node: NodeId) -> Result<Cursor> {
        let mut cursor = self.root_cursor();
        for pair in self.tree.ancestry(node).windows(2) {
            cursor = self.descend_to(&cursor, pair[1])?;
        }
        Ok(cursor)
    }

    /// Frames in which `tag` may be looked up: the local one, then the root.
    fn frames(&self) -> Vec<Cursor> {
        let local = Self::frame_of(&self.cursor);
        if local.local_root == self.tree.root() {
            vec![local]
        } else {
            vec![local, self.root_cursor()]
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.lock.is_none() {
            return Err(StoreError::ReadOnly { key: self.key });
        }
        Ok(())
    }

    /// Queue the reciprocal edit owed by the node under `at`, if any.
    fn queue_xref(&mut self, at: &Cursor, delete: bool) {
        let key = self.tree.key(at.curr);
        let tag = if key.is_comment() {
            Some(QUOTED_IN)
        } else if key.kind() == KeyKind::KeyRef {
            at.model.as_ref().and_then(SchemaPos::xref)
        } else {
            None
        };
        if let Some(tag) = tag {
            self.xrefs.push(XrefEdit {
                target: key,
                tag,
                value: self.key,
                delete,
            });
        }
    }

    /// Queue removals for `at` and everything right of it.
    fn queue_removals(&mut self, at: &Cursor) -> Result<()> {
        let mut stack = vec![at.clone()];
        while let Some(cursor) = stack.pop() {
            self.queue_xref(&cursor, true);
            let children: Vec<NodeId> = self.tree.children(cursor.curr).collect();
            for child in children {
                stack.push(self.descend_to(&cursor, child)?);
            }
        }
        Ok(())
    }

    fn name(&self, key: Key) -> String {
        self.ctx.lexicon.name(key).unwrap_or_else(|| key.to_string())
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("key", &self.key)
            .field("nodes", &self.tree.len())
            .field("writable", &self.is_writable())
            .field("modified", &self.modified)
            .field("pending_xrefs", &self.xrefs.len())
            .finish()
    }
}
