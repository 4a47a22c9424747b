//! Schema-checked edits.

use super::{Cursor, ObjectHandle, Step};
use crate::error::{Result, StoreError};
use crate::key::{Key, COMMENT_CLASS, QUOTED_IN};
use crate::schema::SchemaPos;
use crate::tree::{NodeId, Value};
use crate::xref::XrefEdit;
use log::{debug, trace};

impl ObjectHandle {
    /// Make sure `tag` exists, creating the missing steps of its path.
    ///
    /// The cursor ends on the tag.
    ///
    /// # Errors
    ///
    /// [`StoreError::SchemaViolation`] if the model has no such tag,
    /// [`StoreError::ReadOnly`] on a read handle.
    pub fn add_tag(&mut self, tag: Key) -> Result<()> {
        self.check_writable()?;
        self.cursor = self.ensure_tag(tag)?;
        Ok(())
    }

    /// Make sure object reference `key` exists at `step`.
    ///
    /// `Step::Tag` adds right of the tag (creating it), `Right` and `Here`
    /// add right of the cursor, `Down` adds to the cursor's own column.
    /// An existing identical reference is left alone. In a `UNIQUE` column
    /// the previous occupant is removed first. The cursor ends on the
    /// reference.
    ///
    /// # Errors
    ///
    /// [`StoreError::SchemaViolation`] if the key does not fit the model
    /// there or fails the column's constraint; the tree is unchanged.
    pub fn add_key(&mut self, step: Step, key: Key) -> Result<()> {
        self.check_writable()?;
        if key.kind().is_scalar() {
            return Err(StoreError::violation(format!(
                "{} is a scalar type; use add_data",
                self.name(key)
            )));
        }
        let parent = self.write_parent(step)?;
        self.cursor = self.add_child(&parent, key, Value::None)?;
        Ok(())
    }

    /// Store a scalar under type marker `key` at `step`.
    ///
    /// `Step::Here` overwrites: the cursor node if it already has type
    /// `key`, otherwise the first `key` value right of the cursor, otherwise
    /// it adds one. Every other step appends an alternative, skipping values
    /// already present. Floats within the configured epsilon count as equal
    /// and are not rewritten; so do two NaNs. Empty text is stored as an
    /// absent text.
    ///
    /// # Errors
    ///
    /// [`StoreError::SchemaViolation`] if the value does not fit `key`,
    /// holds a NUL byte, fails the column's constraint or would nest past
    /// the configured depth; the tree is unchanged.
    pub fn add_data(&mut self, step: Step, key: Key, value: impl Into<Value>) -> Result<()> {
        self.check_writable()?;
        let value = match value.into() {
            Value::Text(text) if text.is_empty() => Value::None,
            value => value,
        };
        if !key.kind().is_scalar() || !value.fits(key) {
            return Err(StoreError::violation(format!(
                "value {value:?} does not fit type {}",
                self.name(key)
            )));
        }
        if value.as_text().is_some_and(|text| text.contains('\0')) {
            return Err(StoreError::violation("text may not contain NUL"));
        }

        if step == Step::Here {
            if let Some(target) = self.overwrite_target(key) {
                return self.overwrite(target, key, value);
            }
        }
        let parent = self.write_parent(step)?;
        self.cursor = self.add_child(&parent, key, value)?;
        Ok(())
    }

    /// Attach a free-text comment right of the cursor.
    ///
    /// The comment object gets a `Quoted_in` reference back at save time.
    pub fn add_comment(&mut self, text: &str) -> Result<()> {
        self.check_writable()?;
        if text.is_empty() {
            return Err(StoreError::violation("empty comment"));
        }
        let key = self.ctx.lexicon.intern(COMMENT_CLASS, text)?;
        let curr = self.cursor.curr;
        if self.tree.children(curr).any(|child| self.tree.key(child) == key) {
            return Ok(());
        }
        let id = self.tree.add_node(key, Value::None, self.ctx.stamp)?;
        self.tree.push_front(curr, id);
        self.modified = true;
        self.xrefs.push(XrefEdit {
            target: key,
            tag: QUOTED_IN,
            value: self.key,
            delete: false,
        });
        trace!("{}: comment {} added", self.key, key);
        Ok(())
    }

    /// Detach the cursor node and everything right of it.
    ///
    /// Reciprocal removals are queued for every reference in the detached
    /// part. The cursor goes back to the root.
    pub fn remove(&mut self) -> Result<()> {
        self.check_writable()?;
        if self.cursor.curr == self.tree.root() {
            return Err(StoreError::InvalidOperation {
                message: "the root cannot be removed; use clear".to_string(),
            });
        }
        let at = self.cursor.clone();
        self.detach(&at)?;
        self.reset();
        Ok(())
    }

    /// Remove the cursor node plus every ancestor left with nothing else.
    ///
    /// Climbs while the node is alone in its column, stopping below the
    /// root. The cursor goes back to the root.
    pub fn prune(&mut self) -> Result<()> {
        self.check_writable()?;
        let root = self.tree.root();
        if self.cursor.curr == root {
            return Err(StoreError::InvalidOperation {
                message: "the root cannot be pruned; use clear".to_string(),
            });
        }
        let mut node = self.cursor.curr;
        while let Some(owner) = self.tree.column_owner(node) {
            if owner == root || !self.is_alone(node) {
                break;
            }
            node = owner;
        }
        let at = if node == self.cursor.curr {
            self.cursor.clone()
        } else {
            self.resolve(node)?
        };
        self.detach(&at)?;
        self.reset();
        Ok(())
    }

    /// Remove all content, leaving the root.
    pub fn clear(&mut self) -> Result<()> {
        self.check_writable()?;
        let root = self.root_cursor();
        let children: Vec<NodeId> = self.tree.children(root.curr).collect();
        for child in children {
            let at = self.descend_to(&root, child)?;
            self.detach(&at)?;
        }
        self.reset();
        Ok(())
    }

    /// Add `delta` to every `COORD` integer that is `>= start`.
    ///
    /// Returns how many values changed.
    pub fn shift_coordinates(&mut self, start: i32, delta: i32) -> Result<usize> {
        self.check_writable()?;
        let mut changed = 0;
        let mut stack = vec![self.root_cursor()];
        while let Some(at) = stack.pop() {
            let coord = at
                .model
                .as_ref()
                .is_some_and(|pos| pos.schema.is_coord(pos.node));
            let current = match self.tree.value(at.curr) {
                Value::Int(v) if coord => Some(*v),
                _ => None,
            };
            if let Some(v) = current {
                if v >= start && delta != 0 {
                    self.tree
                        .set_value(at.curr, Value::Int(v.saturating_add(delta)), self.ctx.stamp);
                    changed += 1;
                }
            }
            let children: Vec<NodeId> = self.tree.children(at.curr).collect();
            for child in children {
                stack.push(self.descend_to(&at, child)?);
            }
        }
        if changed > 0 {
            self.modified = true;
            debug!("{}: shifted {} coordinates from {} by {}", self.key, changed, start, delta);
        }
        Ok(changed)
    }

    fn ensure_tag(&mut self, tag: Key) -> Result<Cursor> {
        let found = self.frames().into_iter().find_map(|frame| {
            let tags = frame.local_model.schema.tag_path(tag)?.tags.clone();
            Some((frame, tags))
        });
        let Some((frame, tags)) = found else {
            return Err(StoreError::violation(format!(
                "tag {} is not in model {}",
                self.name(tag),
                self.name(self.schema.model())
            )));
        };
        let mut cursor = frame;
        for step in tags {
            cursor = self.add_child(&cursor, step, Value::None)?;
        }
        Ok(cursor)
    }

    fn write_parent(&mut self, step: Step) -> Result<Cursor> {
        match step {
            Step::Tag(tag) => self.ensure_tag(tag),
            Step::Right | Step::Here => Ok(self.cursor.clone()),
            Step::Down => {
                let owner = self.tree.column_owner(self.cursor.curr).ok_or_else(|| {
                    StoreError::InvalidOperation {
                        message: "the root has no column to add to".to_string(),
                    }
                })?;
                self.resolve(owner)
            }
        }
    }

    /// Ensure a `key`/`value` node in the column right of `parent`.
    fn add_child(&mut self, parent: &Cursor, key: Key, value: Value) -> Result<Cursor> {
        let parent_key = self.tree.key(parent.curr);
        let pos = parent.model.as_ref().ok_or_else(|| {
            StoreError::violation(format!("{} has no place in the model", self.name(parent_key)))
        })?;
        let column = self.ctx.registry.right_step(pos)?.ok_or_else(|| {
            StoreError::violation(format!("nothing may follow {}", self.name(parent_key)))
        })?;
        let slot = column.matching(key).ok_or_else(|| {
            StoreError::violation(format!(
                "{} does not fit right of {}",
                self.name(key),
                self.name(parent_key)
            ))
        })?;

        let existing = self.tree.children(parent.curr).find(|&child| {
            self.tree.key(child) == key && self.same_value(self.tree.value(child), &value)
        });
        if let Some(existing) = existing {
            return self.descend_to(parent, existing);
        }

        if let Some(constraint) = slot.constraint() {
            if !self.ctx.constraints.check(constraint, key, &value) {
                return Err(StoreError::violation(format!(
                    "{} fails constraint {}",
                    self.name(key),
                    self.name(constraint)
                )));
            }
        }

        let depth = self.tree.ancestry(parent.curr).len();
        if depth > self.ctx.max_depth {
            return Err(StoreError::violation(format!(
                "{} would nest {} deep, past the limit of {}",
                self.name(key),
                depth,
                self.ctx.max_depth
            )));
        }

        let id = self.tree.add_node(key, value, self.ctx.stamp)?;
        if slot.is_unique() {
            if let Err(err) = self.evict_column(parent) {
                self.tree.free_subtree(id);
                return Err(err);
            }
        }
        match self.insertion_point(parent.curr, &column, slot.ordinal()) {
            Some(prev) => self.tree.insert_after(prev, id),
            None => self.tree.push_front(parent.curr, id),
        }
        self.modified = true;

        let cursor = self.descend_to(parent, id)?;
        self.queue_xref(&cursor, false);
        trace!(
            "{}: added {} right of {}",
            self.key,
            self.name(key),
            self.name(parent_key)
        );
        Ok(cursor)
    }

    /// Last node of the column that sorts at or before schema `ordinal`.
    fn insertion_point(
        &self,
        parent: NodeId,
        column: &SchemaPos,
        ordinal: usize,
    ) -> Option<NodeId> {
        let mut prev = None;
        for child in self.tree.children(parent) {
            let key = self.tree.key(child);
            if !key.is_comment() {
                if let Some(pos) = column.matching(key) {
                    if pos.ordinal() > ordinal {
                        break;
                    }
                }
            }
            prev = Some(child);
        }
        prev
    }

    /// Remove every non-comment occupant of the column right of `parent`.
    fn evict_column(&mut self, parent: &Cursor) -> Result<()> {
        let occupants: Vec<NodeId> = self
            .tree
            .children(parent.curr)
            .filter(|&child| !self.tree.key(child).is_comment())
            .collect();
        for occupant in occupants {
            let at = self.descend_to(parent, occupant)?;
            trace!(
                "{}: evicting {} from unique column",
                self.key,
                self.name(self.tree.key(occupant))
            );
            self.detach(&at)?;
        }
        Ok(())
    }

    fn detach(&mut self, at: &Cursor) -> Result<()> {
        self.queue_removals(at)?;
        self.tree.unlink(at.curr);
        self.tree.free_subtree(at.curr);
        self.modified = true;
        Ok(())
    }

    fn overwrite_target(&self, key: Key) -> Option<NodeId> {
        let curr = self.cursor.curr;
        if self.tree.key(curr) == key {
            return Some(curr);
        }
        self.tree
            .children(curr)
            .find(|&child| self.tree.key(child) == key)
    }

    fn overwrite(&mut self, target: NodeId, key: Key, value: Value) -> Result<()> {
        let at = if target == self.cursor.curr {
            self.cursor.clone()
        } else {
            self.descend_to(&self.cursor, target)?
        };
        if let Some(constraint) = at.model.as_ref().and_then(SchemaPos::constraint) {
            if !self.ctx.constraints.check(constraint, key, &value) {
                return Err(StoreError::violation(format!(
                    "{} fails constraint {}",
                    self.name(key),
                    self.name(constraint)
                )));
            }
        }
        if !self.same_value(self.tree.value(target), &value) {
            self.tree.set_value(target, value, self.ctx.stamp);
            self.modified = true;
            trace!("{}: overwrote {}", self.key, self.name(key));
        }
        self.cursor = at;
        Ok(())
    }

    fn is_alone(&self, node: NodeId) -> bool {
        self.tree.column_head(node) == node && self.tree.down(node).is_none()
    }

    fn same_value(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Float(x), Value::Float(y)) => floats_match(*x, *y, self.ctx.float_epsilon),
            _ => a == b,
        }
    }
}

/// Relative float comparison; magnitudes below one compare absolutely.
/// NaN matches NaN.
fn floats_match(a: f32, b: f32, epsilon: f32) -> bool {
    a == b
        || (a.is_nan() && b.is_nan())
        || (a - b).abs() <= epsilon * a.abs().max(b.abs()).max(1.0)
}
