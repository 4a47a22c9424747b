//! Navigation and typed reads.

use super::{Cursor, ObjectHandle, Step};
use crate::error::Result;
use crate::key::{Key, KeyKind};
use crate::tree::{NodeId, Value};

impl ObjectHandle {
    /// Move the cursor onto `tag`, following its path from the root of the
    /// current model.
    ///
    /// Returns `false` and leaves the cursor alone when the tag is not in
    /// the model or not present in the object. Calling it twice without an
    /// edit in between lands on the same node.
    pub fn find_tag(&mut self, tag: Key) -> Result<bool> {
        match self.locate(tag)? {
            Some(cursor) => {
                self.cursor = cursor;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Move the cursor one step. Comments are skipped.
    ///
    /// `Step::Tag` lands on the first value right of the tag. Returns
    /// `false` and leaves the cursor alone when there is nowhere to go.
    pub fn step(&mut self, step: Step) -> Result<bool> {
        match self.stepped(step)? {
            Some(cursor) => {
                self.cursor = cursor;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Step, then read the first object reference at or below the cursor.
    pub fn get_key(&mut self, step: Step) -> Result<Option<Key>> {
        let Some(at) = self.stepped(step)? else {
            return Ok(None);
        };
        let Some(found) = self.scan(&at, |key| key.kind() == KeyKind::KeyRef)? else {
            return Ok(None);
        };
        let key = self.tree.key(found.curr);
        self.cursor = found;
        Ok(Some(key))
    }

    /// Step, then read the first scalar of `kind` at or below the cursor.
    ///
    /// The value is a copy; later edits do not change it.
    pub fn get_data(&mut self, step: Step, kind: KeyKind) -> Result<Option<Value>> {
        let Some(at) = self.stepped(step)? else {
            return Ok(None);
        };
        let Some(found) = self.scan(&at, |key| key.kind() == kind)? else {
            return Ok(None);
        };
        let value = self.tree.value(found.curr).clone();
        self.cursor = found;
        Ok(Some(value))
    }

    /// Integer read.
    pub fn get_int(&mut self, step: Step) -> Result<Option<i32>> {
        Ok(match self.get_data(step, KeyKind::Int)? {
            Some(Value::Int(v)) => Some(v),
            _ => None,
        })
    }

    /// Float read.
    pub fn get_float(&mut self, step: Step) -> Result<Option<f32>> {
        Ok(match self.get_data(step, KeyKind::Float)? {
            Some(Value::Float(v)) => Some(v),
            _ => None,
        })
    }

    /// Date read.
    pub fn get_date(&mut self, step: Step) -> Result<Option<u32>> {
        Ok(match self.get_data(step, KeyKind::Date)? {
            Some(Value::Date(v)) => Some(v),
            _ => None,
        })
    }

    /// Text read. An absent text reads as the empty string.
    pub fn get_text(&mut self, step: Step) -> Result<Option<String>> {
        Ok(match self.get_data(step, KeyKind::Text)? {
            Some(Value::Text(text)) => Some(text),
            Some(Value::None) => Some(String::new()),
            _ => None,
        })
    }

    /// Texts of the comments attached right of the cursor.
    pub fn comments(&self) -> Vec<String> {
        self.tree
            .children(self.cursor.curr)
            .map(|child| self.tree.key(child))
            .filter(|key| key.is_comment())
            .map(|key| self.name(key))
            .collect()
    }

    /// Put the cursor on an arbitrary live node.
    pub(crate) fn select(&mut self, node: NodeId) -> Result<()> {
        self.cursor = self.resolve(node)?;
        Ok(())
    }

    pub(super) fn locate(&self, tag: Key) -> Result<Option<Cursor>> {
        for frame in self.frames() {
            let Some(path) = frame.local_model.schema.tag_path(tag) else {
                continue;
            };
            let tags = path.tags.clone();
            return self.walk(frame, &tags);
        }
        Ok(None)
    }

    fn walk(&self, frame: Cursor, tags: &[Key]) -> Result<Option<Cursor>> {
        let mut cursor = frame;
        for &tag in tags {
            let Some(child) = self
                .tree
                .children(cursor.curr)
                .find(|&child| self.tree.key(child) == tag)
            else {
                return Ok(None);
            };
            cursor = self.descend_to(&cursor, child)?;
        }
        Ok(Some(cursor))
    }

    fn stepped(&self, step: Step) -> Result<Option<Cursor>> {
        match step {
            Step::Here => Ok(Some(self.cursor.clone())),
            Step::Right => self.first_right(&self.cursor),
            Step::Down => self.next_down(&self.cursor),
            Step::Tag(tag) => match self.locate(tag)? {
                Some(at) => self.first_right(&at),
                None => Ok(None),
            },
        }
    }

    fn first_right(&self, at: &Cursor) -> Result<Option<Cursor>> {
        let child = self
            .tree
            .children(at.curr)
            .find(|&child| !self.tree.key(child).is_comment());
        match child {
            Some(child) => self.descend_to(at, child).map(Some),
            None => Ok(None),
        }
    }

    fn next_down(&self, at: &Cursor) -> Result<Option<Cursor>> {
        let sibling = self
            .tree
            .column(self.tree.down(at.curr))
            .find(|&node| !self.tree.key(node).is_comment());
        match sibling {
            Some(sibling) => self.across_to(at, sibling).map(Some),
            None => Ok(None),
        }
    }

    /// First node at or below `at` in its column whose key passes `want`.
    fn scan(&self, at: &Cursor, want: impl Fn(Key) -> bool) -> Result<Option<Cursor>> {
        let found = self.tree.column(Some(at.curr)).find(|&node| {
            let key = self.tree.key(node);
            !key.is_comment() && want(key)
        });
        match found {
            Some(node) if node == at.curr => Ok(Some(at.clone())),
            Some(node) => self.across_to(at, node).map(Some),
            None => Ok(None),
        }
    }
}
