//! Reciprocal edits between objects.
//!
//! Adding or removing a reference in a column with a reciprocal tag (and
//! every comment) queues an [`XrefEdit`] on the handle. At save time each
//! edit is applied to its target through a fresh write handle; see
//! [`ObjectStore::save`](crate::ObjectStore::save).

use crate::error::Result;
use crate::handle::{ObjectHandle, Step};
use crate::key::Key;
use serde::{Deserialize, Serialize};

/// One mirrored edit owed to another object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct XrefEdit {
    /// Object to edit
    pub target: Key,
    /// Reciprocal tag in the target's model
    pub tag: Key,
    /// Reference to add or remove under the tag (the edited object)
    pub value: Key,
    /// Remove instead of add
    pub delete: bool,
}

/// What one [`ObjectStore::save`](crate::ObjectStore::save) did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReport {
    /// Objects encoded into the waiting set, the saved one included
    pub written: usize,
    /// Reciprocal edits applied
    pub xrefs_applied: usize,
    /// Reciprocal edits dropped (target locked, violation, depth)
    pub xrefs_dropped: usize,
}

impl SaveReport {
    pub(crate) fn absorb(&mut self, other: SaveReport) {
        self.written += other.written;
        self.xrefs_applied += other.xrefs_applied;
        self.xrefs_dropped += other.xrefs_dropped;
    }
}

/// Apply `edit` to its target's open write handle.
///
/// Adding goes through [`ObjectHandle::add_key`], whose existence check
/// makes a repeated edit a no-op. Removing locates the reference under the
/// tag and prunes it, so a tag left empty goes too. A reference that is
/// already gone is not an error.
///
/// The mirror of `edit` that the target queues in turn is discarded: the
/// source object already holds that state.
pub(crate) fn apply(handle: &mut ObjectHandle, edit: &XrefEdit) -> Result<()> {
    apply_edit(handle, edit)?;
    handle.retain_xrefs(|queued| !is_echo(queued, edit));
    Ok(())
}

fn is_echo(queued: &XrefEdit, edit: &XrefEdit) -> bool {
    queued.target == edit.value && queued.value == edit.target && queued.delete == edit.delete
}

fn apply_edit(handle: &mut ObjectHandle, edit: &XrefEdit) -> Result<()> {
    handle.reset();
    if !edit.delete {
        handle.add_key(Step::Tag(edit.tag), edit.value)?;
        handle.reset();
        return Ok(());
    }

    if !handle.find_tag(edit.tag)? {
        return Ok(());
    }
    let tag_node = handle.current();
    let found = handle
        .tree()
        .children(tag_node)
        .find(|&child| handle.tree().key(child) == edit.value);
    if let Some(node) = found {
        handle.select(node)?;
        handle.prune()?;
    }
    handle.reset();
    Ok(())
}
