//! Turning a raw model tree into a [`Schema`].

use super::{Annotation, Schema, TagPath};
use crate::codec::DEFAULT_MAX_DEPTH;
use crate::error::{Result, StoreError};
use crate::key::{Key, KeyKind, ANY, CONSTRAINT, COORD, REPEAT, UNIQUE, XREF};
use crate::lexicon::Lexicon;
use crate::tree::{NodeFlags, NodeId, Tree, Value};
use log::debug;
use std::collections::{HashMap, HashSet};

/// Build a schema from a raw model tree.
///
/// The raw tree still holds the annotation markers as ordinary nodes; the
/// built tree has them spliced out:
///
/// - `UNIQUE` flags every node of the column to its right
/// - `XREF tag` records the reciprocal tag (class markers inherit the class
///   default when no explicit one is given)
/// - `COORD` flags the node
/// - `Constraint name` records the constraint
/// - `REPEAT` flags the node, which then right-steps to itself
///
/// # Errors
///
/// Returns [`StoreError::SchemaAuthoring`] for misplaced markers, missing
/// operands, duplicate tags and models nested too deep.
pub fn build_schema(raw: &Tree, lexicon: &dyn Lexicon) -> Result<Schema> {
    let model = raw.root_key();
    let mut out = Tree::new(model, 0, None)?;
    let root = out.root();
    out.insert_flags(root, NodeFlags::MODEL);

    let mut builder = Builder {
        raw,
        lexicon,
        out,
        annotations: HashMap::new(),
        tag_paths: HashMap::new(),
        seen: HashSet::new(),
    };
    if let Some(first) = raw.right(raw.root()) {
        let mut path = Vec::new();
        builder.column(first, root, &mut path, true, false, 0)?;
    }

    debug!(
        "Built schema {} ({} nodes, {} tags)",
        builder.name(model),
        builder.out.len(),
        builder.tag_paths.len()
    );
    Ok(Schema {
        model,
        tree: builder.out,
        annotations: builder.annotations,
        tag_paths: builder.tag_paths,
    })
}

struct Builder<'a> {
    raw: &'a Tree,
    lexicon: &'a dyn Lexicon,
    out: Tree,
    annotations: HashMap<NodeId, Annotation>,
    tag_paths: HashMap<Key, TagPath>,
    seen: HashSet<Key>,
}

impl Builder<'_> {
    fn name(&self, key: Key) -> String {
        self.lexicon.name(key).unwrap_or_else(|| key.to_string())
    }

    /// Copy the raw column starting at `first` under `parent`.
    ///
    /// `addressable` is false once the path passes a non-tag node: tags
    /// further right still count for duplicates but get no tag path.
    fn column(
        &mut self,
        first: NodeId,
        parent: NodeId,
        path: &mut Vec<Key>,
        addressable: bool,
        unique: bool,
        depth: usize,
    ) -> Result<()> {
        if depth >= DEFAULT_MAX_DEPTH {
            return Err(StoreError::authoring(format!(
                "model {} nests deeper than {DEFAULT_MAX_DEPTH} levels",
                self.name(self.raw.root_key())
            )));
        }

        let mut prev: Option<NodeId> = None;
        let mut cursor = Some(first);
        while let Some(raw_id) = cursor {
            cursor = self.raw.down(raw_id);
            let key = self.raw.key(raw_id);
            if key.is_annotation() {
                return Err(StoreError::authoring(format!(
                    "{} cannot start a column",
                    self.name(key)
                )));
            }

            let id = self.out.add_node(key, Value::None, 0)?;
            self.out.insert_flags(id, NodeFlags::MODEL);
            if unique {
                self.out.insert_flags(id, NodeFlags::UNIQUE);
            }
            match prev {
                None => self.out.link_right(parent, id),
                Some(above) => self.out.link_down(above, id),
            }
            prev = Some(id);

            let is_tag = key.kind() == KeyKind::Tag && key != ANY;
            if is_tag {
                if !self.seen.insert(key) {
                    return Err(StoreError::authoring(format!(
                        "tag {} appears twice in model {}",
                        self.name(key),
                        self.name(self.raw.root_key())
                    )));
                }
                if addressable {
                    let mut tags = path.clone();
                    tags.push(key);
                    self.tag_paths.insert(key, TagPath { tags, node: id });
                }
            }

            let (rest, mut annotation, right_unique) = self.splice_markers(raw_id, id)?;
            if annotation.xref.is_none() && key.is_class_marker() {
                annotation.xref = self
                    .lexicon
                    .class_info(key.class())
                    .and_then(|info| info.default_xref);
            }
            if annotation != Annotation::default() {
                self.annotations.insert(id, annotation);
            }

            if let Some(next) = rest {
                if self.raw.key(next).is_subtype() {
                    self.out.insert_flags(id, NodeFlags::SUBTYPE);
                }
                let step = is_tag && addressable;
                if step {
                    path.push(key);
                }
                self.column(next, id, path, step, right_unique, depth + 1)?;
                if step {
                    path.pop();
                }
            }
        }
        Ok(())
    }

    /// Consume the annotation markers right of `raw_id`.
    ///
    /// Returns the first raw node past the markers, the node's annotation,
    /// and whether the column past the markers is unique.
    fn splice_markers(
        &mut self,
        raw_id: NodeId,
        id: NodeId,
    ) -> Result<(Option<NodeId>, Annotation, bool)> {
        let mut annotation = Annotation::default();
        let mut unique = false;
        let mut next = self.raw.right(raw_id);

        while let Some(marker) = next {
            let marker_key = self.raw.key(marker);
            if !marker_key.is_annotation() {
                break;
            }
            if self.raw.down(marker).is_some() {
                return Err(StoreError::authoring(format!(
                    "{} must stand alone in its column",
                    self.name(marker_key)
                )));
            }
            next = self.raw.right(marker);

            match marker_key {
                UNIQUE => unique = true,
                COORD => self.out.insert_flags(id, NodeFlags::COORD),
                REPEAT => {
                    if next.is_some() {
                        return Err(StoreError::authoring("REPEAT must end its line"));
                    }
                    self.out.insert_flags(id, NodeFlags::REPEAT);
                }
                XREF | CONSTRAINT => {
                    let operand = next.ok_or_else(|| {
                        StoreError::authoring(format!("{} needs an operand", self.name(marker_key)))
                    })?;
                    if self.raw.down(operand).is_some() {
                        return Err(StoreError::authoring(format!(
                            "operand of {} must stand alone in its column",
                            self.name(marker_key)
                        )));
                    }
                    let operand_key = self.raw.key(operand);
                    if marker_key == XREF {
                        if operand_key.kind() != KeyKind::Tag || operand_key.is_annotation() {
                            return Err(StoreError::authoring(format!(
                                "XREF operand {} is not a tag",
                                self.name(operand_key)
                            )));
                        }
                        annotation.xref = Some(operand_key);
                    } else {
                        annotation.constraint = Some(operand_key);
                    }
                    next = self.raw.right(operand);
                }
                _ => {}
            }
        }
        Ok((next, annotation, unique))
    }
}
