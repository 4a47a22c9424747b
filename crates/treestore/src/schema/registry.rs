//! Process-wide cache of built schemas.

use super::{build_schema, parse_models, Schema, SchemaPos};
use crate::error::{Result, StoreError};
use crate::key::{ClassId, Key, ANY, COMMENT_CLASS, QUOTED_IN};
use crate::lexicon::Lexicon;
use crate::tree::{NodeFlags, Tree, Value};
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Raw models plus the schemas built from them.
///
/// Schemas are built on first use and shared as `Arc<Schema>`; a handle
/// keeps its snapshot even if the model is redefined or invalidated
/// meanwhile. The registry always knows the comment model
/// (`?Comment Quoted_in ANY`).
pub struct SchemaRegistry {
    lexicon: Arc<dyn Lexicon>,
    models: RwLock<HashMap<Key, Tree>>,
    schemas: RwLock<HashMap<Key, Arc<Schema>>>,
}

impl SchemaRegistry {
    /// Create a registry holding only the comment model.
    ///
    /// # Errors
    ///
    /// Returns an error if the comment model cannot be allocated.
    pub fn new(lexicon: Arc<dyn Lexicon>) -> Result<Self> {
        let registry = Self {
            lexicon,
            models: RwLock::new(HashMap::new()),
            schemas: RwLock::new(HashMap::new()),
        };
        registry.define(comment_model()?);
        Ok(registry)
    }

    /// The lexicon models are parsed against.
    pub fn lexicon(&self) -> &Arc<dyn Lexicon> {
        &self.lexicon
    }

    /// Register a raw model under its root key, replacing any earlier one.
    pub fn define(&self, raw: Tree) -> Key {
        let model = raw.root_key();
        self.models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(model, raw);
        self.invalidate(model);
        model
    }

    /// Parse model text, register every model and build them.
    ///
    /// # Errors
    ///
    /// Returns the first parse or build error. Models defined before the
    /// failing one stay registered.
    pub fn load_models(&self, text: &str) -> Result<Vec<Key>> {
        let raws = parse_models(text, self.lexicon.as_ref())?;
        let keys: Vec<Key> = raws.into_iter().map(|raw| self.define(raw)).collect();
        for key in &keys {
            self.schema(*key)?;
        }
        Ok(keys)
    }

    /// Whether a model is registered.
    pub fn contains(&self, model: Key) -> bool {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&model)
    }

    /// Registered model keys.
    pub fn models(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        keys.sort();
        keys
    }

    /// Built schema for a model key, building it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SchemaNotFound`] if no model is registered and
    /// [`StoreError::SchemaAuthoring`] if the model does not build.
    pub fn schema(&self, model: Key) -> Result<Arc<Schema>> {
        if let Some(schema) = self
            .schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&model)
        {
            return Ok(Arc::clone(schema));
        }

        let built = {
            let models = self.models.read().unwrap_or_else(PoisonError::into_inner);
            let raw = models
                .get(&model)
                .ok_or(StoreError::SchemaNotFound { model })?;
            Arc::new(build_schema(raw, self.lexicon.as_ref())?)
        };
        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(schemas.entry(model).or_insert(built)))
    }

    /// Built schema of a class.
    pub fn schema_for_class(&self, class: ClassId) -> Result<Arc<Schema>> {
        self.schema(Key::class_marker(class))
    }

    /// Cursor at the root of a model's schema.
    pub fn root_pos(&self, model: Key) -> Result<SchemaPos> {
        self.schema(model).map(SchemaPos::root)
    }

    /// Drop the built schema of a model; the next use rebuilds it.
    pub fn invalidate(&self, model: Key) {
        let dropped = self
            .schemas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&model)
            .is_some();
        if dropped {
            debug!("Invalidated schema {}", model);
        }
    }

    /// Step right in the schema.
    ///
    /// A `REPEAT` node steps to itself. A column headed by a subtype key is
    /// entered transparently: the result points at the first column of the
    /// subtype's schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SchemaNotFound`] if a referenced subtype has no
    /// model.
    pub fn right_step(&self, pos: &SchemaPos) -> Result<Option<SchemaPos>> {
        let tree = pos.schema.tree();
        if tree.flags(pos.node).contains(NodeFlags::REPEAT) {
            return Ok(Some(pos.clone()));
        }
        let Some(right) = tree.right(pos.node) else {
            return Ok(None);
        };
        let key = tree.key(right);
        if !key.is_subtype() {
            return Ok(Some(pos.at(right)));
        }
        let sub = self.schema(key)?;
        Ok(sub.tree().right(sub.root()).map(|first| SchemaPos {
            node: first,
            schema: sub,
        }))
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let models = self.models.read().unwrap_or_else(PoisonError::into_inner).len();
        let built = self.schemas.read().unwrap_or_else(PoisonError::into_inner).len();
        f.debug_struct("SchemaRegistry")
            .field("models", &models)
            .field("built", &built)
            .finish()
    }
}

fn comment_model() -> Result<Tree> {
    let mut tree = Tree::new(Key::class_marker(COMMENT_CLASS), 0, None)?;
    let root = tree.root();
    let tag = tree.add_node(QUOTED_IN, Value::None, 0)?;
    let any = tree.add_node(ANY, Value::None, 0)?;
    tree.link_right(root, tag);
    tree.link_right(tag, any);
    Ok(tree)
}
