//! Name interning collaborator.
//!
//! The core compares integer codes only. Names, classes, aliases and the
//! per-class cross-reference defaults come from a [`Lexicon`]. The
//! [`MemoryLexicon`] keeps everything in process memory and is what tests and
//! small deployments use.

use crate::error::{Result, StoreError};
use crate::key::{
    ClassId, Key, COMMENT_CLASS, CONSTRAINT_CLASS, FIRST_USER_CLASS, FIRST_USER_TAG,
    SUBTYPE_CLASS, SYSTEM_TAGS, TAG_CLASS,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

const MAX_INDEX: u32 = (1 << 24) - 1;
const MAX_ALIAS_HOPS: usize = 16;

/// Per-class settings the schema builder consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    /// Class name, as written after `?` in models
    pub name: String,
    /// Reciprocal tag implied for every model column referencing this class
    pub default_xref: Option<Key>,
}

/// Tag and class name interning.
pub trait Lexicon: Send + Sync {
    /// Return the key for `name` in `class`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownName`] if the class does not exist and
    /// [`StoreError::InvalidOperation`] if the class is full.
    fn intern(&self, class: ClassId, name: &str) -> Result<Key>;

    /// Look up an existing key without creating it.
    fn lookup(&self, class: ClassId, name: &str) -> Option<Key>;

    /// Name of a key.
    fn name(&self, key: Key) -> Option<String>;

    /// Class id for a class name.
    fn class_by_name(&self, name: &str) -> Option<ClassId>;

    /// Settings of a class.
    fn class_info(&self, class: ClassId) -> Option<ClassInfo>;

    /// Follow aliases to the current key for a renamed object.
    fn resolve(&self, key: Key) -> Key {
        key
    }
}

#[derive(Debug, Default)]
struct LexiconState {
    names: HashMap<Key, String>,
    keys: HashMap<(ClassId, String), Key>,
    next_index: HashMap<ClassId, u32>,
    classes: BTreeMap<ClassId, ClassInfo>,
    class_names: HashMap<String, ClassId>,
    aliases: HashMap<Key, Key>,
    next_class: u16,
}

impl LexiconState {
    fn add_class(&mut self, class: ClassId, name: &str) {
        self.classes.insert(
            class,
            ClassInfo {
                name: name.to_string(),
                default_xref: None,
            },
        );
        self.class_names.insert(name.to_string(), class);
        self.names.insert(Key::class_marker(class), name.to_string());
        self.next_index.insert(class, 1);
    }

    fn intern(&mut self, class: ClassId, name: &str) -> Result<Key> {
        if let Some(key) = self.keys.get(&(class, name.to_string())) {
            return Ok(*key);
        }
        if class != TAG_CLASS && !self.classes.contains_key(&class) {
            return Err(StoreError::UnknownName {
                name: format!("class {class}"),
            });
        }
        let next = self.next_index.entry(class).or_insert(FIRST_USER_TAG);
        if *next > MAX_INDEX {
            return Err(StoreError::InvalidOperation {
                message: format!("class {class} has no free keys left"),
            });
        }
        let key = Key::new(class, *next);
        *next += 1;
        self.keys.insert((class, name.to_string()), key);
        self.names.insert(key, name.to_string());
        Ok(key)
    }
}

/// In-memory lexicon.
///
/// Comes preloaded with the system tags and the reserved classes
/// (`Subtype`, `Comment`, `Constraint`).
#[derive(Debug)]
pub struct MemoryLexicon {
    state: RwLock<LexiconState>,
}

impl MemoryLexicon {
    /// Create a lexicon holding only the system codes.
    pub fn new() -> Self {
        let mut state = LexiconState {
            next_class: FIRST_USER_CLASS as u16,
            ..Default::default()
        };
        for (key, name) in SYSTEM_TAGS {
            state.keys.insert((TAG_CLASS, name.to_string()), *key);
            state.names.insert(*key, name.to_string());
        }
        state.next_index.insert(TAG_CLASS, FIRST_USER_TAG);
        state.add_class(SUBTYPE_CLASS, "Subtype");
        state.add_class(COMMENT_CLASS, "Comment");
        state.add_class(CONSTRAINT_CLASS, "Constraint");
        Self {
            state: RwLock::new(state),
        }
    }

    /// Define a user class, returning its id. Idempotent per name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidOperation`] when all class ids are used.
    pub fn define_class(&self, name: &str) -> Result<ClassId> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(class) = state.class_names.get(name) {
            return Ok(*class);
        }
        let class = ClassId::try_from(state.next_class).map_err(|_| {
            StoreError::InvalidOperation {
                message: "no free class ids left".to_string(),
            }
        })?;
        state.next_class += 1;
        state.add_class(class, name);
        Ok(class)
    }

    /// Give a class an implied reciprocal tag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownName`] if the class is not defined.
    pub fn set_default_xref(&self, class: ClassId, tag: Key) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let info = state
            .classes
            .get_mut(&class)
            .ok_or_else(|| StoreError::UnknownName {
                name: format!("class {class}"),
            })?;
        info.default_xref = Some(tag);
        Ok(())
    }

    /// Intern a tag name.
    pub fn tag(&self, name: &str) -> Result<Key> {
        self.intern(TAG_CLASS, name)
    }

    /// Intern an object name in a class given by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownName`] if the class is not defined.
    pub fn object(&self, class_name: &str, name: &str) -> Result<Key> {
        let class = self
            .class_by_name(class_name)
            .ok_or_else(|| StoreError::UnknownName {
                name: class_name.to_string(),
            })?;
        self.intern(class, name)
    }

    /// Make `from` resolve to `to` (object rename).
    pub fn alias(&self, from: Key, to: Key) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.aliases.insert(from, to);
    }
}

impl Default for MemoryLexicon {
    fn default() -> Self {
        Self::new()
    }
}

impl Lexicon for MemoryLexicon {
    fn intern(&self, class: ClassId, name: &str) -> Result<Key> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.intern(class, name)
    }

    fn lookup(&self, class: ClassId, name: &str) -> Option<Key> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if class != TAG_CLASS {
            if let Some(info) = state.classes.get(&class) {
                if info.name == name {
                    return Some(Key::class_marker(class));
                }
            }
        }
        state.keys.get(&(class, name.to_string())).copied()
    }

    fn name(&self, key: Key) -> Option<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.names.get(&key).cloned()
    }

    fn class_by_name(&self, name: &str) -> Option<ClassId> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.class_names.get(name).copied()
    }

    fn class_info(&self, class: ClassId) -> Option<ClassInfo> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.classes.get(&class).cloned()
    }

    fn resolve(&self, key: Key) -> Key {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut current = key;
        for _ in 0..MAX_ALIAS_HOPS {
            match state.aliases.get(&current) {
                Some(next) => current = *next,
                None => break,
            }
        }
        current
    }
}
