//! Interned keys, reserved system codes, and key classification.
//!
//! A [`Key`] packs a class id into its high 8 bits and an index into the low
//! 24 bits. Codes are assigned by the [`Lexicon`](crate::lexicon::Lexicon);
//! the only codes this crate fixes are the system ones declared here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Class identifier (high byte of a [`Key`]).
pub type ClassId = u8;

const INDEX_BITS: u32 = 24;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;

/// An interned 32-bit code naming a tag, a scalar type, or an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(u32);

impl Key {
    /// Build a key from a class and an index.
    pub const fn new(class: ClassId, index: u32) -> Self {
        Key(((class as u32) << INDEX_BITS) | (index & INDEX_MASK))
    }

    /// Reinterpret a raw code.
    pub const fn from_raw(raw: u32) -> Self {
        Key(raw)
    }

    /// The raw 32-bit code.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Class of the key.
    pub const fn class(self) -> ClassId {
        (self.0 >> INDEX_BITS) as ClassId
    }

    /// Index within the class.
    pub const fn index(self) -> u32 {
        self.0 & INDEX_MASK
    }

    /// The class marker (`?Class`) for a class: index 0.
    ///
    /// It is also the key under which the class model is registered.
    pub const fn class_marker(class: ClassId) -> Self {
        Key::new(class, 0)
    }

    /// Whether this key is the marker of its class.
    pub const fn is_class_marker(self) -> bool {
        self.class() != TAG_CLASS && self.index() == 0
    }

    /// Whether this key names a free-text comment.
    pub const fn is_comment(self) -> bool {
        self.class() == COMMENT_CLASS && self.index() != 0
    }

    /// Whether this key names a subtype model (`#Name`).
    pub const fn is_subtype(self) -> bool {
        self.class() == SUBTYPE_CLASS && self.index() != 0
    }

    /// Whether this key is one of the schema annotation markers.
    pub fn is_annotation(self) -> bool {
        matches!(self, UNIQUE | XREF | REPEAT | COORD | CONSTRAINT)
    }

    /// Classify the key.
    pub fn kind(self) -> KeyKind {
        if self.class() != TAG_CLASS {
            return KeyKind::KeyRef;
        }
        match self {
            TEXT => KeyKind::Text,
            INT => KeyKind::Int,
            FLOAT => KeyKind::Float,
            DATE => KeyKind::Date,
            _ => KeyKind::Tag,
        }
    }

    /// Storage address of the object: big-endian so byte order equals key order.
    pub fn to_address(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Inverse of [`Key::to_address`].
    pub fn from_address(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 4] = bytes.try_into().ok()?;
        Some(Key(u32::from_be_bytes(raw)))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.class(), self.index())
    }
}

/// What a key denotes, decided once instead of by numeric ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyKind {
    /// Text scalar marker; the node carries a string
    Text,
    /// Integer scalar marker; the node carries an `i32`
    Int,
    /// Float scalar marker; the node carries an `f32`
    Float,
    /// Date scalar marker; the node carries a `u32` timestamp
    Date,
    /// Reference to another object
    KeyRef,
    /// Schema tag or system marker
    Tag,
}

impl KeyKind {
    /// Scalar kinds carry a value cell or text payload.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            KeyKind::Text | KeyKind::Int | KeyKind::Float | KeyKind::Date
        )
    }

    /// Numeric kinds occupy one extra forward cell when packed.
    pub fn is_numeric(self) -> bool {
        matches!(self, KeyKind::Int | KeyKind::Float | KeyKind::Date)
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Text => write!(f, "Text"),
            KeyKind::Int => write!(f, "Int"),
            KeyKind::Float => write!(f, "Float"),
            KeyKind::Date => write!(f, "Date"),
            KeyKind::KeyRef => write!(f, "KeyRef"),
            KeyKind::Tag => write!(f, "Tag"),
        }
    }
}

/// Class of tags and system markers.
pub const TAG_CLASS: ClassId = 0;
/// Class of subtype model keys.
pub const SUBTYPE_CLASS: ClassId = 1;
/// Class of free-text comment objects.
pub const COMMENT_CLASS: ClassId = 2;
/// Class of constraint objects referenced from models.
pub const CONSTRAINT_CLASS: ClassId = 3;
/// First class id handed out to user classes.
pub const FIRST_USER_CLASS: ClassId = 8;

/// Text scalar marker.
pub const TEXT: Key = Key::new(TAG_CLASS, 1);
/// Integer scalar marker.
pub const INT: Key = Key::new(TAG_CLASS, 2);
/// Float scalar marker.
pub const FLOAT: Key = Key::new(TAG_CLASS, 3);
/// Date scalar marker.
pub const DATE: Key = Key::new(TAG_CLASS, 4);
/// Schema wildcard: matches any key.
pub const ANY: Key = Key::new(TAG_CLASS, 5);
/// At most one occupied slot in the column to the right.
pub const UNIQUE: Key = Key::new(TAG_CLASS, 6);
/// Next token is the reciprocal tag.
pub const XREF: Key = Key::new(TAG_CLASS, 7);
/// The node repeats to its own right.
pub const REPEAT: Key = Key::new(TAG_CLASS, 8);
/// Leaf takes part in coordinate shifts.
pub const COORD: Key = Key::new(TAG_CLASS, 9);
/// Next token names a constraint object.
pub const CONSTRAINT: Key = Key::new(TAG_CLASS, 10);
/// Reciprocal tag of every comment.
pub const QUOTED_IN: Key = Key::new(TAG_CLASS, 11);
/// First tag index handed out to user tags.
pub const FIRST_USER_TAG: u32 = 64;

/// Names of the reserved tag-class codes, by index.
pub(crate) const SYSTEM_TAGS: &[(Key, &str)] = &[
    (TEXT, "Text"),
    (INT, "Int"),
    (FLOAT, "Float"),
    (DATE, "DateType"),
    (ANY, "ANY"),
    (UNIQUE, "UNIQUE"),
    (XREF, "XREF"),
    (REPEAT, "REPEAT"),
    (COORD, "COORD"),
    (CONSTRAINT, "Constraint"),
    (QUOTED_IN, "Quoted_in"),
];
