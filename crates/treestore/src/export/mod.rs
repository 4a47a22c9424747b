//! Export module for handing objects to external tools.
//!
//! Supports two formats:
//! - **ace**: the line-oriented text dump genome databases exchange
//! - **JSON**: named tree for web tools, plus the raw [`NodeView`](crate::NodeView)

pub mod ace;
pub mod json;

pub use ace::to_ace;
pub use json::to_json;

use crate::key::{Key, KeyKind};
use crate::lexicon::Lexicon;

/// Display name of an object reference or tag.
pub(crate) fn display_name(lexicon: &dyn Lexicon, key: Key) -> String {
    lexicon.name(key).unwrap_or_else(|| key.to_string())
}

/// Display name of an object's class.
pub(crate) fn class_name(lexicon: &dyn Lexicon, key: Key) -> String {
    lexicon
        .class_info(key.class())
        .map(|info| info.name)
        .unwrap_or_else(|| format!("Class{}", key.class()))
}

/// Whether a node renders as a bare name rather than a quoted reference.
pub(crate) fn is_bare(key: Key) -> bool {
    key.kind() == KeyKind::Tag || key.is_class_marker()
}
