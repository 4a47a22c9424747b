//! Constraint evaluation collaborator.
//!
//! A model column written `?Class Constraint Name` records `Name`; every
//! value added to that column is passed to the store's [`ConstraintCheck`]
//! before it is inserted.

use crate::key::Key;
use crate::tree::Value;

/// Decides whether a value satisfies a named constraint.
pub trait ConstraintCheck: Send + Sync {
    /// Whether `key` (with `value` for scalars) satisfies `constraint`.
    fn check(&self, constraint: Key, key: Key, value: &Value) -> bool;
}

/// Accepts everything. The default when no query engine is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ConstraintCheck for AcceptAll {
    fn check(&self, _constraint: Key, _key: Key, _value: &Value) -> bool {
        true
    }
}

impl<F> ConstraintCheck for F
where
    F: Fn(Key, Key, &Value) -> bool + Send + Sync,
{
    fn check(&self, constraint: Key, key: Key, value: &Value) -> bool {
        self(constraint, key, value)
    }
}
