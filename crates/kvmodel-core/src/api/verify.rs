//! Read-only traversal of a table's raw state, used to check an engine's
//! contents against the model key by key.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLockReadGuard;

use crate::mvcc::TableItem;
use crate::types::TS_NONE;
use crate::value::Value;

/// Walks the live keys of a table in key order.
///
/// A key is live if its latest committed value is not deleted. The cursor
/// holds the table's read lock for its whole lifetime.
pub struct VerifyCursor<'a> {
    items: RwLockReadGuard<'a, BTreeMap<Value, TableItem>>,
    last: Option<Value>,
}

impl<'a> VerifyCursor<'a> {
    pub(crate) fn new(items: RwLockReadGuard<'a, BTreeMap<Value, TableItem>>) -> Self {
        Self { items, last: None }
    }

    fn peek(&self) -> Option<(&Value, &TableItem)> {
        let lower = match &self.last {
            Some(last) => Bound::Excluded(last),
            None => Bound::Unbounded,
        };
        self.items
            .range::<Value, _>((lower, Bound::Unbounded))
            .find(|(_, item)| !item.get(TS_NONE).is_none())
    }

    /// Whether another live key remains.
    pub fn has_next(&self) -> bool {
        self.peek().is_some()
    }

    /// Advance to the next live key and check it against the expected pair.
    ///
    /// The value matches if any update sharing the newest commit timestamp holds
    /// it. Returns false when the cursor is exhausted.
    pub fn verify_next(&mut self, key: &Value, value: &Value) -> bool {
        let Some((next, matches)) = self
            .peek()
            .map(|(k, item)| (k.clone(), k == key && item.contains_any(value, TS_NONE)))
        else {
            return false;
        };
        self.last = Some(next);
        matches
    }

    /// Every version chain in the table, live or not.
    pub fn chains(&self) -> impl Iterator<Item = (&Value, &TableItem)> {
        self.items.iter()
    }
}

impl Iterator for VerifyCursor<'_> {
    type Item = (Value, Value);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = self
            .peek()
            .map(|(k, item)| (k.clone(), item.get(TS_NONE)))?;
        self.last = Some(key.clone());
        Some((key, value))
    }
}
