use std::rc::Rc;

use lumen_core::Value;
use rustc_hash::FxHashMap;

const PREFIX: &str = "__lumen_ref_";

/// Per-pass map from generated keys to values that cannot travel as strings.
///
/// Property bindings holding lists, objects, functions or opaque values are
/// stored here during a render pass; the generated key stands in for the
/// value in the node-tree and the reconciler resolves it back.
#[derive(Debug, Default)]
pub struct RefRegistry {
    entries: FxHashMap<String, Value>,
    next: u64,
}

impl RefRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next = 0;
    }

    pub fn register(&mut self, value: Value) -> String {
        let key = format!("{PREFIX}{}", self.next);
        self.next += 1;
        self.entries.insert(key.clone(), value);
        key
    }

    pub fn resolve(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> RefSnapshot {
        RefSnapshot(Rc::new(self.entries.clone()))
    }
}

/// Read-only view of a [`RefRegistry`] handed to the reconciler.
#[derive(Debug, Clone, Default)]
pub struct RefSnapshot(Rc<FxHashMap<String, Value>>);

impl RefSnapshot {
    /// Swap a generated key for the value it stands for; anything else is
    /// returned unchanged.
    pub fn resolve(&self, value: &Value) -> Value {
        match value.as_str() {
            Some(key) if key.starts_with(PREFIX) => {
                self.0.get(key).cloned().unwrap_or_else(|| value.clone())
            }
            _ => value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_resolve_through_snapshot() {
        let mut refs = RefRegistry::new();
        let list = Value::list([1, 2]);
        let key = refs.register(list.clone());
        let snap = refs.snapshot();
        assert!(snap.resolve(&Value::from(key.as_str())).same(&list));
        assert_eq!(snap.resolve(&Value::from("plain")), Value::from("plain"));

        refs.clear();
        assert!(refs.is_empty());
        // earlier snapshots are unaffected
        assert!(snap.resolve(&Value::from(key.as_str())).same(&list));
    }
}
