use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use crate::subscription::Subscription;
use crate::value::Value;

type Listener = Rc<dyn Fn(&str, &Value)>;

struct Inner {
    values: RefCell<FxHashMap<String, Value>>,
    listeners: RefCell<Vec<(u64, Listener)>>,
    next_listener: Cell<u64>,
}

/// Reactive component state: a map of named values.
///
/// Reads pass through. A write is applied, and subscribers are notified, only
/// when the new value differs by identity ([`Value::same`]) from the current one.
#[derive(Clone)]
pub struct Store {
    inner: Rc<Inner>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                values: RefCell::new(FxHashMap::default()),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
            }),
        }
    }

    pub fn from_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let store = Store::new();
        {
            let mut map = store.inner.values.borrow_mut();
            for (k, v) in values {
                map.insert(k.into(), v.into());
            }
        }
        store
    }

    /// Read a value; missing keys read as `Null`.
    pub fn get(&self, key: &str) -> Value {
        self.try_get(key).unwrap_or_default()
    }

    pub fn try_get(&self, key: &str) -> Option<Value> {
        self.inner.values.borrow().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.values.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.values.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Write a value. Returns `true` when the write changed the store.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let value = value.into();
        {
            let mut values = self.inner.values.borrow_mut();
            if let Some(current) = values.get(&key) {
                if current.same(&value) {
                    return false;
                }
            }
            values.insert(key.clone(), value.clone());
        }
        self.notify(&key, &value);
        true
    }

    /// Compute a new value from the current one and write it.
    pub fn update(&self, key: impl Into<String>, f: impl FnOnce(&Value) -> Value) -> bool {
        let key = key.into();
        let next = f(&self.get(&key));
        self.set(key, next)
    }

    /// Call `listener(key, new_value)` after every effective write.
    pub fn subscribe(&self, listener: impl Fn(&str, &Value) + 'static) -> Subscription {
        let id = self.inner.next_listener.get();
        self.inner.next_listener.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));

        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.borrow_mut().retain(|(lid, _)| *lid != id);
            }
        })
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    fn notify(&self, key: &str, value: &Value) {
        // Snapshot listeners so they may subscribe, unsubscribe or write.
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        tracing::trace!(key, listeners = listeners.len(), "state changed");
        for listener in listeners {
            listener(key, value);
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Store::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.inner.values.borrow().iter())
            .finish()
    }
}
