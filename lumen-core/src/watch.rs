use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::store::Store;
use crate::subscription::Subscription;
use crate::value::Value;

/// Watch one key of a store and call `callback(new, old)` when it changes.
/// - No callback for the current value
/// - Triggers only on identity changes (the store filters no-op writes)
/// - The callback may write to the store, including the watched key; such
///   nested changes are delivered in order after the callback returns
///
/// Example:
/// watch(&state, "count", |new, old| println!("{old} -> {new}"));
pub fn watch<F>(store: &Store, key: impl Into<String>, callback: F) -> Subscription
where
    F: FnMut(&Value, &Value) + 'static,
{
    let key = key.into();
    let prev = Rc::new(RefCell::new(store.get(&key)));
    let queue: Rc<RefCell<VecDeque<(Value, Value)>>> = Rc::new(RefCell::new(VecDeque::new()));
    let running = Rc::new(Cell::new(false));
    let callback = Rc::new(RefCell::new(callback));

    store.subscribe(move |changed, next| {
        if changed != key {
            return;
        }
        // Record old/new before calling user code so the callback can write freely.
        let old = prev.replace(next.clone());
        queue.borrow_mut().push_back((next.clone(), old));

        if running.replace(true) {
            return;
        }
        loop {
            let item = queue.borrow_mut().pop_front();
            let Some((new, old)) = item else { break };
            (callback.borrow_mut())(&new, &old);
        }
        running.set(false);
    })
}
