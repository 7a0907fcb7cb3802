use std::cell::RefCell as StdRefCell;
use std::rc::Rc;

use lumen_core::{Store, Value};

#[test]
fn set_notifies_only_on_identity_change() {
    let state = Store::from_values([("count", Value::from(0))]);
    let seen: Rc<StdRefCell<Vec<(String, Value)>>> = Rc::new(StdRefCell::new(vec![]));

    let _sub = {
        let seen = seen.clone();
        state.subscribe(move |key, value| seen.borrow_mut().push((key.to_string(), value.clone())))
    };

    assert!(state.set("count", 1));
    // Same primitive value: no write, no notification
    assert!(!state.set("count", 1));
    assert_eq!(&*seen.borrow(), &vec![("count".to_string(), Value::from(1))]);
    assert_eq!(state.get("count"), Value::from(1));
}

#[test]
fn reference_values_compare_by_identity() {
    let rows = Value::list([1, 2, 3]);
    let state = Store::from_values([("rows", rows.clone())]);

    // Reassigning the very same list is not a change
    assert!(!state.set("rows", rows.clone()));
    // A structurally equal but new list is
    assert!(state.set("rows", Value::list([1, 2, 3])));
}

#[test]
fn unsubscribe_stops_notifications() {
    let state = Store::new();
    let hits = Rc::new(StdRefCell::new(0));
    let sub = {
        let hits = hits.clone();
        state.subscribe(move |_, _| *hits.borrow_mut() += 1)
    };
    state.set("a", 1);
    sub.unsubscribe();
    state.set("a", 2);
    assert_eq!(*hits.borrow(), 1);
    assert_eq!(state.listener_count(), 0);
}

#[test]
fn missing_keys_read_as_null_and_update_composes() {
    let state = Store::new();
    assert!(state.get("nope").is_null());
    state.set("n", 2);
    state.update("n", |v| Value::from(v.to_number() * 10.0));
    assert_eq!(state.get("n"), Value::from(20));
}
