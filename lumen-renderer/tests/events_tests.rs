use std::cell::RefCell;
use std::rc::Rc;

use lumen_core::{CallError, Func, Value};
use lumen_dom::{Props, h, text};
use lumen_renderer::{Detached, LiveNode, NewTree, events, reconcile_blocking};

fn recorder(log: &Rc<RefCell<Vec<String>>>, name: &'static str) -> Func {
    let log = log.clone();
    Func::new(move |args| {
        log.borrow_mut()
            .push(format!("{name}:{}", args.first().cloned().unwrap_or_default()));
        Ok(Value::Null)
    })
}

#[test]
fn dispatch_bubbles_to_ancestors() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let tree = h(
        "div",
        Props::new().set("(click)", recorder(&log, "outer")),
        vec![h(
            "button",
            Props::new().set("(click)", recorder(&log, "inner")),
            vec![text("+1")],
        )],
    );
    let root = LiveNode::element("main");
    reconcile_blocking(&root, NewTree::Node(tree), &Detached, None);
    let button = root.find_by_tag("button").remove(0);

    let n = events::dispatch(&button, "click", Value::from(1));
    assert_eq!(n, 2);
    assert_eq!(*log.borrow(), vec!["inner:1", "outer:1"]);
}

#[test]
fn broadcast_handles_multiple_targets() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let tree = h(
        "div",
        Props::new(),
        vec![
            h("button", Props::new().set("(click)", recorder(&log, "a")), vec![]),
            h("button", Props::new().set("(click)", recorder(&log, "b")), vec![]),
            h("button", Props::new(), vec![]),
        ],
    );
    let root = LiveNode::element("main");
    reconcile_blocking(&root, NewTree::Node(tree), &Detached, None);

    assert_eq!(events::listeners_of(&root, "click").len(), 2);
    let n = events::broadcast(&root, "click", Value::Null);
    assert_eq!(n, 2);
    assert_eq!(*log.borrow(), vec!["a:", "b:"]);
}

#[test]
fn failing_handler_does_not_stop_bubbling() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let failing = Func::new(|_| Err(CallError::msg("handler exploded")));
    let tree = h(
        "div",
        Props::new().set("(click)", recorder(&log, "outer")),
        vec![h("button", Props::new().set("(click)", failing), vec![])],
    );
    let root = LiveNode::element("main");
    reconcile_blocking(&root, NewTree::Node(tree), &Detached, None);
    let button = root.find_by_tag("button").remove(0);

    assert_eq!(events::dispatch(&button, "click", Value::Null), 2);
    assert_eq!(*log.borrow(), vec!["outer:"]);
}
