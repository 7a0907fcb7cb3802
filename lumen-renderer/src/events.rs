use lumen_core::Value;

use crate::dom::LiveNode;

/// Deliver `event` to `target` and then to each ancestor that listens for
/// it. Returns the number of listeners invoked.
pub fn dispatch(target: &LiveNode, event: &str, payload: Value) -> usize {
    let mut invoked = 0;
    let mut current = Some(target.clone());
    while let Some(node) = current {
        if node.dispatch(event, payload.clone()) {
            invoked += 1;
        }
        current = node.parent();
    }
    invoked
}

/// Deliver `event` to every listener for it in the subtree, in document
/// order. Returns the number of listeners invoked.
pub fn broadcast(root: &LiveNode, event: &str, payload: Value) -> usize {
    // handlers may reshape the tree; collect targets first
    listeners_of(root, event)
        .iter()
        .filter(|node| node.dispatch(event, payload.clone()))
        .count()
}

/// Elements in the subtree listening for `event`.
pub fn listeners_of(root: &LiveNode, event: &str) -> Vec<LiveNode> {
    let mut out = Vec::new();
    root.walk(&mut |node| {
        if node.listener(event).is_some() {
            out.push(node.clone());
        }
    });
    out
}
