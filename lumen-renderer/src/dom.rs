//! In-memory live document the reconciler writes to.
//!
//! A [`LiveNode`] is a shared handle: clones point at the same node, and
//! identity is pointer identity ([`LiveNode::ptr_eq`]). Parents own their
//! children; children keep a weak link back up.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use lumen_core::{Func, Value};
use lumen_dom::{Key, Props, VNode};
use rustc_hash::FxHashMap;

use crate::directive::Directive;

/// Tag of the element standing in for a node that could not be built.
pub const PLACEHOLDER_TAG: &str = "lumen-placeholder";

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub(crate) type DirectiveCell = Rc<RefCell<Box<dyn Directive>>>;

struct DirectiveSlot {
    instance: DirectiveCell,
    value: Value,
}

enum Kind {
    Element(String),
    Text(String),
}

struct NodeData {
    kind: Kind,
    attributes: Vec<(String, String)>,
    properties: FxHashMap<String, Value>,
    listeners: FxHashMap<String, Func>,
    directives: FxHashMap<String, DirectiveSlot>,
    children: Vec<LiveNode>,
    parent: Weak<RefCell<NodeData>>,
    key: Option<Key>,
    leaving: bool,
}

impl NodeData {
    fn new(kind: Kind) -> Self {
        Self {
            kind,
            attributes: Vec::new(),
            properties: FxHashMap::default(),
            listeners: FxHashMap::default(),
            directives: FxHashMap::default(),
            children: Vec::new(),
            parent: Weak::new(),
            key: None,
            leaving: false,
        }
    }
}

#[derive(Clone)]
pub struct LiveNode(Rc<RefCell<NodeData>>);

impl LiveNode {
    pub fn element(tag: impl Into<String>) -> Self {
        LiveNode(Rc::new(RefCell::new(NodeData::new(Kind::Element(tag.into())))))
    }

    pub fn text(content: impl Into<String>) -> Self {
        LiveNode(Rc::new(RefCell::new(NodeData::new(Kind::Text(content.into())))))
    }

    pub fn ptr_eq(&self, other: &LiveNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.borrow().kind, Kind::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.0.borrow().kind, Kind::Text(_))
    }

    pub fn tag(&self) -> Option<String> {
        match &self.0.borrow().kind {
            Kind::Element(tag) => Some(tag.clone()),
            Kind::Text(_) => None,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        match &self.0.borrow().kind {
            Kind::Element(t) => t.eq_ignore_ascii_case(tag),
            Kind::Text(_) => false,
        }
    }

    /// Content of a text node.
    pub fn text_data(&self) -> Option<String> {
        match &self.0.borrow().kind {
            Kind::Text(t) => Some(t.clone()),
            Kind::Element(_) => None,
        }
    }

    /// Replace the content of a text node. No-op on elements.
    pub fn set_text(&self, content: &str) {
        if let Kind::Text(t) = &mut self.0.borrow_mut().kind {
            t.clear();
            t.push_str(content);
        }
    }

    pub fn key(&self) -> Option<Key> {
        self.0.borrow().key.clone()
    }

    pub fn set_key(&self, key: Option<Key>) {
        self.0.borrow_mut().key = key;
    }

    /// Set while a leave animation runs; leaving nodes are invisible to
    /// reconciliation.
    pub fn is_leaving(&self) -> bool {
        self.0.borrow().leaving
    }

    pub fn set_leaving(&self, leaving: bool) {
        self.0.borrow_mut().leaving = leaving;
    }

    // attributes

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.0
            .borrow()
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.0.borrow().attributes.iter().any(|(k, _)| k == name)
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        let mut data = self.0.borrow_mut();
        match data.attributes.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => {
                slot.1.clear();
                slot.1.push_str(value);
            }
            None => data.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attribute(&self, name: &str) -> bool {
        let mut data = self.0.borrow_mut();
        let before = data.attributes.len();
        data.attributes.retain(|(k, _)| k != name);
        data.attributes.len() != before
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.0.borrow().attributes.iter().map(|(k, _)| k.clone()).collect()
    }

    // properties

    pub fn property(&self, name: &str) -> Option<Value> {
        self.0.borrow().properties.get(name).cloned()
    }

    pub fn set_property(&self, name: &str, value: Value) {
        self.0.borrow_mut().properties.insert(name.to_string(), value);
    }

    pub fn remove_property(&self, name: &str) -> Option<Value> {
        self.0.borrow_mut().properties.remove(name)
    }

    pub fn property_names(&self) -> Vec<String> {
        self.0.borrow().properties.keys().cloned().collect()
    }

    // listeners

    pub fn listener(&self, event: &str) -> Option<Func> {
        self.0.borrow().listeners.get(event).cloned()
    }

    pub fn add_listener(&self, event: &str, handler: Func) {
        self.0.borrow_mut().listeners.insert(event.to_string(), handler);
    }

    pub fn remove_listener(&self, event: &str) -> Option<Func> {
        self.0.borrow_mut().listeners.remove(event)
    }

    pub fn listener_names(&self) -> Vec<String> {
        self.0.borrow().listeners.keys().cloned().collect()
    }

    /// Invoke this node's listener for `event`. Handler failures are logged
    /// and contained. Returns whether a listener was present.
    pub fn dispatch(&self, event: &str, payload: Value) -> bool {
        // release the borrow before running user code
        let Some(handler) = self.listener(event) else {
            return false;
        };
        if let Err(err) = handler.call(&[payload]) {
            tracing::error!(event, %err, "event handler failed");
        }
        true
    }

    // directives

    pub(crate) fn directive(&self, name: &str) -> Option<(DirectiveCell, Value)> {
        self.0
            .borrow()
            .directives
            .get(name)
            .map(|slot| (slot.instance.clone(), slot.value.clone()))
    }

    pub(crate) fn set_directive(&self, name: &str, instance: DirectiveCell, value: Value) {
        self.0
            .borrow_mut()
            .directives
            .insert(name.to_string(), DirectiveSlot { instance, value });
    }

    pub(crate) fn set_directive_value(&self, name: &str, value: Value) {
        if let Some(slot) = self.0.borrow_mut().directives.get_mut(name) {
            slot.value = value;
        }
    }

    pub(crate) fn take_directive(&self, name: &str) -> Option<DirectiveCell> {
        self.0.borrow_mut().directives.remove(name).map(|slot| slot.instance)
    }

    pub(crate) fn take_directives(&self) -> Vec<DirectiveCell> {
        self.0
            .borrow_mut()
            .directives
            .drain()
            .map(|(_, slot)| slot.instance)
            .collect()
    }

    /// Names of the directives attached to this element.
    pub fn directive_names(&self) -> Vec<String> {
        self.0.borrow().directives.keys().cloned().collect()
    }

    // tree

    pub fn parent(&self) -> Option<LiveNode> {
        self.0.borrow().parent.upgrade().map(LiveNode)
    }

    pub fn children(&self) -> Vec<LiveNode> {
        self.0.borrow().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    pub fn child(&self, index: usize) -> Option<LiveNode> {
        self.0.borrow().children.get(index).cloned()
    }

    pub fn append_child(&self, child: &LiveNode) {
        self.insert_before(child, None);
    }

    /// Insert `child` before `reference`, or at the end when `reference` is
    /// `None` or not a child of `self`. A child attached elsewhere is moved.
    pub fn insert_before(&self, child: &LiveNode, reference: Option<&LiveNode>) {
        if child.ptr_eq(self) {
            return;
        }
        child.detach();
        {
            let mut data = self.0.borrow_mut();
            let index = reference
                .and_then(|r| data.children.iter().position(|c| c.ptr_eq(r)))
                .unwrap_or(data.children.len());
            data.children.insert(index, child.clone());
        }
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
    }

    /// Put `new` where `old` is. Returns `false` if `old` is not a child.
    pub fn replace_child(&self, new: &LiveNode, old: &LiveNode) -> bool {
        if new.ptr_eq(old) {
            return true;
        }
        let attached = self.0.borrow().children.iter().any(|c| c.ptr_eq(old));
        if !attached {
            return false;
        }
        self.insert_before(new, Some(old));
        old.detach();
        true
    }

    pub fn remove_child(&self, child: &LiveNode) -> bool {
        let is_child = child.parent().is_some_and(|p| p.ptr_eq(self));
        if is_child {
            child.detach();
        }
        is_child
    }

    /// Unlink from the parent, if any.
    pub fn detach(&self) {
        if let Some(parent) = self.parent() {
            parent.0.borrow_mut().children.retain(|c| !c.ptr_eq(self));
        }
        self.0.borrow_mut().parent = Weak::new();
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.walk(&mut |node| {
            if let Some(t) = node.text_data() {
                out.push_str(&t);
            }
        });
        out
    }

    /// Pre-order visit of this node and its descendants.
    pub fn walk(&self, f: &mut dyn FnMut(&LiveNode)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Descendant elements (self included) with the given tag, in document order.
    pub fn find_by_tag(&self, tag: &str) -> Vec<LiveNode> {
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if node.has_tag(tag) {
                out.push(node.clone());
            }
        });
        out
    }

    /// Markup of this subtree. Properties, listeners and directives are not
    /// serialised.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        let data = self.0.borrow();
        match &data.kind {
            Kind::Text(t) => escape_into(t, false, out),
            Kind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (k, v) in &data.attributes {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    escape_into(v, true, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_TAGS.contains(&tag.to_ascii_lowercase().as_str()) {
                    return;
                }
                for child in &data.children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    /// Describe this subtree as a [`VNode`] with binding markers restored:
    /// properties as `[name]`, listeners as `(name)`.
    pub fn to_vnode(&self) -> VNode {
        let data = self.0.borrow();
        match &data.kind {
            Kind::Text(t) => VNode::Text(t.clone()),
            Kind::Element(tag) => {
                let mut props = Props::new();
                for (k, v) in &data.attributes {
                    props.insert(k.as_str(), v.as_str());
                }
                let mut properties: Vec<_> = data.properties.iter().collect();
                properties.sort_by(|a, b| a.0.cmp(b.0));
                for (k, v) in properties {
                    props.insert(format!("[{k}]"), v.clone());
                }
                let mut listeners: Vec<_> = data.listeners.iter().collect();
                listeners.sort_by(|a, b| a.0.cmp(b.0));
                for (k, f) in listeners {
                    props.insert(format!("({k})"), f.clone());
                }
                VNode::Element {
                    tag: tag.clone(),
                    props,
                    children: data.children.iter().map(LiveNode::to_vnode).collect(),
                    key: data.key.clone(),
                }
            }
        }
    }
}

fn escape_into(s: &str, attribute: bool, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

impl fmt::Debug for LiveNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        match &data.kind {
            Kind::Text(t) => f.debug_tuple("Text").field(t).finish(),
            Kind::Element(tag) => f
                .debug_struct("Element")
                .field("tag", tag)
                .field("key", &data.key)
                .field("children", &data.children.len())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_moves_between_parents() {
        let a = LiveNode::element("a");
        let b = LiveNode::element("b");
        let x = LiveNode::text("x");
        a.append_child(&x);
        b.append_child(&x);
        assert_eq!(a.child_count(), 0);
        assert!(x.parent().is_some_and(|p| p.ptr_eq(&b)));
    }

    #[test]
    fn text_data_reads_text_nodes_only() {
        let t = LiveNode::text("hi");
        assert_eq!(t.text_data().as_deref(), Some("hi"));
        t.set_text("bye");
        assert_eq!(t.text_data().as_deref(), Some("bye"));
        assert_eq!(LiveNode::element("p").text_data(), None);
    }

    #[test]
    fn insert_before_reorders_within_parent() {
        let list = LiveNode::element("ul");
        let items: Vec<LiveNode> = ["1", "2", "3"].iter().map(|t| LiveNode::text(*t)).collect();
        for item in &items {
            list.append_child(item);
        }
        list.insert_before(&items[2], Some(&items[0]));
        assert_eq!(list.text_content(), "312");
        assert!(list.replace_child(&LiveNode::text("9"), &items[1]));
        assert_eq!(list.text_content(), "319");
        assert!(items[1].parent().is_none());
    }

    #[test]
    fn html_escapes_and_skips_void_close() {
        let div = LiveNode::element("div");
        div.set_attribute("title", "a\"b");
        let input = LiveNode::element("input");
        input.set_attribute("type", "checkbox");
        div.append_child(&input);
        div.append_child(&LiveNode::text("1 < 2"));
        assert_eq!(
            div.to_html(),
            r#"<div title="a&quot;b"><input type="checkbox">1 &lt; 2</div>"#
        );
    }

    #[test]
    fn dispatch_contains_handler_errors() {
        let node = LiveNode::element("button");
        node.add_listener(
            "click",
            Func::new(|_| Err(lumen_core::CallError::msg("boom"))),
        );
        assert!(node.dispatch("click", Value::Null));
        assert!(!node.dispatch("input", Value::Null));
    }
}
