use std::rc::Rc;

use lumen_core::Value;
use smallvec::SmallVec;

/// Identity key of a node among its siblings.
pub type Key = Rc<str>;

/// Lightweight description of one output node. Rebuilt on every render pass
/// and dropped once reconciled.
#[derive(Debug, Clone, PartialEq)]
pub enum VNode {
    Element {
        tag: String,
        props: Props,
        children: Vec<VNode>,
        key: Option<Key>,
    },
    Text(String),
}

impl VNode {
    /// Attach an identity key (ignored on text nodes).
    pub fn with_key(mut self, k: impl Into<Key>) -> Self {
        if let VNode::Element { key, .. } = &mut self {
            *key = Some(k.into());
        }
        self
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            VNode::Element { tag, .. } => Some(tag),
            VNode::Text(_) => None,
        }
    }

    pub fn key(&self) -> Option<&Key> {
        match self {
            VNode::Element { key, .. } => key.as_ref(),
            VNode::Text(_) => None,
        }
    }

    pub fn props(&self) -> Option<&Props> {
        match self {
            VNode::Element { props, .. } => Some(props),
            VNode::Text(_) => None,
        }
    }

    pub fn children(&self) -> &[VNode] {
        match self {
            VNode::Element { children, .. } => children,
            VNode::Text(_) => &[],
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, VNode::Text(_))
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(node: &VNode, out: &mut String) {
    match node {
        VNode::Text(t) => out.push_str(t),
        VNode::Element { children, .. } => {
            for c in children {
                collect_text(c, out);
            }
        }
    }
}

/// Ordered name → value bindings of an element. Names keep their binding
/// markers: `[value]` is a property binding, `(click)` an event binding,
/// anything else a plain attribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Props {
    entries: SmallVec<[(String, Value); 4]>,
}

impl Props {
    pub fn new() -> Self {
        Self {
            entries: SmallVec::new(),
        }
    }

    pub fn set(mut self, k: impl Into<String>, v: impl Into<Value>) -> Self {
        self.insert(k, v);
        self
    }

    /// Insert or replace a binding, keeping first-insertion order.
    pub fn insert(&mut self, k: impl Into<String>, v: impl Into<Value>) {
        let k = k.into();
        let v = v.into();
        match self.entries.iter_mut().find(|(name, _)| *name == k) {
            Some(slot) => slot.1 = v,
            None => self.entries.push((k, v)),
        }
    }

    pub fn get(&self, k: &str) -> Option<&Value> {
        self.entries.iter().find(|(name, _)| name == k).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Allow concise props creation
impl From<()> for Props {
    fn from(_: ()) -> Self {
        Props::default()
    }
}
impl From<Vec<(&str, &str)>> for Props {
    fn from(v: Vec<(&str, &str)>) -> Self {
        let mut p = Props::new();
        for (k, v) in v {
            p.insert(k, v);
        }
        p
    }
}
impl From<Vec<(&str, Value)>> for Props {
    fn from(v: Vec<(&str, Value)>) -> Self {
        let mut p = Props::new();
        for (k, v) in v {
            p.insert(k, v);
        }
        p
    }
}

/// How the reconciler treats a prop name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding<'a> {
    /// `[name]`: assigned as a live property or handed to a directive.
    Property(&'a str),
    /// `(name)`: an event listener.
    Event(&'a str),
    /// Plain string attribute.
    Attribute(&'a str),
}

impl<'a> Binding<'a> {
    pub fn classify(name: &'a str) -> Binding<'a> {
        let inner = |open: char, close: char| {
            name.strip_prefix(open)
                .and_then(|rest| rest.strip_suffix(close))
                .filter(|inner| !inner.is_empty())
        };
        if let Some(n) = inner('[', ']') {
            Binding::Property(n)
        } else if let Some(n) = inner('(', ')') {
            Binding::Event(n)
        } else {
            Binding::Attribute(name)
        }
    }
}

/// The `makeElement` / `makeText` pair a render program builds its output with.
pub trait NodeFactory {
    fn element(&mut self, tag: &str, props: Props, children: Vec<VNode>, key: Option<Key>) -> VNode;
    fn text(&mut self, content: String) -> VNode;
}

/// Builds plain [`VNode`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFactory;

impl NodeFactory for DefaultFactory {
    fn element(&mut self, tag: &str, props: Props, children: Vec<VNode>, key: Option<Key>) -> VNode {
        VNode::Element {
            tag: tag.to_string(),
            props,
            children,
            key,
        }
    }

    fn text(&mut self, content: String) -> VNode {
        VNode::Text(content)
    }
}

pub fn h(tag: impl Into<String>, props: impl Into<Props>, children: Vec<VNode>) -> VNode {
    VNode::Element {
        tag: tag.into(),
        props: props.into(),
        children,
        key: None,
    }
}
pub fn text(t: impl Into<String>) -> VNode {
    VNode::Text(t.into())
}
