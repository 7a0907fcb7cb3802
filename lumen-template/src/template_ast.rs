use lumen_dom::Binding;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Static,   // class="app"
    Property, // [value]="count"
    Event,    // (click)="increment()"
}

/// An attribute as written. `name` keeps `[..]` / `(..)` markers verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateAttr {
    pub name: String,
    pub value: Option<String>,
    pub kind: AttrKind,
}

impl TemplateAttr {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        let name = name.into();
        let kind = match Binding::classify(&name) {
            Binding::Property(_) => AttrKind::Property,
            Binding::Event(_) => AttrKind::Event,
            Binding::Attribute(_) => AttrKind::Static,
        };
        Self { name, value, kind }
    }

    /// Name without binding markers.
    pub fn bare_name(&self) -> &str {
        match Binding::classify(&self.name) {
            Binding::Property(n) | Binding::Event(n) | Binding::Attribute(n) => n,
        }
    }
}

/// One arm of an `@if` / `@else if` / `@else` chain. `condition` is `None` for `@else`.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub condition: Option<String>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Root(Vec<Node>),
    Element {
        tag: String,
        attrs: Vec<TemplateAttr>,
        children: Vec<Node>,
        self_closing: bool,
    },
    Text(String),
    Interpolation(String), // {{ expr | pipe:arg }}
    If(Vec<Branch>),
    For {
        declaration: String, // let item of items; track item.id
        children: Vec<Node>,
    },
}

impl Node {
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Root(children)
            | Node::Element { children, .. }
            | Node::For { children, .. } => children,
            _ => &[],
        }
    }

    pub(crate) fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(t) if t.chars().all(char::is_whitespace))
    }

    pub(crate) fn is_inline(&self) -> bool {
        matches!(self, Node::Text(_) | Node::Interpolation(_))
    }
}
