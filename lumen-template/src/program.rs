//! Compiled render programs.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use lumen_core::{CallError, Func, Value};
use lumen_dom::{DefaultFactory, Key, NodeFactory, Props, VNode};
use rustc_hash::FxHasher;
use tracing::debug;

use crate::error::EvalError;
use crate::eval::{Locals, Scope, evaluate, execute};
use crate::expr::Expr;
use crate::refs::RefRegistry;

const IMPLICIT_LOCALS: [&str; 6] = ["$index", "$count", "$first", "$last", "$even", "$odd"];

pub(crate) enum Instr {
    Element {
        tag: String,
        attrs: Vec<AttrInstr>,
        children: Vec<Instr>,
    },
    Text(String),
    Interpolation(Expr),
    /// Arms in order; `None` is the `@else` arm.
    If(Vec<(Option<Expr>, Vec<Instr>)>),
    For(Box<Repeat>),
}

pub(crate) struct Repeat {
    pub item: Rc<str>,
    pub iterable: Expr,
    pub track: Option<Expr>,
    /// `let i = $index` → (`i`, `$index`)
    pub aliases: Vec<(Rc<str>, Rc<str>)>,
    pub body: Vec<Instr>,
}

pub(crate) enum AttrInstr {
    Static { name: String, value: String },
    Property { name: String, expr: Expr },
    Event { name: String, handler: Rc<Handler> },
    Key(Expr),
    StaticKey(String),
}

pub(crate) struct Handler {
    pub statements: Vec<Expr>,
}

/// A compiled template: maps a scope to a node-tree.
pub struct Template {
    nodes: Vec<Instr>,
    source: String,
}

impl Template {
    pub(crate) fn new(nodes: Vec<Instr>, source: String) -> Self {
        Self { nodes, source }
    }

    /// Build the node-tree for `context`.
    ///
    /// Reference-typed property values are registered in `refs` and replaced
    /// by their generated key. Event bindings become [`Func`]s whose identity
    /// depends only on the handler and the loop locals it captured, so two
    /// renders of unchanged state produce identical handlers.
    pub fn render(
        &self,
        factory: &mut dyn NodeFactory,
        context: &Rc<dyn Scope>,
        refs: &mut RefRegistry,
    ) -> Result<Vec<VNode>, EvalError> {
        let mut pass = Pass {
            factory,
            context,
            refs,
            locals: Vec::new(),
        };
        let mut out = Vec::new();
        pass.nodes(&self.nodes, &mut out)?;
        Ok(out)
    }

    pub fn render_default(
        &self,
        context: &Rc<dyn Scope>,
        refs: &mut RefRegistry,
    ) -> Result<Vec<VNode>, EvalError> {
        self.render(&mut DefaultFactory, context, refs)
    }

    /// Human-readable form of the program.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("roots", &self.nodes.len())
            .field("source", &self.source)
            .finish()
    }
}

struct Pass<'a> {
    factory: &'a mut dyn NodeFactory,
    context: &'a Rc<dyn Scope>,
    refs: &'a mut RefRegistry,
    locals: Vec<(Rc<str>, Value)>,
}

impl Pass<'_> {
    fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        evaluate(expr, &Locals::new(&**self.context, &self.locals))
    }

    fn nodes(&mut self, instrs: &[Instr], out: &mut Vec<VNode>) -> Result<(), EvalError> {
        for instr in instrs {
            self.node(instr, out)?;
        }
        Ok(())
    }

    fn node(&mut self, instr: &Instr, out: &mut Vec<VNode>) -> Result<(), EvalError> {
        match instr {
            Instr::Element {
                tag,
                attrs,
                children,
            } => {
                let mut props = Props::new();
                let mut key: Option<Key> = None;
                for attr in attrs {
                    match attr {
                        AttrInstr::Static { name, value } => props.insert(name.as_str(), value.as_str()),
                        AttrInstr::Property { name, expr } => {
                            let value = self.eval(expr)?;
                            if value.is_reference() {
                                let id = self.refs.register(value);
                                props.insert(name.as_str(), id);
                            } else {
                                props.insert(name.as_str(), value);
                            }
                        }
                        AttrInstr::Event { name, handler } => {
                            props.insert(name.as_str(), self.handler(handler));
                        }
                        AttrInstr::Key(expr) => key = Some(self.eval(expr)?.to_string().into()),
                        AttrInstr::StaticKey(k) => key = Some(k.as_str().into()),
                    }
                }
                let mut kids = Vec::with_capacity(children.len());
                self.nodes(children, &mut kids)?;
                out.push(self.factory.element(tag, props, kids, key));
            }
            Instr::Text(t) => out.push(self.factory.text(t.clone())),
            Instr::Interpolation(expr) => {
                let value = self.eval(expr)?;
                out.push(self.factory.text(value.to_string()));
            }
            Instr::If(arms) => {
                for (condition, body) in arms {
                    let taken = match condition {
                        None => true,
                        Some(c) => self.eval(c)?.is_truthy(),
                    };
                    if taken {
                        return self.nodes(body, out);
                    }
                }
            }
            Instr::For(repeat) => {
                let base = self.locals.len();
                let result = self.repeat(repeat, out);
                self.locals.truncate(base);
                result?;
            }
        }
        Ok(())
    }

    fn repeat(&mut self, r: &Repeat, out: &mut Vec<VNode>) -> Result<(), EvalError> {
        let items: Vec<Value> = match self.eval(&r.iterable)? {
            Value::List(items) => items.to_vec(),
            Value::Object(fields) => fields.values().cloned().collect(),
            Value::Null => return Ok(()),
            other => {
                debug!(kind = other.type_name(), "@for over a non-iterable value renders nothing");
                return Ok(());
            }
        };

        let names = IMPLICIT_LOCALS.map(Rc::<str>::from);
        let count = items.len();
        let base = self.locals.len();
        for (index, item) in items.into_iter().enumerate() {
            self.locals.truncate(base);
            self.locals.push((Rc::clone(&r.item), item));
            let implicit = [
                Value::from(index),
                Value::from(count),
                Value::Bool(index == 0),
                Value::Bool(index + 1 == count),
                Value::Bool(index % 2 == 0),
                Value::Bool(index % 2 == 1),
            ];
            for (name, value) in names.iter().zip(implicit) {
                self.locals.push((Rc::clone(name), value));
            }
            for (alias, source) in &r.aliases {
                let value = self
                    .locals
                    .iter()
                    .rev()
                    .find(|(n, _)| n == source)
                    .map(|(_, v)| v.clone())
                    .unwrap_or_default();
                self.locals.push((Rc::clone(alias), value));
            }

            let start = out.len();
            self.nodes(&r.body, out)?;
            if let Some(track) = &r.track {
                let key = self.eval(track)?.to_string();
                assign_track_keys(&mut out[start..], &key);
            }
        }
        Ok(())
    }

    fn handler(&self, handler: &Rc<Handler>) -> Func {
        let mut hasher = FxHasher::default();
        (Rc::as_ptr(handler) as usize).hash(&mut hasher);
        (Rc::as_ptr(self.context) as *const () as usize).hash(&mut hasher);
        for (name, value) in &self.locals {
            name.hash(&mut hasher);
            value.identity_hash(&mut hasher);
        }

        let handler = Rc::clone(handler);
        let context = Rc::clone(self.context);
        let captured = self.locals.clone();
        Func::with_identity(hasher.finish(), move |args| {
            let mut vars = captured.clone();
            vars.push((Rc::from("$event"), args.first().cloned().unwrap_or_default()));
            execute(&handler.statements, &Locals::new(&*context, &vars)).map_err(CallError::from)
        })
    }
}

/// Key the elements one iteration produced: `key` for a single element,
/// `key:n` when the body yields several. Explicit keys win.
fn assign_track_keys(nodes: &mut [VNode], key: &str) {
    let elements = nodes.iter().filter(|n| !n.is_text()).count();
    let mut n = 0;
    for node in nodes {
        if let VNode::Element { key: slot, .. } = node {
            if slot.is_none() {
                *slot = Some(if elements == 1 {
                    key.into()
                } else {
                    format!("{key}:{n}").into()
                });
            }
            n += 1;
        }
    }
}
