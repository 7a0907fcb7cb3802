//! Brings a live subtree in line with a freshly rendered node-tree.
//!
//! Children are matched by key when either side carries keys, positionally
//! otherwise. Matched nodes are patched in place; their attributes,
//! properties, listeners and directives are diffed against the new bindings.
//! The only suspension point is a leave animation: a node whose `animate`
//! trigger declares one stays attached, flagged as leaving, until its
//! [`Completion`] resolves.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, join_all};
use lumen_core::{Func, Value};
use lumen_dom::{Binding, Key, Props, VNode};
use lumen_template::RefSnapshot;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::animation::{AnimationTrigger, Animator, Completion, Phase};
use crate::directive::Directive;
use crate::dom::{LiveNode, PLACEHOLDER_TAG};

const PLACEHOLDER_TEXT: &str = "node could not be rendered";

/// What the reconciler needs from whoever owns the tree.
pub trait BindingHost {
    /// Instantiate the directive registered as `name`, if any.
    fn create_directive(&self, name: &str, element: &LiveNode) -> Option<Box<dyn Directive>>;
    fn animation(&self, trigger: &str) -> Option<Rc<AnimationTrigger>>;
    fn animator(&self) -> Option<Rc<dyn Animator>>;
}

/// A host with no directives and no animations.
#[derive(Debug, Default, Clone, Copy)]
pub struct Detached;

impl BindingHost for Detached {
    fn create_directive(&self, _name: &str, _element: &LiveNode) -> Option<Box<dyn Directive>> {
        None
    }

    fn animation(&self, _trigger: &str) -> Option<Rc<AnimationTrigger>> {
        None
    }

    fn animator(&self) -> Option<Rc<dyn Animator>> {
        None
    }
}

/// Desired content of a container.
#[derive(Debug, Clone)]
pub enum NewTree {
    Node(VNode),
    Fragment(Vec<VNode>),
    /// An already built subtree, reconciled from its description.
    Detached(LiveNode),
}

/// Mutations performed by one reconciliation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub created: usize,
    pub removed: usize,
    /// Positional matches whose node type changed.
    pub replaced: usize,
    pub moved: usize,
    pub text_updates: usize,
    pub attribute_writes: usize,
    pub property_writes: usize,
    pub listeners_bound: usize,
    pub listeners_removed: usize,
    pub directive_inits: usize,
    pub directive_updates: usize,
    pub directive_destroys: usize,
}

impl Stats {
    pub fn mutations(&self) -> usize {
        self.created
            + self.removed
            + self.replaced
            + self.moved
            + self.text_updates
            + self.attribute_writes
            + self.property_writes
            + self.listeners_bound
            + self.listeners_removed
            + self.directive_inits
            + self.directive_updates
            + self.directive_destroys
    }

    pub fn is_empty(&self) -> bool {
        self.mutations() == 0
    }
}

/// Reconcile the children of `container` against `tree`.
///
/// `refs` resolves reference keys produced by the render pass back into
/// the values they stand for before they are assigned as properties.
pub async fn reconcile(
    container: &LiveNode,
    tree: NewTree,
    host: &dyn BindingHost,
    refs: Option<&RefSnapshot>,
) -> Stats {
    let nodes = match tree {
        NewTree::Node(node) => vec![node],
        NewTree::Fragment(nodes) => nodes,
        NewTree::Detached(live) => vec![live.to_vnode()],
    };
    let mut pass = Pass {
        host,
        refs,
        stats: Stats::default(),
    };
    pass.children(container, &nodes).await;
    tracing::trace!(stats = ?pass.stats, "reconciled");
    pass.stats
}

/// [`reconcile`] on the current thread. Leave animations must be able to
/// finish without the caller's scheduler running.
pub fn reconcile_blocking(
    container: &LiveNode,
    tree: NewTree,
    host: &dyn BindingHost,
    refs: Option<&RefSnapshot>,
) -> Stats {
    futures::executor::block_on(reconcile(container, tree, host, refs))
}

/// Run `on_destroy` for every directive in the subtree. Returns how many ran.
pub fn teardown(node: &LiveNode) -> usize {
    let mut destroyed = 0;
    node.walk(&mut |n| {
        for directive in n.take_directives() {
            directive.borrow_mut().on_destroy();
            destroyed += 1;
        }
    });
    destroyed
}

struct Pass<'a> {
    host: &'a dyn BindingHost,
    refs: Option<&'a RefSnapshot>,
    stats: Stats,
}

impl<'a> Pass<'a> {
    fn children<'s>(&'s mut self, parent: &'s LiveNode, new: &'s [VNode]) -> LocalBoxFuture<'s, ()> {
        async move {
            let live = active_children(parent);
            let keyed = live.iter().any(|c| c.key().is_some()) || new.iter().any(|n| n.key().is_some());
            if keyed {
                self.keyed(parent, live, new).await;
            } else {
                self.unkeyed(parent, live, new).await;
            }
        }
        .boxed_local()
    }

    async fn unkeyed(&mut self, parent: &LiveNode, live: Vec<LiveNode>, new: &[VNode]) {
        for (i, vnode) in new.iter().enumerate() {
            match live.get(i) {
                Some(node) => self.patch(parent, node, vnode).await,
                None => {
                    let node = self.create(vnode);
                    parent.append_child(&node);
                }
            }
        }
        if live.len() > new.len() {
            self.remove(&live[new.len()..]).await;
        }
    }

    async fn keyed(&mut self, parent: &LiveNode, live: Vec<LiveNode>, new: &[VNode]) {
        let mut by_key: FxHashMap<Key, LiveNode> = FxHashMap::default();
        // unkeyed live nodes are claimed in order by unkeyed new nodes
        let mut unkeyed: VecDeque<LiveNode> = VecDeque::new();
        let mut stale = Vec::new();
        for node in &live {
            match node.key() {
                Some(key) => {
                    if by_key.contains_key(&key) {
                        stale.push(node.clone());
                    } else {
                        by_key.insert(key, node.clone());
                    }
                }
                None => unkeyed.push_back(node.clone()),
            }
        }

        let mut placed = Vec::with_capacity(new.len());
        for vnode in new {
            let candidate = match vnode.key() {
                Some(key) => by_key.remove(key),
                None => unkeyed.pop_front(),
            };
            let node = match candidate {
                Some(node) if same_kind(&node, vnode) => {
                    self.patch(parent, &node, vnode).await;
                    node
                }
                Some(node) => {
                    stale.push(node);
                    self.create(vnode)
                }
                None => self.create(vnode),
            };
            placed.push(node);
        }
        stale.extend(by_key.into_values());
        stale.extend(unkeyed);

        let mut current = active_children(parent);
        for (i, node) in placed.iter().enumerate() {
            if current.get(i).is_some_and(|c| c.ptr_eq(node)) {
                continue;
            }
            let attached = match current.iter().position(|c| c.ptr_eq(node)) {
                Some(at) => {
                    current.remove(at);
                    true
                }
                None => false,
            };
            parent.insert_before(node, current.get(i));
            current.insert(i, node.clone());
            if attached {
                self.stats.moved += 1;
            }
        }

        self.remove(&stale).await;
    }

    fn patch<'s>(
        &'s mut self,
        parent: &'s LiveNode,
        node: &'s LiveNode,
        vnode: &'s VNode,
    ) -> LocalBoxFuture<'s, ()> {
        async move {
            if !same_kind(node, vnode) {
                self.replace(parent, node, vnode).await;
                return;
            }
            let vnode = resolve_placeholder(vnode);
            match &*vnode {
                VNode::Text(t) => {
                    if node.text_data().as_deref() != Some(t.as_str()) {
                        node.set_text(t);
                        self.stats.text_updates += 1;
                    }
                }
                VNode::Element {
                    props,
                    children,
                    key,
                    ..
                } => {
                    if node.key() != *key {
                        node.set_key(key.clone());
                    }
                    self.bind(node, props);
                    self.children(node, children).await;
                }
            }
        }
        .boxed_local()
    }

    async fn replace(&mut self, parent: &LiveNode, old: &LiveNode, vnode: &VNode) {
        let node = self.create(vnode);
        self.leave(std::slice::from_ref(old)).await;
        self.stats.directive_destroys += teardown(old);
        if !parent.replace_child(&node, old) {
            parent.append_child(&node);
        }
        self.stats.replaced += 1;
    }

    async fn remove(&mut self, nodes: &[LiveNode]) {
        if nodes.is_empty() {
            return;
        }
        self.leave(nodes).await;
        for node in nodes {
            self.stats.directive_destroys += teardown(node);
            node.detach();
            self.stats.removed += 1;
        }
    }

    /// Start leave animations and wait for all of them.
    async fn leave(&self, nodes: &[LiveNode]) {
        let pending: Vec<Completion> = nodes
            .iter()
            .filter_map(|node| self.play(node, Phase::Leave))
            .collect();
        if pending.is_empty() {
            return;
        }
        tracing::debug!(count = pending.len(), "waiting for leave animations");
        join_all(pending).await;
    }

    fn play(&self, node: &LiveNode, phase: Phase) -> Option<Completion> {
        let name = node.attribute("animate")?;
        let trigger = self.host.animation(&name)?;
        let spec = match phase {
            Phase::Enter => trigger.enter.as_ref(),
            Phase::Leave => trigger.leave.as_ref(),
        }?;
        let animator = self.host.animator()?;
        if phase == Phase::Leave {
            node.set_leaving(true);
        }
        Some(animator.play(node, phase, spec))
    }

    fn create(&mut self, vnode: &VNode) -> LiveNode {
        let vnode = resolve_placeholder(vnode);
        self.stats.created += 1;
        match &*vnode {
            VNode::Text(t) => LiveNode::text(t.as_str()),
            VNode::Element {
                tag,
                props,
                children,
                key,
            } => {
                let node = LiveNode::element(tag.as_str());
                node.set_key(key.clone());
                self.bind(&node, props);
                for child in children {
                    let child = self.create(child);
                    node.append_child(&child);
                }
                // enter animations are not awaited
                let _ = self.play(&node, Phase::Enter);
                node
            }
        }
    }

    fn bind(&mut self, node: &LiveNode, props: &Props) {
        let mut attributes: FxHashSet<&str> = FxHashSet::default();
        let mut properties: FxHashSet<&str> = FxHashSet::default();
        let mut events: FxHashSet<&str> = FxHashSet::default();
        let mut directives: FxHashSet<String> = FxHashSet::default();
        let mut checked = None;

        for (name, value) in props.iter() {
            match Binding::classify(name) {
                Binding::Attribute(attr) => {
                    attributes.insert(attr);
                    let text = value.to_string();
                    if node.attribute(attr).as_deref() != Some(text.as_str()) {
                        node.set_attribute(attr, &text);
                        self.stats.attribute_writes += 1;
                        if attr == "checked" {
                            checked = Some(text != "false");
                        }
                    }
                }
                Binding::Property(prop) => {
                    let value = match self.refs {
                        Some(refs) => refs.resolve(value),
                        None => value.clone(),
                    };
                    if self.bind_property(node, prop, value) {
                        directives.insert(prop.to_ascii_lowercase());
                    } else {
                        properties.insert(prop);
                    }
                }
                Binding::Event(event) => {
                    events.insert(event);
                    match value.as_func() {
                        Some(handler) => self.bind_listener(node, event, handler),
                        None => tracing::warn!(event, value = value.type_name(), "event binding is not a function"),
                    }
                }
            }
        }

        for attr in node.attribute_names() {
            if !attributes.contains(attr.as_str()) {
                node.remove_attribute(&attr);
                self.stats.attribute_writes += 1;
                if attr == "checked" {
                    checked = Some(false);
                }
            }
        }

        let toggle = is_toggle(node);
        for prop in node.property_names() {
            // a toggle's `checked` mirrors its attribute
            if properties.contains(prop.as_str()) || (toggle && prop == "checked") {
                continue;
            }
            node.remove_property(&prop);
            self.stats.property_writes += 1;
        }

        for event in node.listener_names() {
            if !events.contains(event.as_str()) {
                node.remove_listener(&event);
                self.stats.listeners_removed += 1;
            }
        }

        for name in node.directive_names() {
            if directives.contains(&name) {
                continue;
            }
            if let Some(directive) = node.take_directive(&name) {
                directive.borrow_mut().on_destroy();
                self.stats.directive_destroys += 1;
            }
        }

        if let Some(on) = checked.filter(|_| toggle) {
            if node.property("checked").and_then(|v| v.as_bool()) != Some(on) {
                node.set_property("checked", Value::Bool(on));
                self.stats.property_writes += 1;
            }
        }
    }

    /// Returns `true` when `name` is handled by a directive.
    fn bind_property(&mut self, node: &LiveNode, name: &str, value: Value) -> bool {
        let slot = name.to_ascii_lowercase();
        if let Some((directive, last)) = node.directive(&slot) {
            if !last.same(&value) {
                directive.borrow_mut().on_update(&value);
                node.set_directive_value(&slot, value);
                self.stats.directive_updates += 1;
            }
            return true;
        }
        if let Some(mut directive) = self.host.create_directive(name, node) {
            directive.on_init(&value);
            node.set_directive(&slot, Rc::new(RefCell::new(directive)), value);
            self.stats.directive_inits += 1;
            return true;
        }
        if !node.property(name).is_some_and(|current| current.same(&value)) {
            node.set_property(name, value);
            self.stats.property_writes += 1;
        }
        false
    }

    fn bind_listener(&mut self, node: &LiveNode, event: &str, handler: &Func) {
        if node
            .listener(event)
            .is_some_and(|current| current.identity() == handler.identity())
        {
            return;
        }
        node.add_listener(event, handler.clone());
        self.stats.listeners_bound += 1;
    }
}

fn active_children(parent: &LiveNode) -> Vec<LiveNode> {
    parent
        .children()
        .into_iter()
        .filter(|c| !c.is_leaving())
        .collect()
}

fn effective_tag(tag: &str) -> &str {
    if tag.trim().is_empty() {
        PLACEHOLDER_TAG
    } else {
        tag
    }
}

fn same_kind(node: &LiveNode, vnode: &VNode) -> bool {
    match vnode {
        VNode::Text(_) => node.is_text(),
        VNode::Element { tag, .. } => node.has_tag(effective_tag(tag)),
    }
}

fn resolve_placeholder(vnode: &VNode) -> Cow<'_, VNode> {
    match vnode {
        VNode::Element { tag, key, .. } if tag.trim().is_empty() => {
            tracing::warn!("element without a tag rendered as a placeholder");
            Cow::Owned(VNode::Element {
                tag: PLACEHOLDER_TAG.to_string(),
                props: Props::new(),
                children: vec![VNode::Text(PLACEHOLDER_TEXT.to_string())],
                key: key.clone(),
            })
        }
        other => Cow::Borrowed(other),
    }
}

/// Checkbox or radio input.
fn is_toggle(node: &LiveNode) -> bool {
    node.has_tag("input")
        && node
            .attribute("type")
            .is_some_and(|t| t.eq_ignore_ascii_case("checkbox") || t.eq_ignore_ascii_case("radio"))
}
