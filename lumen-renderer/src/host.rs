//! Component host: owns a component's state, compiles its template once,
//! and schedules render passes against a private output root.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use lumen_core::{
    CallError, FrameId, Func, Lifecycle, RuntimeConfig, Scheduler, Store, Subscription, Value,
};
use lumen_dom::VNode;
use lumen_style::{GlobalStyles, StyleOrigin, Stylesheet, style_node};
use lumen_template::{
    CompileError, CompileOptions, EvalError, Pipe, PipeRegistry, RefRegistry, Scope, Template,
    compile_with,
};
use once_cell::unsync::OnceCell;
use rustc_hash::FxHashMap;

use crate::animation::{AnimationTrigger, Animator, ImmediateAnimator};
use crate::directive::{Directive, DirectiveRegistry};
use crate::dom::LiveNode;
use crate::reconcile::{BindingHost, NewTree, Stats, reconcile, teardown};

/// Tag of the element a host renders into.
pub const ROOT_TAG: &str = "lumen-root";

pub type Method = Rc<dyn Fn(&Store, &[Value]) -> Result<Value, CallError>>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Render(#[from] EvalError),
}

/// Everything a host needs to know about one kind of component.
pub struct Component {
    template: String,
    styles: Option<Stylesheet>,
    state: Vec<(String, Value)>,
    methods: Vec<(String, Method)>,
    pipes: PipeRegistry,
    directives: DirectiveRegistry,
    animations: FxHashMap<String, Rc<AnimationTrigger>>,
    hooks: Lifecycle<Host>,
}

impl Component {
    /// A component rendering `template`, with the built-in pipes.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            styles: None,
            state: Vec::new(),
            methods: Vec::new(),
            pipes: PipeRegistry::with_builtins(),
            directives: DirectiveRegistry::new(),
            animations: FxHashMap::default(),
            hooks: Lifecycle::new(),
        }
    }

    pub fn styles(mut self, css: &str) -> Self {
        let sheet = Stylesheet::parse(css);
        self.styles = (!sheet.is_empty()).then_some(sheet);
        self
    }

    pub fn state(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.state.push((key.into(), value.into()));
        self
    }

    pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&Store, &[Value]) -> Result<Value, CallError> + 'static,
    {
        self.methods.push((name.into(), Rc::new(method)));
        self
    }

    pub fn pipe(mut self, name: impl Into<String>, pipe: impl Pipe + 'static) -> Self {
        self.pipes.register(name, pipe);
        self
    }

    pub fn directive<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&LiveNode, &HostHandle) -> Box<dyn Directive> + 'static,
    {
        self.directives.register(name, factory);
        self
    }

    pub fn animation(mut self, name: impl Into<String>, trigger: AnimationTrigger) -> Self {
        self.animations.insert(name.into(), Rc::new(trigger));
        self
    }

    pub fn on_init(mut self, hook: impl Fn(&Host) + 'static) -> Self {
        self.hooks.on_init(hook);
        self
    }

    pub fn on_update(mut self, hook: impl Fn(&Host) + 'static) -> Self {
        self.hooks.on_update(hook);
        self
    }

    pub fn on_destroy(mut self, hook: impl Fn(&Host) + 'static) -> Self {
        self.hooks.on_destroy(hook);
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods: Vec<&str> = self.methods.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("Component")
            .field("template", &self.template)
            .field("styles", &self.styles)
            .field("methods", &methods)
            .field("pipes", &self.pipes)
            .field("directives", &self.directives)
            .finish_non_exhaustive()
    }
}

/// Services shared by the hosts of one application.
#[derive(Clone)]
pub struct Environment {
    pub scheduler: Scheduler,
    pub animator: Rc<dyn Animator>,
    pub global_styles: GlobalStyles,
    pub config: RuntimeConfig,
    pub compile: CompileOptions,
}

impl Environment {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            scheduler: Scheduler::with_config(config.clone()),
            animator: Rc::new(ImmediateAnimator),
            global_styles: GlobalStyles::new(),
            config,
            compile: CompileOptions::default(),
        }
    }

    pub fn with_animator(mut self, animator: impl Animator + 'static) -> Self {
        self.animator = Rc::new(animator);
        self
    }

    pub fn with_global_styles(mut self, styles: GlobalStyles) -> Self {
        self.global_styles = styles;
        self
    }

    pub fn with_compile_options(mut self, options: CompileOptions) -> Self {
        self.compile = options;
        self
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new(RuntimeConfig::default())
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("scheduler", &self.scheduler)
            .field("global_styles", &self.global_styles.len())
            .field("config", &self.config)
            .field("compile", &self.compile)
            .finish_non_exhaustive()
    }
}

struct HostInner {
    component: Component,
    env: Environment,
    state: Store,
    scope: Rc<dyn Scope>,
    methods: FxHashMap<String, Func>,
    program: OnceCell<Template>,
    refs: RefCell<RefRegistry>,
    root: RefCell<Option<LiveNode>>,
    attached: Cell<bool>,
    pending: Cell<Option<FrameId>>,
    in_flight: Cell<bool>,
    render_count: Cell<usize>,
    last_stats: Cell<Stats>,
    tracked: RefCell<Vec<Subscription>>,
}

/// A mounted (or mountable) component instance. Clones share the instance.
#[derive(Clone)]
pub struct Host(Rc<HostInner>);

impl Host {
    pub fn new(component: Component, env: Environment) -> Host {
        let state = Store::from_values(component.state.iter().cloned());
        let inner = Rc::new_cyclic(|weak: &Weak<HostInner>| {
            let methods = component
                .methods
                .iter()
                .map(|(name, method)| (name.clone(), method_func(weak.clone(), method.clone())))
                .collect();
            HostInner {
                component,
                env,
                state,
                scope: Rc::new(HostScope { host: weak.clone() }),
                methods,
                program: OnceCell::new(),
                refs: RefCell::new(RefRegistry::new()),
                root: RefCell::new(None),
                attached: Cell::new(false),
                pending: Cell::new(None),
                in_flight: Cell::new(false),
                render_count: Cell::new(0),
                last_stats: Cell::new(Stats::default()),
                tracked: RefCell::new(Vec::new()),
            }
        });

        // the link lives as long as the store, which only the host owns
        let weak = Rc::downgrade(&inner);
        let _ = inner.state.subscribe(move |_, _| {
            if let Some(inner) = weak.upgrade() {
                Host(inner).update();
            }
        });
        Host(inner)
    }

    pub fn state(&self) -> &Store {
        &self.0.state
    }

    pub fn environment(&self) -> &Environment {
        &self.0.env
    }

    pub fn handle(&self) -> HostHandle {
        HostHandle(Rc::downgrade(&self.0))
    }

    /// The private output root, while mounted.
    pub fn root(&self) -> Option<LiveNode> {
        self.0.root.borrow().clone()
    }

    pub fn is_attached(&self) -> bool {
        self.0.attached.get()
    }

    /// Number of times the render program has run.
    pub fn render_count(&self) -> usize {
        self.0.render_count.get()
    }

    /// Mutations of the most recently finished pass.
    pub fn last_stats(&self) -> Stats {
        self.0.last_stats.get()
    }

    pub fn is_pass_pending(&self) -> bool {
        self.0.pending.get().is_some()
    }

    pub fn is_pass_in_flight(&self) -> bool {
        self.0.in_flight.get()
    }

    /// Keep `subscription` alive until unmount.
    pub fn track(&self, subscription: Subscription) {
        self.0.tracked.borrow_mut().push(subscription);
    }

    pub fn mount(&self, container: &LiveNode) -> Result<(), HostError> {
        let inner = &self.0;
        if inner.attached.get() {
            tracing::warn!("host is already mounted");
            return Ok(());
        }
        let root = LiveNode::element(ROOT_TAG);
        container.append_child(&root);
        *inner.root.borrow_mut() = Some(root);
        inner.attached.set(true);
        inner.component.hooks.run_init(self);
        self.detect_changes()
    }

    /// Schedule a pass on the next frame. Any number of calls before that
    /// frame collapse into one pass.
    pub fn update(&self) {
        let inner = &self.0;
        if !inner.attached.get() {
            tracing::trace!("update ignored, host is not mounted");
            return;
        }
        if inner.pending.get().is_some() {
            return;
        }
        let weak = Rc::downgrade(inner);
        let id = inner.env.scheduler.request_frame(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.pending.set(None);
            // failures are logged by the pass
            let _ = Host(inner).run_pass();
        });
        inner.pending.set(Some(id));
    }

    /// Run a pass now, replacing any pending one. Defers to the next frame
    /// while another pass is in flight.
    pub fn detect_changes(&self) -> Result<(), HostError> {
        let inner = &self.0;
        if let Some(id) = inner.pending.take() {
            inner.env.scheduler.cancel(id);
        }
        if !inner.attached.get() {
            tracing::trace!("detect_changes ignored, host is not mounted");
            return Ok(());
        }
        self.run_pass()
    }

    /// Node-tree for the current state: global styles, then the component
    /// stylesheet, then the template output.
    pub fn render(&self) -> Result<Vec<VNode>, HostError> {
        let inner = &self.0;
        inner.refs.borrow_mut().clear();
        let program = inner
            .program
            .get_or_try_init(|| compile_with(&inner.component.template, &inner.env.compile))?;
        inner.render_count.set(inner.render_count.get() + 1);
        let content = program.render_default(&inner.scope, &mut inner.refs.borrow_mut())?;

        let mut nodes = inner.env.global_styles.nodes();
        if let Some(sheet) = &inner.component.styles {
            nodes.push(style_node(sheet, StyleOrigin::Component));
        }
        nodes.extend(content);
        Ok(nodes)
    }

    fn run_pass(&self) -> Result<(), HostError> {
        let inner = &self.0;
        if inner.in_flight.get() {
            tracing::debug!("render pass in flight, deferring");
            self.update();
            return Ok(());
        }
        let Some(root) = self.root() else {
            return Ok(());
        };
        let nodes = self
            .render()
            .inspect_err(|err| tracing::error!(%err, "render pass aborted"))?;
        let refs = inner.refs.borrow().snapshot();

        inner.in_flight.set(true);
        let host = self.clone();
        inner.env.scheduler.spawn(async move {
            let stats = reconcile(&root, NewTree::Fragment(nodes), &host, Some(&refs)).await;
            host.finish_pass(stats);
        });
        inner.env.scheduler.drive();
        Ok(())
    }

    fn finish_pass(&self, stats: Stats) {
        let inner = &self.0;
        inner.in_flight.set(false);
        inner.last_stats.set(stats);
        tracing::trace!(?stats, renders = inner.render_count.get(), "render pass complete");
        if inner.attached.get() {
            inner.component.hooks.run_update(self);
        }
    }

    pub fn unmount(&self) {
        let inner = &self.0;
        if !inner.attached.get() {
            return;
        }
        inner.attached.set(false);
        if let Some(id) = inner.pending.take() {
            inner.env.scheduler.cancel(id);
        }
        let tracked = std::mem::take(&mut *inner.tracked.borrow_mut());
        for subscription in tracked {
            subscription.unsubscribe();
        }
        inner.component.pipes.destroy_all();
        inner.component.hooks.run_destroy(self);

        let root = inner.root.borrow_mut().take();
        if let Some(root) = root {
            let destroyed = teardown(&root);
            root.detach();
            tracing::debug!(destroyed, "host unmounted");
        }
    }
}

impl BindingHost for Host {
    fn create_directive(&self, name: &str, element: &LiveNode) -> Option<Box<dyn Directive>> {
        let factory = self.0.component.directives.get(name)?;
        Some(factory(element, &self.handle()))
    }

    fn animation(&self, trigger: &str) -> Option<Rc<AnimationTrigger>> {
        self.0.component.animations.get(trigger).cloned()
    }

    fn animator(&self) -> Option<Rc<dyn Animator>> {
        Some(self.0.env.animator.clone())
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("attached", &self.0.attached.get())
            .field("renders", &self.0.render_count.get())
            .field("pending", &self.0.pending.get().is_some())
            .field("in_flight", &self.0.in_flight.get())
            .finish()
    }
}

/// Non-owning reference to a host, handed to directives.
#[derive(Clone)]
pub struct HostHandle(Weak<HostInner>);

impl HostHandle {
    pub fn upgrade(&self) -> Option<Host> {
        self.0.upgrade().map(Host)
    }

    pub fn update(&self) {
        if let Some(host) = self.upgrade() {
            host.update();
        }
    }

    pub fn state(&self) -> Option<Store> {
        self.0.upgrade().map(|inner| inner.state.clone())
    }
}

impl fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HostHandle")
            .field(&(self.0.strong_count() > 0))
            .finish()
    }
}

/// Loop locals are layered on top by the render program; this resolves
/// state keys, then methods.
struct HostScope {
    host: Weak<HostInner>,
}

impl Scope for HostScope {
    fn lookup(&self, name: &str) -> Option<Value> {
        let inner = self.host.upgrade()?;
        inner
            .state
            .try_get(name)
            .or_else(|| inner.methods.get(name).cloned().map(Value::Func))
    }

    fn assign(&self, name: &str, value: Value) -> Result<(), EvalError> {
        match self.host.upgrade() {
            Some(inner) => {
                inner.state.set(name, value);
                Ok(())
            }
            None => Err(EvalError::InvalidAssignment(name.to_string())),
        }
    }

    fn pipe(&self, name: &str) -> Option<Rc<dyn Pipe>> {
        self.host.upgrade()?.component.pipes.get(name)
    }
}

fn method_func(host: Weak<HostInner>, method: Method) -> Func {
    Func::new(move |args| {
        let inner = host
            .upgrade()
            .ok_or_else(|| CallError::msg("component host was dropped"))?;
        method(&inner.state, args)
    })
}
