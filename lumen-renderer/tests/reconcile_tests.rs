use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::FutureExt;
use lumen_core::{Func, Value};
use lumen_dom::{Props, VNode, h, text};
use lumen_renderer::{
    AnimationSpec, AnimationTrigger, Animator, BindingHost, Completion, Detached, Directive,
    Finisher, LiveNode, NewTree, PLACEHOLDER_TAG, Phase, reconcile, reconcile_blocking,
};
use lumen_template::RefRegistry;

fn form(handler: &Func, label: &str) -> VNode {
    h(
        "form",
        Props::new().set("class", "login").set("(submit)", handler.clone()),
        vec![
            h(
                "input",
                Props::new().set("name", "user").set("[value]", "ada"),
                vec![],
            ),
            h("button", Props::new(), vec![text(label)]),
        ],
    )
}

#[test]
fn identical_tree_causes_no_mutations() {
    let root = LiveNode::element("main");
    let handler = Func::new(|_| Ok(Value::Null));
    let first = reconcile_blocking(&root, NewTree::Node(form(&handler, "Go")), &Detached, None);
    assert!(first.created > 0);
    assert_eq!(first.listeners_bound, 1);

    let second = reconcile_blocking(&root, NewTree::Node(form(&handler, "Go")), &Detached, None);
    assert!(second.is_empty(), "unexpected mutations: {second:?}");
}

#[test]
fn text_is_overwritten_only_on_change() {
    let root = LiveNode::element("main");
    let handler = Func::new(|_| Ok(Value::Null));
    reconcile_blocking(&root, NewTree::Node(form(&handler, "Go")), &Detached, None);
    let button = root.find_by_tag("button").remove(0);

    let stats = reconcile_blocking(&root, NewTree::Node(form(&handler, "Send")), &Detached, None);
    assert_eq!(stats.text_updates, 1);
    assert_eq!(stats.mutations(), 1);
    assert!(root.find_by_tag("button")[0].ptr_eq(&button));
    assert_eq!(button.text_content(), "Send");
}

#[test]
fn type_change_replaces_node() {
    let root = LiveNode::element("main");
    reconcile_blocking(
        &root,
        NewTree::Fragment(vec![h("div", Props::new(), vec![]), text("tail")]),
        &Detached,
        None,
    );
    let stats = reconcile_blocking(
        &root,
        NewTree::Fragment(vec![h("span", Props::new(), vec![]), text("tail")]),
        &Detached,
        None,
    );
    assert_eq!(stats.replaced, 1);
    assert_eq!(root.to_html(), "<main><span></span>tail</main>");
}

#[test]
fn stale_bindings_are_removed() {
    let root = LiveNode::element("main");
    let handler = Func::new(|_| Ok(Value::Null));
    reconcile_blocking(&root, NewTree::Node(form(&handler, "Go")), &Detached, None);
    let form_node = root.child(0).unwrap();
    let input = root.find_by_tag("input").remove(0);
    assert_eq!(input.property("value"), Some(Value::from("ada")));

    let bare = h(
        "form",
        Props::new(),
        vec![
            h("input", Props::new(), vec![]),
            h("button", Props::new(), vec![text("Go")]),
        ],
    );
    let stats = reconcile_blocking(&root, NewTree::Node(bare), &Detached, None);
    assert_eq!(stats.attribute_writes, 2);
    assert_eq!(stats.property_writes, 1);
    assert_eq!(stats.listeners_removed, 1);
    assert!(form_node.attribute("class").is_none());
    assert!(form_node.listener("submit").is_none());
    assert!(input.property("value").is_none());
}

#[test]
fn listener_rebinds_only_when_identity_changes() {
    let root = LiveNode::element("main");
    let hits = Rc::new(Cell::new(0));
    let counter = |hits: Rc<Cell<i32>>| Func::new(move |_| {
        hits.set(hits.get() + 1);
        Ok(Value::Null)
    });
    let a = counter(hits.clone());
    reconcile_blocking(&root, NewTree::Node(form(&a, "Go")), &Detached, None);
    let same = Func::with_identity(a.identity(), |_| Ok(Value::Null));
    let stats = reconcile_blocking(&root, NewTree::Node(form(&same, "Go")), &Detached, None);
    assert_eq!(stats.listeners_bound, 0);

    let b = counter(hits.clone());
    let stats = reconcile_blocking(&root, NewTree::Node(form(&b, "Go")), &Detached, None);
    assert_eq!(stats.listeners_bound, 1);
    assert!(root.child(0).unwrap().dispatch("submit", Value::Null));
    assert_eq!(hits.get(), 1);
}

#[test]
fn unkeyed_children_append_and_trim() {
    let list = LiveNode::element("ol");
    let items = |n: usize| -> Vec<VNode> {
        (0..n).map(|i| h("li", Props::new(), vec![text(i.to_string())])).collect()
    };
    reconcile_blocking(&list, NewTree::Fragment(items(2)), &Detached, None);
    let stats = reconcile_blocking(&list, NewTree::Fragment(items(4)), &Detached, None);
    assert_eq!(stats.created, 4);
    assert_eq!(list.text_content(), "0123");

    let stats = reconcile_blocking(&list, NewTree::Fragment(items(1)), &Detached, None);
    assert_eq!(stats.removed, 3);
    assert_eq!(list.to_html(), "<ol><li>0</li></ol>");
}

#[test]
fn checked_attribute_mirrors_into_property() {
    let root = LiveNode::element("main");
    let checkbox = |checked: Option<&str>| {
        let mut props = Props::new().set("type", "checkbox");
        if let Some(value) = checked {
            props.insert("checked", value);
        }
        h("input", props, vec![])
    };

    reconcile_blocking(&root, NewTree::Node(checkbox(Some(""))), &Detached, None);
    let input = root.child(0).unwrap();
    assert_eq!(input.property("checked"), Some(Value::Bool(true)));

    reconcile_blocking(&root, NewTree::Node(checkbox(None)), &Detached, None);
    assert_eq!(input.property("checked"), Some(Value::Bool(false)));
    assert!(!input.has_attribute("checked"));

    reconcile_blocking(&root, NewTree::Node(checkbox(Some("false"))), &Detached, None);
    assert_eq!(input.property("checked"), Some(Value::Bool(false)));

    let stats = reconcile_blocking(&root, NewTree::Node(checkbox(Some("false"))), &Detached, None);
    assert!(stats.is_empty());
}

#[test]
fn checked_on_other_elements_stays_an_attribute() {
    let root = LiveNode::element("main");
    let node = h("input", Props::new().set("type", "text").set("checked", ""), vec![]);
    reconcile_blocking(&root, NewTree::Node(node), &Detached, None);
    assert!(root.child(0).unwrap().property("checked").is_none());
}

#[test]
fn tagless_node_becomes_placeholder() {
    let root = LiveNode::element("main");
    let tagless = h("", Props::new(), vec![text("lost")]);
    reconcile_blocking(&root, NewTree::Fragment(vec![tagless.clone(), text("after")]), &Detached, None);
    let placeholder = root.child(0).unwrap();
    assert!(placeholder.has_tag(PLACEHOLDER_TAG));
    assert!(!placeholder.text_content().is_empty());
    assert_eq!(root.child(1).unwrap().text_data().as_deref(), Some("after"));

    let stats = reconcile_blocking(&root, NewTree::Fragment(vec![tagless, text("after")]), &Detached, None);
    assert!(stats.is_empty());
}

#[test]
fn reference_keys_resolve_to_values() {
    let root = LiveNode::element("main");
    let items = Value::list([1, 2, 3]);
    let mut refs = RefRegistry::new();
    let key = refs.register(items.clone());
    let node = h("list-view", Props::new().set("[items]", key.as_str()), vec![]);

    reconcile_blocking(&root, NewTree::Node(node), &Detached, Some(&refs.snapshot()));
    let bound = root.child(0).unwrap().property("items").unwrap();
    assert!(bound.same(&items));
}

#[test]
fn detached_subtree_is_copied_in() {
    let source = LiveNode::element("p");
    source.set_attribute("id", "greeting");
    source.set_property("lang", Value::from("en"));
    let handler = Func::new(|_| Ok(Value::Null));
    source.add_listener("click", handler.clone());
    source.append_child(&LiveNode::text("hi"));

    let root = LiveNode::element("main");
    reconcile_blocking(&root, NewTree::Detached(source.clone()), &Detached, None);
    let copy = root.child(0).unwrap();
    assert!(!copy.ptr_eq(&source));
    assert_eq!(root.to_html(), r#"<main><p id="greeting">hi</p></main>"#);
    assert_eq!(copy.property("lang"), Some(Value::from("en")));
    assert_eq!(copy.listener("click").map(|f| f.identity()), Some(handler.identity()));
}

type Log = Rc<RefCell<Vec<String>>>;

struct Probe {
    log: Log,
}

impl Directive for Probe {
    fn on_init(&mut self, value: &Value) {
        self.log.borrow_mut().push(format!("init {value}"));
    }

    fn on_update(&mut self, value: &Value) {
        self.log.borrow_mut().push(format!("update {value}"));
    }

    fn on_destroy(&mut self) {
        self.log.borrow_mut().push("destroy".to_string());
    }
}

#[derive(Default)]
struct ManualAnimator {
    played: RefCell<Vec<Phase>>,
    finishers: RefCell<Vec<Finisher>>,
}

impl ManualAnimator {
    fn finish_all(&self) {
        for finisher in self.finishers.borrow_mut().drain(..) {
            finisher.finish();
        }
    }
}

impl Animator for ManualAnimator {
    fn play(&self, _node: &LiveNode, phase: Phase, _spec: &AnimationSpec) -> Completion {
        self.played.borrow_mut().push(phase);
        let (completion, finisher) = Completion::pending();
        self.finishers.borrow_mut().push(finisher);
        completion
    }
}

#[derive(Default)]
struct TestHost {
    log: Log,
    animator: Rc<ManualAnimator>,
}

impl BindingHost for TestHost {
    fn create_directive(&self, name: &str, _element: &LiveNode) -> Option<Box<dyn Directive>> {
        name.eq_ignore_ascii_case("tooltip").then(|| {
            Box::new(Probe {
                log: self.log.clone(),
            }) as Box<dyn Directive>
        })
    }

    fn animation(&self, trigger: &str) -> Option<Rc<AnimationTrigger>> {
        (trigger == "fade").then(|| {
            Rc::new(
                AnimationTrigger::new()
                    .enter(AnimationSpec::new(vec![vec![("opacity".into(), "0".into())]]))
                    .leave(AnimationSpec::new(vec![vec![("opacity".into(), "1".into())]])),
            )
        })
    }

    fn animator(&self) -> Option<Rc<dyn Animator>> {
        Some(self.animator.clone())
    }
}

#[test]
fn directive_lifecycle_follows_bindings() {
    let host = TestHost::default();
    let root = LiveNode::element("main");
    let tip = |value: Option<&str>| {
        let props = match value {
            Some(v) => Props::new().set("[toolTip]", v),
            None => Props::new(),
        };
        h("span", props, vec![])
    };

    reconcile_blocking(&root, NewTree::Node(tip(Some("one"))), &host, None);
    let span = root.child(0).unwrap();
    assert_eq!(span.directive_names(), vec!["tooltip".to_string()]);
    assert!(span.property("toolTip").is_none());

    let stats = reconcile_blocking(&root, NewTree::Node(tip(Some("one"))), &host, None);
    assert!(stats.is_empty());
    reconcile_blocking(&root, NewTree::Node(tip(Some("two"))), &host, None);
    reconcile_blocking(&root, NewTree::Node(tip(None)), &host, None);
    assert!(span.directive_names().is_empty());

    reconcile_blocking(&root, NewTree::Node(tip(Some("three"))), &host, None);
    reconcile_blocking(&root, NewTree::Fragment(vec![]), &host, None);
    assert_eq!(
        *host.log.borrow(),
        vec!["init one", "update two", "destroy", "init three", "destroy"]
    );
}

#[test]
fn leave_animation_defers_removal() {
    let host = TestHost::default();
    let root = LiveNode::element("main");
    let toast = h("div", Props::new().set("animate", "fade"), vec![text("saved")]).with_key("toast");

    reconcile_blocking(&root, NewTree::Node(toast), &host, None);
    assert_eq!(*host.animator.played.borrow(), vec![Phase::Enter]);
    host.animator.finish_all();
    let node = root.child(0).unwrap();

    let mut pass = Box::pin(reconcile(&root, NewTree::Fragment(vec![]), &host, None));
    let waker = futures::task::noop_waker();
    let mut cx = Context::from_waker(&waker);
    assert!(pass.poll_unpin(&mut cx).is_pending());
    assert!(node.is_leaving());
    assert!(node.parent().is_some());

    host.animator.finish_all();
    match pass.poll_unpin(&mut cx) {
        Poll::Ready(stats) => assert_eq!(stats.removed, 1),
        Poll::Pending => panic!("pass should finish once the animation completes"),
    }
    assert!(node.parent().is_none());
    assert_eq!(root.child_count(), 0);
}
