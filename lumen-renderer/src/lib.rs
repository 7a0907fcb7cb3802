//! Live document, reconciler and component host.
//!
//! A [`Host`] renders its component's template into a [`VNode`] tree and
//! [`reconcile`]s it against a private root in a [`LiveNode`] document.

pub mod animation;
pub mod directive;
pub mod dom;
pub mod events;
pub mod host;
pub mod reconcile;

pub use animation::{
    AnimationOptions, AnimationSpec, AnimationTrigger, Animator, Completion, Finisher,
    FrameAnimator, ImmediateAnimator, Keyframe, Phase,
};
pub use directive::{Directive, DirectiveFactory, DirectiveRegistry};
pub use dom::{LiveNode, PLACEHOLDER_TAG};
pub use host::{Component, Environment, Host, HostError, HostHandle, Method, ROOT_TAG};
pub use reconcile::{BindingHost, Detached, NewTree, Stats, reconcile, reconcile_blocking, teardown};

pub use lumen_dom::VNode;
