//! Enter/leave animation triggers and the completion handles the reconciler
//! awaits before detaching a node.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::FutureExt;
use futures::channel::oneshot;
use lumen_core::Scheduler;

use crate::dom::LiveNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Enter,
    Leave,
}

/// Style declarations of one keyframe, in order.
pub type Keyframe = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationOptions {
    pub duration: Duration,
    pub delay: Duration,
    pub easing: String,
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(200),
            delay: Duration::ZERO,
            easing: "ease".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnimationSpec {
    pub keyframes: Vec<Keyframe>,
    pub options: AnimationOptions,
}

impl AnimationSpec {
    pub fn new(keyframes: Vec<Keyframe>) -> Self {
        Self {
            keyframes,
            options: AnimationOptions::default(),
        }
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.options.duration = duration;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.options.delay = delay;
        self
    }

    pub fn easing(mut self, easing: impl Into<String>) -> Self {
        self.options.easing = easing.into();
        self
    }

    /// Delay plus duration.
    pub fn total(&self) -> Duration {
        self.options.delay + self.options.duration
    }
}

/// Named pair of animations, selected on an element by its `animate`
/// attribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnimationTrigger {
    pub enter: Option<AnimationSpec>,
    pub leave: Option<AnimationSpec>,
}

impl AnimationTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(mut self, spec: AnimationSpec) -> Self {
        self.enter = Some(spec);
        self
    }

    pub fn leave(mut self, spec: AnimationSpec) -> Self {
        self.leave = Some(spec);
        self
    }
}

enum State {
    Ready,
    Pending(oneshot::Receiver<()>),
}

/// Resolves once an animation has finished. A dropped [`Finisher`] counts as
/// finished.
pub struct Completion(State);

/// Completes the paired [`Completion`].
#[derive(Debug)]
pub struct Finisher(oneshot::Sender<()>);

impl Completion {
    pub fn ready() -> Self {
        Completion(State::Ready)
    }

    pub fn pending() -> (Completion, Finisher) {
        let (tx, rx) = oneshot::channel();
        (Completion(State::Pending(rx)), Finisher(tx))
    }
}

impl Future for Completion {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match &mut self.0 {
            State::Ready => Poll::Ready(()),
            State::Pending(rx) => rx.poll_unpin(cx).map(|_| ()),
        }
    }
}

impl Finisher {
    pub fn finish(self) {
        let _ = self.0.send(());
    }
}

/// Runs animations against live nodes.
pub trait Animator {
    fn play(&self, node: &LiveNode, phase: Phase, spec: &AnimationSpec) -> Completion;
}

/// Finishes every animation at once.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateAnimator;

impl Animator for ImmediateAnimator {
    fn play(&self, node: &LiveNode, phase: Phase, _spec: &AnimationSpec) -> Completion {
        tracing::trace!(?node, ?phase, "animation skipped");
        Completion::ready()
    }
}

/// Finishes an animation after as many scheduler frames as its delay plus
/// duration spans, at least one.
#[derive(Debug, Clone)]
pub struct FrameAnimator {
    scheduler: Scheduler,
}

impl FrameAnimator {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    pub fn frames_for(&self, spec: &AnimationSpec) -> u32 {
        let interval = self.scheduler.config().frame_interval.as_nanos();
        if interval == 0 {
            return 1;
        }
        let frames = spec.total().as_nanos().div_ceil(interval).max(1);
        u32::try_from(frames).unwrap_or(u32::MAX)
    }
}

impl Animator for FrameAnimator {
    fn play(&self, node: &LiveNode, phase: Phase, spec: &AnimationSpec) -> Completion {
        let frames = self.frames_for(spec);
        tracing::debug!(?node, ?phase, frames, "animation started");
        let (completion, finisher) = Completion::pending();
        countdown(self.scheduler.clone(), frames, finisher);
        completion
    }
}

fn countdown(scheduler: Scheduler, remaining: u32, finisher: Finisher) {
    let next = scheduler.clone();
    scheduler.request_frame(move || {
        if remaining <= 1 {
            finisher.finish();
        } else {
            countdown(next, remaining - 1, finisher);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use lumen_core::RuntimeConfig;

    #[test]
    fn dropped_finisher_completes() {
        let (completion, finisher) = Completion::pending();
        drop(finisher);
        block_on(completion);
    }

    #[test]
    fn frame_animator_counts_frames() {
        let scheduler = Scheduler::with_config(RuntimeConfig::from_fps(100));
        let animator = FrameAnimator::new(scheduler.clone());
        let spec = AnimationSpec::new(vec![]).duration(Duration::from_millis(30));
        assert_eq!(animator.frames_for(&spec), 3);

        let mut completion = animator.play(&LiveNode::element("div"), Phase::Leave, &spec);
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        for _ in 0..2 {
            scheduler.flush();
            assert!(Pin::new(&mut completion).poll(&mut cx).is_pending());
        }
        scheduler.flush();
        assert!(Pin::new(&mut completion).poll(&mut cx).is_ready());
    }
}
