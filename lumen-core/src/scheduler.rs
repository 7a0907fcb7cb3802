//! Frame scheduler: a batching queue standing in for the paint callback.
//!
//! Callbacks requested with [`Scheduler::request_frame`] run on the next
//! [`Scheduler::flush`]. Anything requested while a flush is running waits for
//! the following one, so a callback can never re-enter the frame it runs in.
//! Asynchronous work (the awaiting tail of a render pass) is spawned onto a
//! local executor that every flush drives until it stalls.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;

use crate::config::RuntimeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(u64);

struct Queue {
    next_id: u64,
    callbacks: Vec<(FrameId, Box<dyn FnOnce()>)>,
    frames: u64,
}

#[derive(Clone)]
pub struct Scheduler {
    queue: Rc<RefCell<Queue>>,
    pool: Rc<RefCell<LocalPool>>,
    spawner: LocalSpawner,
    flushing: Rc<Cell<bool>>,
    driving: Rc<Cell<bool>>,
    config: RuntimeConfig,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            queue: Rc::new(RefCell::new(Queue {
                next_id: 0,
                callbacks: Vec::new(),
                frames: 0,
            })),
            pool: Rc::new(RefCell::new(pool)),
            spawner,
            flushing: Rc::new(Cell::new(false)),
            driving: Rc::new(Cell::new(false)),
            config,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Schedule `f` for the next frame.
    pub fn request_frame(&self, f: impl FnOnce() + 'static) -> FrameId {
        let mut q = self.queue.borrow_mut();
        let id = FrameId(q.next_id);
        q.next_id += 1;
        q.callbacks.push((id, Box::new(f)));
        id
    }

    /// Cancel a pending frame callback. Returns `false` if it already ran.
    pub fn cancel(&self, id: FrameId) -> bool {
        let mut q = self.queue.borrow_mut();
        let before = q.callbacks.len();
        q.callbacks.retain(|(cid, _)| *cid != id);
        q.callbacks.len() != before
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.borrow().callbacks.is_empty()
    }

    pub fn frame_count(&self) -> u64 {
        self.queue.borrow().frames
    }

    /// Run one frame: every callback requested before this call, then any
    /// spawned tasks until they stall. Returns the number of callbacks run.
    pub fn flush(&self) -> usize {
        // Prevent re-entrant flush; callbacks requested now go to the next frame.
        if self.flushing.replace(true) {
            return 0;
        }
        let callbacks = {
            let mut q = self.queue.borrow_mut();
            q.frames += 1;
            std::mem::take(&mut q.callbacks)
        };
        let count = callbacks.len();
        tracing::trace!(frame = self.frame_count(), callbacks = count, "frame");
        for (_, callback) in callbacks {
            callback();
        }
        self.flushing.set(false);
        self.drive();
        count
    }

    /// Flush until no callbacks are pending, at most `max_frames` times.
    pub fn flush_until_idle(&self, max_frames: usize) -> usize {
        let mut frames = 0;
        while frames < max_frames && self.has_pending() {
            self.flush();
            frames += 1;
        }
        frames
    }

    /// Tick `frames` frames spaced by the configured interval.
    pub fn run(&self, frames: usize) {
        for _ in 0..frames {
            std::thread::sleep(self.config.frame_interval);
            self.flush();
        }
    }

    pub fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        if let Err(err) = self.spawner.spawn_local(task) {
            tracing::error!(%err, "failed to spawn render task");
        }
    }

    /// Poll spawned tasks until none can make progress. Returns `false` when
    /// called from inside a task that is already being driven.
    pub fn drive(&self) -> bool {
        if self.driving.replace(true) {
            return false;
        }
        self.pool.borrow_mut().run_until_stalled();
        self.driving.set(false);
        true
    }

    pub fn is_driving(&self) -> bool {
        self.driving.get()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = self.queue.borrow();
        f.debug_struct("Scheduler")
            .field("pending", &q.callbacks.len())
            .field("frames", &q.frames)
            .finish()
    }
}
