//! Reactive primitives: dynamic values, the component state store, the frame
//! scheduler and lifecycle hooks.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod scheduler;
pub mod store;
pub mod subscription;
pub mod value;
pub mod watch;

pub use config::RuntimeConfig;
pub use error::CallError;
pub use lifecycle::Lifecycle;
pub use scheduler::{FrameId, Scheduler};
pub use store::Store;
pub use subscription::Subscription;
pub use value::{Func, Value};
pub use watch::watch;
