//! Cancellable scheduled tasks
//!
//! Everything time-driven in the page (handshake resends, position polling,
//! message rotation) goes through the [`Scheduler`] trait. The page runs on a
//! single thread: tasks are plain `FnMut`/`FnOnce` closures, no `Send` bound.
//!
//! - [`VirtualScheduler`] is a deterministic clock advanced by hand. Tests,
//!   the simulation and the native CLI use it.
//! - The browser implementation lives in `crate::web` (wasm32 + `web`).

mod virtual_clock;

pub use virtual_clock::VirtualScheduler;

use std::time::Duration;

/// Handle identifying a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(pub(crate) u64);

impl TaskHandle {
    /// Raw numeric id
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Single-threaded timer service
pub trait Scheduler {
    /// Run `task` every `period`, first run one period from now
    fn set_interval(&self, period: Duration, task: Box<dyn FnMut()>) -> TaskHandle;

    /// Run `task` once after `delay`
    fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TaskHandle;

    /// Cancel a task
    ///
    /// Cancelling a task that already ran, was already cancelled or never
    /// existed is a no-op. A task may cancel itself while running.
    fn cancel(&self, handle: TaskHandle);

    /// Time elapsed since the scheduler was created
    fn now(&self) -> Duration;
}
