//! Deterministic virtual clock
//!
//! Time only moves when [`VirtualScheduler::advance`] is called. Due tasks run
//! in due-time order, ties broken by creation order, and each task observes
//! `now()` equal to its own due time.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::time::Duration;

use log::trace;

use super::{Scheduler, TaskHandle};

/// Smallest period an interval may have; zero would never let time advance
const MIN_PERIOD: Duration = Duration::from_millis(1);

enum TaskKind {
    Once(Option<Box<dyn FnOnce()>>),
    Every {
        period: Duration,
        task: Option<Box<dyn FnMut()>>,
    },
}

struct Entry {
    due: Duration,
    kind: TaskKind,
}

impl Entry {
    /// A task that is currently executing has been taken out of its slot
    fn runnable(&self) -> bool {
        match &self.kind {
            TaskKind::Once(task) => task.is_some(),
            TaskKind::Every { task, .. } => task.is_some(),
        }
    }
}

#[derive(Default)]
struct ClockState {
    now: Duration,
    next_id: u64,
    tasks: BTreeMap<u64, Entry>,
}

enum Job {
    Once(Box<dyn FnOnce()>),
    Every(Box<dyn FnMut()>),
}

/// Manually advanced scheduler
#[derive(Default)]
pub struct VirtualScheduler {
    state: RefCell<ClockState>,
}

impl VirtualScheduler {
    /// Create a clock at t = 0 with no tasks
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scheduled tasks that have not run to completion or been cancelled
    pub fn pending(&self) -> usize {
        self.state.borrow().tasks.len()
    }

    /// Move time forward by `by`, running every task that falls due
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        self.advance_to(target);
    }

    /// Move time forward to `target`, running every task that falls due
    ///
    /// Targets in the past leave the clock where it is.
    pub fn advance_to(&self, target: Duration) {
        while let Some((id, due)) = self.next_due(target) {
            let job = {
                let mut state = self.state.borrow_mut();
                if due > state.now {
                    state.now = due;
                }
                let Some(entry) = state.tasks.get_mut(&id) else {
                    continue;
                };
                match &mut entry.kind {
                    TaskKind::Once(task) => task.take().map(Job::Once),
                    TaskKind::Every { task, .. } => task.take().map(Job::Every),
                }
            };

            match job {
                Some(Job::Once(task)) => {
                    self.state.borrow_mut().tasks.remove(&id);
                    trace!("virtual clock: running timeout {} at {:?}", id, due);
                    task();
                }
                Some(Job::Every(mut task)) => {
                    trace!("virtual clock: running interval {} at {:?}", id, due);
                    task();
                    // Put the closure back unless it was cancelled while running
                    let mut state = self.state.borrow_mut();
                    if let Some(entry) = state.tasks.get_mut(&id) {
                        if let TaskKind::Every { period, task: slot } = &mut entry.kind {
                            *slot = Some(task);
                            entry.due += *period;
                        }
                    }
                }
                None => {}
            }
        }

        let mut state = self.state.borrow_mut();
        if target > state.now {
            state.now = target;
        }
    }

    fn next_due(&self, target: Duration) -> Option<(u64, Duration)> {
        let state = self.state.borrow();
        state
            .tasks
            .iter()
            .filter(|(_, entry)| entry.runnable() && entry.due <= target)
            .min_by_key(|(id, entry)| (entry.due, **id))
            .map(|(id, entry)| (*id, entry.due))
    }

    fn insert(&self, delay: Duration, kind: TaskKind) -> TaskHandle {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        let due = state.now + delay;
        state.tasks.insert(id, Entry { due, kind });
        TaskHandle(id)
    }
}

impl Scheduler for VirtualScheduler {
    fn set_interval(&self, period: Duration, task: Box<dyn FnMut()>) -> TaskHandle {
        let period = period.max(MIN_PERIOD);
        self.insert(
            period,
            TaskKind::Every {
                period,
                task: Some(task),
            },
        )
    }

    fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TaskHandle {
        self.insert(delay, TaskKind::Once(Some(task)))
    }

    fn cancel(&self, handle: TaskHandle) {
        self.state.borrow_mut().tasks.remove(&handle.0);
    }

    fn now(&self) -> Duration {
        self.state.borrow().now
    }
}
