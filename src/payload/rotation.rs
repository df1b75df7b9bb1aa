//! Rotating love messages

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use crate::schedule::{Scheduler, TaskHandle};

/// Cycles through a fixed list of messages on a timer
pub struct MessageRotation {
    messages: Vec<String>,
    index: Rc<Cell<usize>>,
    scheduler: Rc<dyn Scheduler>,
    task: Cell<Option<TaskHandle>>,
}

impl MessageRotation {
    /// Start rotating; the first message is shown immediately
    ///
    /// An empty list never schedules anything and `current()` stays `None`.
    pub fn start(scheduler: Rc<dyn Scheduler>, period: Duration, messages: Vec<String>) -> Self {
        let index = Rc::new(Cell::new(0));
        let task = if messages.len() > 1 {
            let len = messages.len();
            let idx = Rc::clone(&index);
            Some(scheduler.set_interval(
                period,
                Box::new(move || idx.set((idx.get() + 1) % len)),
            ))
        } else {
            None
        };

        Self {
            messages,
            index,
            scheduler,
            task: Cell::new(task),
        }
    }

    /// Message currently shown
    pub fn current(&self) -> Option<&str> {
        self.messages.get(self.index.get()).map(String::as_str)
    }

    /// Index of the message currently shown
    pub fn index(&self) -> usize {
        self.index.get()
    }

    /// Stop rotating; the current message stays
    pub fn stop(&self) {
        if let Some(task) = self.task.take() {
            self.scheduler.cancel(task);
        }
    }
}

impl Drop for MessageRotation {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::VirtualScheduler;

    fn messages(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("m{}", i)).collect()
    }

    #[test]
    fn test_rotation_wraps() {
        let clock = Rc::new(VirtualScheduler::new());
        let rotation = MessageRotation::start(clock.clone(), Duration::from_secs(5), messages(3));

        assert_eq!(rotation.current(), Some("m0"));
        clock.advance(Duration::from_secs(5));
        assert_eq!(rotation.current(), Some("m1"));
        clock.advance(Duration::from_secs(10));
        assert_eq!(rotation.current(), Some("m0"));
    }

    #[test]
    fn test_stop_freezes_and_clears_timer() {
        let clock = Rc::new(VirtualScheduler::new());
        let rotation = MessageRotation::start(clock.clone(), Duration::from_secs(5), messages(2));

        clock.advance(Duration::from_secs(5));
        rotation.stop();
        rotation.stop();
        assert_eq!(clock.pending(), 0);
        clock.advance(Duration::from_secs(60));
        assert_eq!(rotation.index(), 1);
    }

    #[test]
    fn test_degenerate_lists() {
        let clock = Rc::new(VirtualScheduler::new());
        let empty = MessageRotation::start(clock.clone(), Duration::from_secs(5), Vec::new());
        assert_eq!(empty.current(), None);

        let single = MessageRotation::start(clock.clone(), Duration::from_secs(5), messages(1));
        assert_eq!(clock.pending(), 0);
        clock.advance(Duration::from_secs(20));
        assert_eq!(single.current(), Some("m0"));

        drop(single);
    }
}
