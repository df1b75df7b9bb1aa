//! `setInterval`/`setTimeout` backed scheduler

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::error;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

use crate::schedule::{Scheduler, TaskHandle};

enum Kind {
    Interval,
    Timeout,
}

struct Entry {
    js_id: i32,
    kind: Kind,
    closure: Closure<dyn FnMut()>,
}

/// Scheduler on the window's timers
pub struct BrowserScheduler {
    me: Weak<BrowserScheduler>,
    window: web_sys::Window,
    origin_ms: f64,
    next_id: Cell<u64>,
    entries: RefCell<HashMap<u64, Entry>>,

    /// Closures that finished or were cancelled, possibly while running;
    /// dropped at the start of the next timer callback
    retired: RefCell<Vec<Closure<dyn FnMut()>>>,
}

impl BrowserScheduler {
    pub fn new(window: web_sys::Window) -> Rc<Self> {
        let origin_ms = window.performance().map(|p| p.now()).unwrap_or(0.0);
        Rc::new_cyclic(|me| Self {
            me: me.clone(),
            window,
            origin_ms,
            next_id: Cell::new(0),
            entries: RefCell::new(HashMap::new()),
            retired: RefCell::new(Vec::new()),
        })
    }

    fn allocate(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Runs at the top of every timer callback, when no retired closure is on the stack
    fn sweep(&self) {
        let retired = std::mem::take(&mut *self.retired.borrow_mut());
        drop(retired);
    }

    fn retire(&self, id: u64) {
        if let Some(entry) = self.entries.borrow_mut().remove(&id) {
            self.retired.borrow_mut().push(entry.closure);
        }
    }
}

fn millis(duration: Duration) -> i32 {
    duration.as_millis().min(i32::MAX as u128) as i32
}

impl Scheduler for BrowserScheduler {
    fn set_interval(&self, period: Duration, mut task: Box<dyn FnMut()>) -> TaskHandle {
        let id = self.allocate();
        let me = self.me.clone();
        let closure = Closure::wrap(Box::new(move || {
            if let Some(scheduler) = me.upgrade() {
                scheduler.sweep();
            }
            task()
        }) as Box<dyn FnMut()>);

        match self
            .window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                millis(period.max(Duration::from_millis(1))),
            ) {
            Ok(js_id) => {
                self.entries.borrow_mut().insert(
                    id,
                    Entry {
                        js_id,
                        kind: Kind::Interval,
                        closure,
                    },
                );
            }
            Err(e) => error!("web: setInterval failed: {:?}", e),
        }
        TaskHandle(id)
    }

    fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TaskHandle {
        let id = self.allocate();
        let me = self.me.clone();
        let mut task = Some(task);
        let closure = Closure::wrap(Box::new(move || {
            if let Some(scheduler) = me.upgrade() {
                scheduler.sweep();
                scheduler.retire(id);
            }
            if let Some(task) = task.take() {
                task();
            }
        }) as Box<dyn FnMut()>);

        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                millis(delay),
            ) {
            Ok(js_id) => {
                self.entries.borrow_mut().insert(
                    id,
                    Entry {
                        js_id,
                        kind: Kind::Timeout,
                        closure,
                    },
                );
            }
            Err(e) => error!("web: setTimeout failed: {:?}", e),
        }
        TaskHandle(id)
    }

    fn cancel(&self, handle: TaskHandle) {
        let entry = self.entries.borrow_mut().remove(&handle.0);
        if let Some(entry) = entry {
            match entry.kind {
                Kind::Interval => self.window.clear_interval_with_handle(entry.js_id),
                Kind::Timeout => self.window.clear_timeout_with_handle(entry.js_id),
            }
            self.retired.borrow_mut().push(entry.closure);
        }
    }

    fn now(&self) -> Duration {
        let now = self
            .window
            .performance()
            .map(|p| p.now())
            .unwrap_or(self.origin_ms);
        Duration::from_secs_f64(((now - self.origin_ms) / 1000.0).max(0.0))
    }
}
