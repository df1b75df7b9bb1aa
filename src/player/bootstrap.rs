//! Widget bootstrap script loader
//!
//! The widget runtime is a script that installs a global entry point and then
//! calls a well-known ready hook. One loader exists per page: the script is
//! injected at most once and every adapter that needs the runtime queues a
//! waiter until the hook fires.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use log::{debug, error, info};

use super::ScriptHost;

/// Bootstrap script of the YouTube IFrame API
pub const YOUTUBE_IFRAME_API: &str = "https://www.youtube.com/iframe_api";

thread_local! {
    static PAGE_LOADER: Rc<BootstrapLoader> = BootstrapLoader::new(YOUTUBE_IFRAME_API);
}

/// Handle to a queued ready callback, for withdrawal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WaiterId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Loading,
    Ready,
}

struct LoaderInner {
    phase: Phase,
    waiters: BTreeMap<u64, Box<dyn FnOnce()>>,
    next_id: u64,
}

/// Loads the widget runtime once and fans its ready signal out
pub struct BootstrapLoader {
    script_url: String,
    inner: RefCell<LoaderInner>,
}

impl BootstrapLoader {
    /// Create a loader for the given script
    pub fn new(script_url: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            script_url: script_url.into(),
            inner: RefCell::new(LoaderInner {
                phase: Phase::Idle,
                waiters: BTreeMap::new(),
                next_id: 0,
            }),
        })
    }

    /// The page-wide loader for the IFrame API
    pub fn for_page() -> Rc<Self> {
        PAGE_LOADER.with(Rc::clone)
    }

    /// Script this loader injects
    pub fn script_url(&self) -> &str {
        &self.script_url
    }

    /// The runtime has signalled ready
    pub fn is_ready(&self) -> bool {
        self.inner.borrow().phase == Phase::Ready
    }

    /// Callbacks still waiting for the runtime
    pub fn waiting(&self) -> usize {
        self.inner.borrow().waiters.len()
    }

    /// Run `callback` once the runtime is available
    ///
    /// Runs it immediately (and returns `None`) when the runtime is already
    /// present. Otherwise injects the script if nobody has yet, queues the
    /// callback and returns its id. If the script cannot be injected the
    /// callback is dropped and never runs.
    pub fn when_ready(
        self: &Rc<Self>,
        host: &Rc<dyn ScriptHost>,
        callback: Box<dyn FnOnce()>,
    ) -> Option<WaiterId> {
        let phase = self.inner.borrow().phase;
        if phase == Phase::Ready || (phase == Phase::Idle && host.has_runtime()) {
            self.inner.borrow_mut().phase = Phase::Ready;
            callback();
            return None;
        }

        if phase == Phase::Idle {
            let weak: Weak<Self> = Rc::downgrade(self);
            host.install_ready_hook(Box::new(move || {
                if let Some(loader) = weak.upgrade() {
                    loader.on_runtime_ready();
                }
            }));

            if let Err(e) = host.inject_script(&self.script_url) {
                error!("bootstrap: failed to inject {}: {}", self.script_url, e);
                return None;
            }
            info!("bootstrap: loading {}", self.script_url);
            self.inner.borrow_mut().phase = Phase::Loading;
        }

        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.waiters.insert(id, callback);
        Some(WaiterId(id))
    }

    /// Drop a queued callback; unknown or already-run ids are ignored
    pub fn withdraw(&self, id: WaiterId) {
        if self.inner.borrow_mut().waiters.remove(&id.0).is_some() {
            debug!("bootstrap: waiter {} withdrawn", id.0);
        }
    }

    /// Ready hook body; waiters run in registration order
    fn on_runtime_ready(&self) {
        let waiters = {
            let mut inner = self.inner.borrow_mut();
            if inner.phase == Phase::Ready {
                debug!("bootstrap: duplicate ready signal ignored");
                return;
            }
            inner.phase = Phase::Ready;
            std::mem::take(&mut inner.waiters)
        };

        info!("bootstrap: runtime ready, releasing {} waiter(s)", waiters.len());
        for (_, waiter) in waiters {
            waiter();
        }
    }
}
