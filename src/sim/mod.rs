//! Simulated widget runtime
//!
//! A stand-in for the IFrame API driven by a [`Scheduler`]. Script loading,
//! widget readiness and state-change notifications all arrive asynchronously
//! after configurable latencies, the way they do in a browser. The playback
//! position advances with the scheduler's clock while playing.

#[cfg(not(target_arch = "wasm32"))]
pub mod parent;

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::debug;

use crate::player::{
    PlayerBackend, PlayerFactory, ScriptHost, WidgetEvents, WidgetOptions, WidgetState,
};
use crate::schedule::Scheduler;
use crate::utils::error::{DedicationError, Result};

/// Simulation knobs
#[derive(Debug, Clone, PartialEq)]
pub struct SimSettings {
    /// Delay between script injection and the ready hook
    pub script_latency: Duration,

    /// Delay between widget construction and its ready event
    pub ready_latency: Duration,

    /// Delay before a play/pause is reported back
    pub state_latency: Duration,

    /// Media length in seconds
    pub duration: f64,

    /// Widget volume at construction, percent
    pub initial_volume: u8,

    /// Runtime global already present before any injection
    pub preloaded: bool,

    /// Widget constructor throws
    pub fail_construction: bool,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            script_latency: Duration::from_millis(100),
            ready_latency: Duration::from_millis(200),
            state_latency: Duration::from_millis(50),
            duration: 240.0,
            initial_volume: 100,
            preloaded: false,
            fail_construction: false,
        }
    }
}

struct RuntimeInner {
    loaded: bool,
    hook: Option<Box<dyn FnMut()>>,
    injected: Vec<String>,
    widgets: Vec<Rc<SimulatedWidget>>,
}

/// Page-level half of the simulation: script host and widget factory
pub struct SimulatedRuntime {
    me: Weak<SimulatedRuntime>,
    scheduler: Rc<dyn Scheduler>,
    settings: SimSettings,
    inner: RefCell<RuntimeInner>,
}

impl SimulatedRuntime {
    pub fn new(scheduler: Rc<dyn Scheduler>, settings: SimSettings) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            me: me.clone(),
            scheduler,
            inner: RefCell::new(RuntimeInner {
                loaded: settings.preloaded,
                hook: None,
                injected: Vec::new(),
                widgets: Vec::new(),
            }),
            settings,
        })
    }

    pub fn settings(&self) -> &SimSettings {
        &self.settings
    }

    /// Scripts injected so far
    pub fn injected_scripts(&self) -> Vec<String> {
        self.inner.borrow().injected.clone()
    }

    /// Every widget constructed so far, oldest first
    pub fn widgets(&self) -> Vec<Rc<SimulatedWidget>> {
        self.inner.borrow().widgets.clone()
    }

    /// Most recently constructed widget
    pub fn latest_widget(&self) -> Option<Rc<SimulatedWidget>> {
        self.inner.borrow().widgets.last().cloned()
    }

    /// Invoke the installed ready hook, as the runtime does once loaded
    pub fn fire_ready_hook(&self) {
        self.inner.borrow_mut().loaded = true;
        let hook = self.inner.borrow_mut().hook.take();
        if let Some(mut hook) = hook {
            hook();
            let mut inner = self.inner.borrow_mut();
            if inner.hook.is_none() {
                inner.hook = Some(hook);
            }
        }
    }
}

impl ScriptHost for SimulatedRuntime {
    fn has_runtime(&self) -> bool {
        self.inner.borrow().loaded
    }

    fn inject_script(&self, src: &str) -> Result<()> {
        self.inner.borrow_mut().injected.push(src.to_string());

        let me = self.me.clone();
        self.scheduler.set_timeout(
            self.settings.script_latency,
            Box::new(move || {
                if let Some(runtime) = me.upgrade() {
                    runtime.fire_ready_hook();
                }
            }),
        );
        Ok(())
    }

    fn install_ready_hook(&self, hook: Box<dyn FnMut()>) {
        self.inner.borrow_mut().hook = Some(hook);
    }
}

impl PlayerFactory for SimulatedRuntime {
    fn create(
        &self,
        element_id: &str,
        options: &WidgetOptions,
        events: WidgetEvents,
    ) -> Result<Box<dyn PlayerBackend>> {
        if self.settings.fail_construction {
            return Err(DedicationError::player_error("simulated constructor failure"));
        }

        let WidgetEvents {
            mut on_ready,
            on_state_change,
        } = events;

        let widget = SimulatedWidget::new(
            Rc::clone(&self.scheduler),
            element_id,
            options,
            &self.settings,
            on_state_change,
        );
        self.inner.borrow_mut().widgets.push(Rc::clone(&widget));

        let pending = Rc::clone(&widget);
        self.scheduler.set_timeout(
            self.settings.ready_latency,
            Box::new(move || {
                if pending.mark_ready() {
                    let target: &dyn PlayerBackend = &pending;
                    on_ready(target);
                }
            }),
        );

        Ok(Box::new(widget))
    }
}

struct WidgetInner {
    ready: bool,
    destroyed: bool,
    state: WidgetState,

    /// Position at the last pause or seek
    offset: f64,
    playing_since: Option<Duration>,
    volume: u8,
    muted: bool,
    permissions: Option<String>,
    calls: Vec<String>,
}

/// One simulated player widget
pub struct SimulatedWidget {
    me: Weak<SimulatedWidget>,
    scheduler: Rc<dyn Scheduler>,
    element_id: String,
    options: WidgetOptions,
    duration: f64,
    state_latency: Duration,
    inner: RefCell<WidgetInner>,
    on_state_change: RefCell<Option<Box<dyn FnMut(WidgetState)>>>,
}

impl SimulatedWidget {
    fn new(
        scheduler: Rc<dyn Scheduler>,
        element_id: &str,
        options: &WidgetOptions,
        settings: &SimSettings,
        on_state_change: Box<dyn FnMut(WidgetState)>,
    ) -> Rc<Self> {
        let duration = settings.duration.max(0.0);
        Rc::new_cyclic(|me| Self {
            me: me.clone(),
            scheduler,
            element_id: element_id.to_string(),
            options: options.clone(),
            duration,
            state_latency: settings.state_latency,
            inner: RefCell::new(WidgetInner {
                ready: false,
                destroyed: false,
                state: WidgetState::Unstarted,
                offset: f64::from(options.start_seconds).min(duration),
                playing_since: None,
                volume: settings.initial_volume.min(100),
                muted: false,
                permissions: None,
                calls: Vec::new(),
            }),
            on_state_change: RefCell::new(Some(on_state_change)),
        })
    }

    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    pub fn video_id(&self) -> &str {
        &self.options.video_id
    }

    pub fn start_seconds(&self) -> u32 {
        self.options.start_seconds
    }

    pub fn is_ready(&self) -> bool {
        self.inner.borrow().ready
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.borrow().destroyed
    }

    pub fn is_playing(&self) -> bool {
        self.inner.borrow().playing_since.is_some()
    }

    /// `allow` attribute set on the embed, if any
    pub fn permissions(&self) -> Option<String> {
        self.inner.borrow().permissions.clone()
    }

    pub fn volume_percent(&self) -> u8 {
        self.inner.borrow().volume
    }

    pub fn muted(&self) -> bool {
        self.inner.borrow().muted
    }

    /// Method names invoked on the widget, oldest first
    pub fn calls(&self) -> Vec<String> {
        self.inner.borrow().calls.clone()
    }

    /// Current playback position in seconds
    pub fn position(&self) -> f64 {
        let inner = self.inner.borrow();
        self.position_of(&inner)
    }

    fn position_of(&self, inner: &WidgetInner) -> f64 {
        let elapsed = inner
            .playing_since
            .map(|since| self.scheduler.now().saturating_sub(since).as_secs_f64())
            .unwrap_or(0.0);
        (inner.offset + elapsed).min(self.duration)
    }

    /// Returns false when already ready or destroyed
    fn mark_ready(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.ready || inner.destroyed {
            return false;
        }
        inner.ready = true;
        true
    }

    /// Record a call; false when the widget cannot take it
    fn record(&self, name: &str) -> bool {
        let mut inner = self.inner.borrow_mut();
        inner.calls.push(name.to_string());
        inner.ready && !inner.destroyed
    }

    fn report_later(&self, state: WidgetState) {
        let me = self.me.clone();
        self.scheduler.set_timeout(
            self.state_latency,
            Box::new(move || {
                if let Some(widget) = me.upgrade() {
                    widget.report(state);
                }
            }),
        );
    }

    fn report(&self, state: WidgetState) {
        if self.is_destroyed() {
            return;
        }
        let callback = self.on_state_change.borrow_mut().take();
        if let Some(mut callback) = callback {
            callback(state);
            let mut slot = self.on_state_change.borrow_mut();
            if slot.is_none() {
                *slot = Some(callback);
            }
        }
    }
}

impl PlayerBackend for Rc<SimulatedWidget> {
    fn play_video(&self) {
        if !self.record("playVideo") {
            return;
        }
        let now = self.scheduler.now();
        {
            let mut inner = self.inner.borrow_mut();
            if inner.playing_since.is_some() {
                return;
            }
            inner.playing_since = Some(now);
            inner.state = WidgetState::Playing;
        }
        self.report_later(WidgetState::Playing);
    }

    fn pause_video(&self) {
        if !self.record("pauseVideo") {
            return;
        }
        {
            let mut inner = self.inner.borrow_mut();
            if inner.playing_since.is_none() {
                return;
            }
            inner.offset = self.position_of(&inner);
            inner.playing_since = None;
            inner.state = WidgetState::Paused;
        }
        self.report_later(WidgetState::Paused);
    }

    fn seek_to(&self, seconds: f64, _allow_seek_ahead: bool) {
        if !self.record("seekTo") {
            return;
        }
        let now = self.scheduler.now();
        let mut inner = self.inner.borrow_mut();
        inner.offset = seconds.clamp(0.0, self.duration);
        if inner.playing_since.is_some() {
            inner.playing_since = Some(now);
        }
    }

    fn set_volume(&self, volume: u8) {
        if self.record("setVolume") {
            self.inner.borrow_mut().volume = volume.min(100);
        }
    }

    fn mute(&self) {
        if self.record("mute") {
            self.inner.borrow_mut().muted = true;
        }
    }

    fn un_mute(&self) {
        if self.record("unMute") {
            self.inner.borrow_mut().muted = false;
        }
    }

    fn current_time(&self) -> Option<f64> {
        let inner = self.inner.borrow();
        (inner.ready && !inner.destroyed).then(|| self.position_of(&inner))
    }

    fn duration(&self) -> Option<f64> {
        let inner = self.inner.borrow();
        (inner.ready && !inner.destroyed).then_some(self.duration)
    }

    fn volume(&self) -> Option<u8> {
        let inner = self.inner.borrow();
        (inner.ready && !inner.destroyed).then_some(inner.volume)
    }

    fn is_muted(&self) -> Option<bool> {
        let inner = self.inner.borrow();
        (inner.ready && !inner.destroyed).then_some(inner.muted)
    }

    fn allow_autoplay(&self, permissions: &str) {
        self.inner.borrow_mut().permissions = Some(permissions.to_string());
    }

    fn destroy(&self) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.calls.push("destroy".to_string());
        if inner.destroyed {
            return Err(DedicationError::player_error("widget already destroyed"));
        }
        inner.destroyed = true;
        inner.playing_since = None;
        debug!("sim: widget {} destroyed", self.options.video_id);
        Ok(())
    }
}
