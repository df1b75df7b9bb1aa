//! Player adapter
//!
//! Owns one widget for the lifetime of the hosting view. Mounting resolves the
//! media id, waits for the bootstrap runtime, builds the widget and, once the
//! widget reports ready, polls its position. Transport controls are no-ops
//! until then. Unmounting (or dropping the adapter) stops polling, withdraws a
//! pending bootstrap waiter and destroys the widget; a widget that finishes
//! construction after unmount is destroyed on arrival.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::{debug, error, info, warn};

use super::{
    extract_video_id, BootstrapLoader, PlayerBackend, PlayerConfig, PlayerEvent,
    PlayerEventHandler, PlayerFactory, PlayerSnapshot, PlayerState, PositionCache, ScriptHost,
    WaiterId, WidgetEvents, WidgetOptions, WidgetState,
};
use crate::schedule::{Scheduler, TaskHandle};

/// Page services the adapter runs against
#[derive(Clone)]
pub struct PlayerEnvironment {
    pub scheduler: Rc<dyn Scheduler>,
    pub loader: Rc<BootstrapLoader>,
    pub host: Rc<dyn ScriptHost>,
    pub factory: Rc<dyn PlayerFactory>,
}

/// Mutable adapter data
struct AdapterData {
    state: PlayerState,
    video_id: Option<String>,
    start_seconds: u32,
    muted: bool,

    /// 0.0 to 1.0
    volume: f64,

    /// Volume restored when unmuting from zero
    last_audible_volume: f64,

    duration: f64,
    position: PositionCache,
    backend: Option<Rc<dyn PlayerBackend>>,
    poll_task: Option<TaskHandle>,
    waiter: Option<WaiterId>,
}

impl AdapterData {
    fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            state: self.state,
            playing: self.state == PlayerState::Playing,
            muted: self.muted,
            volume: self.volume,
            position: self.position.position(),
            duration: self.duration,
        }
    }

    /// Widget to drive, if controls currently have effect
    fn ready_backend(&self) -> Option<Rc<dyn PlayerBackend>> {
        if self.state.is_ready() {
            self.backend.clone()
        } else {
            None
        }
    }
}

struct AdapterCore {
    data: RefCell<AdapterData>,
    handlers: RefCell<Vec<Box<dyn PlayerEventHandler>>>,
    config: PlayerConfig,
    env: PlayerEnvironment,
}

/// Background player bound to one hosting view
pub struct PlayerAdapter {
    core: Rc<AdapterCore>,
}

impl PlayerAdapter {
    /// Mount a player for `reference` (URL or bare id)
    ///
    /// An unusable reference leaves the adapter `Uninitialized` for good.
    pub fn mount(
        reference: &str,
        start_seconds: u32,
        config: PlayerConfig,
        env: PlayerEnvironment,
    ) -> Self {
        let video_id = extract_video_id(reference);
        let state = if video_id.is_some() {
            PlayerState::Loading
        } else {
            warn!("player: no media id in {:?}, staying uninitialized", reference);
            PlayerState::Uninitialized
        };

        let core = Rc::new(AdapterCore {
            data: RefCell::new(AdapterData {
                state,
                video_id,
                start_seconds,
                muted: false,
                volume: 1.0,
                last_audible_volume: 1.0,
                duration: 0.0,
                position: PositionCache::new(),
                backend: None,
                poll_task: None,
                waiter: None,
            }),
            handlers: RefCell::new(Vec::new()),
            config,
            env,
        });

        if state == PlayerState::Loading {
            let weak = Rc::downgrade(&core);
            let waiter = core.env.loader.when_ready(
                &core.env.host,
                Box::new(move || {
                    if let Some(core) = weak.upgrade() {
                        AdapterCore::create_widget(&core);
                    }
                }),
            );
            core.data.borrow_mut().waiter = waiter;
        }

        Self { core }
    }

    /// Register an event handler
    pub fn subscribe(&self, handler: Box<dyn PlayerEventHandler>) {
        self.core.handlers.borrow_mut().push(handler);
    }

    pub fn state(&self) -> PlayerState {
        self.core.data.borrow().state
    }

    /// Controls have effect
    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Resolved media id, if any
    pub fn video_id(&self) -> Option<String> {
        self.core.data.borrow().video_id.clone()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.core.data.borrow().snapshot()
    }

    /// Pause when playing, play otherwise
    pub fn toggle_play_pause(&self) {
        let (backend, playing) = {
            let data = self.core.data.borrow();
            (data.ready_backend(), data.state == PlayerState::Playing)
        };
        let Some(backend) = backend else {
            debug!("player: play/pause ignored, not ready");
            return;
        };

        if playing {
            backend.pause_video();
        } else {
            backend.play_video();
        }
    }

    /// Seek to `seconds`; the target shows immediately
    pub fn seek(&self, seconds: f64) {
        if !seconds.is_finite() {
            return;
        }

        let (backend, target) = {
            let data = self.core.data.borrow();
            let mut target = seconds.max(0.0);
            if data.duration > 0.0 {
                target = target.min(data.duration);
            }
            (data.ready_backend(), target)
        };
        let Some(backend) = backend else {
            debug!("player: seek ignored, not ready");
            return;
        };

        backend.seek_to(target, true);
        self.core.data.borrow_mut().position.set_optimistic(target);
        self.core.emit(vec![PlayerEvent::PositionChanged { position: target }]);
    }

    /// Set volume, 0.0 to 1.0; zero also mutes
    pub fn set_volume(&self, level: f64) {
        if level.is_nan() {
            return;
        }
        let level = level.clamp(0.0, 1.0);

        let Some(backend) = self.core.data.borrow().ready_backend() else {
            debug!("player: volume change ignored, not ready");
            return;
        };

        let muted = level == 0.0;
        {
            let mut data = self.core.data.borrow_mut();
            data.volume = level;
            data.muted = muted;
            if level > 0.0 {
                data.last_audible_volume = level;
            }
        }

        backend.set_volume(percent(level));
        if muted {
            backend.mute();
        } else {
            backend.un_mute();
        }

        self.core.emit(vec![
            PlayerEvent::VolumeChanged { volume: level },
            PlayerEvent::MuteChanged { muted },
        ]);
    }

    /// Flip mute; unmuting reapplies the volume, the last audible one when at zero
    pub fn toggle_mute(&self) {
        let Some(backend) = self.core.data.borrow().ready_backend() else {
            debug!("player: mute toggle ignored, not ready");
            return;
        };

        let unmute_to = {
            let mut data = self.core.data.borrow_mut();
            if data.muted {
                data.muted = false;
                let restored = data.volume == 0.0;
                if restored {
                    data.volume = data.last_audible_volume;
                }
                Some((data.volume, restored))
            } else {
                data.muted = true;
                None
            }
        };

        let mut events = Vec::new();
        match unmute_to {
            Some((volume, restored)) => {
                backend.un_mute();
                backend.set_volume(percent(volume));
                if restored {
                    events.push(PlayerEvent::VolumeChanged { volume });
                }
                events.push(PlayerEvent::MuteChanged { muted: false });
            }
            None => {
                backend.mute();
                events.push(PlayerEvent::MuteChanged { muted: true });
            }
        }
        self.core.emit(events);
    }

    /// Tear down; safe to call more than once
    pub fn unmount(&self) {
        AdapterCore::unmount(&self.core);
    }
}

impl Drop for PlayerAdapter {
    fn drop(&mut self) {
        AdapterCore::unmount(&self.core);
    }
}

impl AdapterCore {
    /// Bootstrap runtime is up: build the widget
    fn create_widget(this: &Rc<Self>) {
        let (video_id, start_seconds) = {
            let mut data = this.data.borrow_mut();
            data.waiter = None;
            if data.state != PlayerState::Loading {
                return;
            }
            match data.video_id.clone() {
                Some(id) => (id, data.start_seconds),
                None => return,
            }
        };

        let ready_core = Rc::downgrade(this);
        let state_core = Rc::downgrade(this);
        let events = WidgetEvents {
            on_ready: Box::new(move |target| {
                if let Some(core) = ready_core.upgrade() {
                    AdapterCore::on_widget_ready(&core, target);
                }
            }),
            on_state_change: Box::new(move |state| {
                if let Some(core) = state_core.upgrade() {
                    core.on_widget_state(state);
                }
            }),
        };

        let options = WidgetOptions {
            video_id,
            start_seconds,
            host: this.config.widget_host.clone(),
        };

        info!("player: creating widget for {}", options.video_id);
        match this.env.factory.create(&this.config.element_id, &options, events) {
            Ok(backend) => {
                let backend: Rc<dyn PlayerBackend> = Rc::from(backend);
                let destroyed = {
                    let mut data = this.data.borrow_mut();
                    if data.state == PlayerState::Destroyed {
                        true
                    } else {
                        data.backend = Some(Rc::clone(&backend));
                        false
                    }
                };
                if destroyed {
                    debug!("player: widget arrived after unmount, destroying");
                    if let Err(e) = backend.destroy() {
                        debug!("player: destroy failed: {}", e);
                    }
                }
            }
            Err(e) => {
                error!("player: failed to create widget: {}", e);
                let mut data = this.data.borrow_mut();
                if data.state == PlayerState::Loading {
                    data.state = PlayerState::Uninitialized;
                }
            }
        }
    }

    fn on_widget_ready(this: &Rc<Self>, target: &dyn PlayerBackend) {
        let duration = {
            let mut data = this.data.borrow_mut();
            if data.state != PlayerState::Loading {
                debug!("player: ready signal in state {:?} ignored", data.state);
                return;
            }

            data.state = PlayerState::Ready;
            data.duration = target
                .duration()
                .filter(|d| d.is_finite() && *d > 0.0)
                .unwrap_or(0.0);
            data.muted = target.is_muted().unwrap_or(false);
            data.volume = target
                .volume()
                .map(|v| f64::from(v.min(100)) / 100.0)
                .unwrap_or(1.0);
            if data.volume > 0.0 {
                data.last_audible_volume = data.volume;
            }
            data.duration
        };

        target.allow_autoplay(&this.config.autoplay_permissions);

        let weak: Weak<Self> = Rc::downgrade(this);
        let period = Duration::from_millis(this.config.poll_interval_ms);
        let task = this.env.scheduler.set_interval(
            period,
            Box::new(move || {
                if let Some(core) = weak.upgrade() {
                    core.poll();
                }
            }),
        );
        this.data.borrow_mut().poll_task = Some(task);

        info!("player: ready, duration {:.1}s", duration);
        this.emit(vec![PlayerEvent::Ready { duration }]);
    }

    fn on_widget_state(&self, state: WidgetState) {
        let next = if state == WidgetState::Playing {
            PlayerState::Playing
        } else {
            PlayerState::Paused
        };

        {
            let mut data = self.data.borrow_mut();
            if !data.state.is_ready() || data.state == next {
                return;
            }
            data.state = next;
        }

        debug!("player: widget state {:?}", state);
        let event = if next == PlayerState::Playing {
            PlayerEvent::PlaybackStarted
        } else {
            PlayerEvent::PlaybackPaused
        };
        self.emit(vec![event]);
    }

    /// One position poll
    fn poll(&self) {
        let backend = {
            let mut data = self.data.borrow_mut();
            if !data.state.is_ready() {
                if let Some(task) = data.poll_task.take() {
                    drop(data);
                    self.env.scheduler.cancel(task);
                }
                return;
            }
            data.backend.clone()
        };
        let Some(backend) = backend else {
            return;
        };

        let Some(current) = backend.current_time() else {
            return;
        };
        let late_duration = backend.duration();

        let changed = {
            let mut data = self.data.borrow_mut();
            if data.duration <= 0.0 {
                if let Some(d) = late_duration.filter(|d| d.is_finite() && *d > 0.0) {
                    data.duration = d;
                }
            }
            let before = data.position.position();
            data.position.record_read(current);
            let after = data.position.position();
            (before != after).then_some(after)
        };

        if let Some(position) = changed {
            self.emit(vec![PlayerEvent::PositionChanged { position }]);
        }
    }

    fn unmount(this: &Rc<Self>) {
        let (poll_task, waiter, backend) = {
            let mut data = this.data.borrow_mut();
            if data.state == PlayerState::Destroyed {
                return;
            }
            data.state = PlayerState::Destroyed;
            (data.poll_task.take(), data.waiter.take(), data.backend.take())
        };

        if let Some(task) = poll_task {
            this.env.scheduler.cancel(task);
        }
        if let Some(waiter) = waiter {
            this.env.loader.withdraw(waiter);
        }
        if let Some(backend) = backend {
            if let Err(e) = backend.destroy() {
                debug!("player: destroy failed: {}", e);
            }
        }

        info!("player: unmounted");
        this.emit(vec![PlayerEvent::Destroyed]);
    }

    /// Dispatch events with no adapter borrows held
    fn emit(&self, events: Vec<PlayerEvent>) {
        let mut handlers = std::mem::take(&mut *self.handlers.borrow_mut());
        for event in events {
            for handler in handlers.iter_mut() {
                handler.handle_event(event.clone());
            }
        }

        let mut slot = self.handlers.borrow_mut();
        handlers.append(&mut slot);
        *slot = handlers;
    }
}

fn percent(level: f64) -> u8 {
    (level.clamp(0.0, 1.0) * 100.0).round() as u8
}
