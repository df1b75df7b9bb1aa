//! Dedication page orchestration
//!
//! Ties the pieces together for one page view: obtain the payload (from a
//! static file or through the parent handshake), resolve display copy, rotate
//! the love messages and mount the background player.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::{debug, info};

use crate::channel::WindowChannel;
use crate::handshake::{Handshake, HandshakeOptions, HandshakeState};
use crate::payload::{DedicationPayload, MessageRotation, ResolvedDedication};
use crate::player::{
    extract_video_id, PlayerAdapter, PlayerEnvironment, PlayerEventHandler, PlayerSnapshot,
};
use crate::utils::config::Config;
use crate::utils::error::Result;

/// Where the payload comes from
pub enum DataSource {
    /// Payload known up front; no handshake
    Static(DedicationPayload),

    /// Ask the embedding parent over this channel
    Handshake(Rc<dyn WindowChannel>),
}

impl DataSource {
    /// Static file when `content.static_payload` is set, the handshake otherwise
    pub fn from_config(config: &Config, channel: Rc<dyn WindowChannel>) -> Result<Self> {
        match config.content.static_payload.as_deref() {
            Some(path) => Ok(DataSource::Static(DedicationPayload::from_file(path)?)),
            None => Ok(DataSource::Handshake(channel)),
        }
    }
}

/// How far the page got
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePhase {
    /// Waiting for the parent
    AwaitingData,

    /// Showing a payload
    Showing,

    /// Parent never answered; showing fallback copy
    ShowingFallback,

    /// Torn down
    Closed,
}

struct PageData {
    phase: PagePhase,
    payload: Option<DedicationPayload>,
    resolved: Option<ResolvedDedication>,
    handshake: Option<Handshake>,
    rotation: Option<MessageRotation>,
    player: Option<Rc<PlayerAdapter>>,
    handler_factories: Vec<HandlerFactory>,
}

type HandlerFactory = Rc<dyn Fn() -> Box<dyn PlayerEventHandler>>;

struct PageCore {
    config: Config,
    env: PlayerEnvironment,
    data: RefCell<PageData>,
}

/// One dedication page view
///
/// Dropping the page tears it down like [`DedicationPage::teardown`].
pub struct DedicationPage {
    core: Rc<PageCore>,
}

impl DedicationPage {
    /// Start the page: fetch data, then mount the player
    pub fn start(config: Config, source: DataSource, env: PlayerEnvironment) -> Self {
        let core = Rc::new(PageCore {
            config,
            env,
            data: RefCell::new(PageData {
                phase: PagePhase::AwaitingData,
                payload: None,
                resolved: None,
                handshake: None,
                rotation: None,
                player: None,
                handler_factories: Vec::new(),
            }),
        });

        match source {
            DataSource::Static(payload) => {
                info!("page: using static payload");
                PageCore::show(&core, Some(payload));
            }
            DataSource::Handshake(channel) => {
                let options = HandshakeOptions::from_config(&core.config.handshake);
                let handshake =
                    Handshake::new(options, Rc::clone(&core.env.scheduler), channel);

                let weak: Weak<PageCore> = Rc::downgrade(&core);
                handshake.subscribe(Box::new(move |state| {
                    let Some(core) = weak.upgrade() else {
                        return;
                    };
                    match state {
                        HandshakeState::Received { payload, .. } => {
                            PageCore::show(&core, Some(payload.clone()))
                        }
                        HandshakeState::TimedOut => PageCore::show(&core, None),
                        HandshakeState::Pending => {}
                    }
                }));

                handshake.start();
                core.data.borrow_mut().handshake = Some(handshake);
            }
        }

        Self { core }
    }

    pub fn phase(&self) -> PagePhase {
        self.core.data.borrow().phase
    }

    /// Display copy, once data is resolved
    pub fn resolved(&self) -> Option<ResolvedDedication> {
        self.core.data.borrow().resolved.clone()
    }

    /// Payload as received, if any
    pub fn payload(&self) -> Option<DedicationPayload> {
        self.core.data.borrow().payload.clone()
    }

    /// Love message currently shown
    pub fn current_message(&self) -> Option<String> {
        let data = self.core.data.borrow();
        data.rotation
            .as_ref()
            .and_then(|r| r.current())
            .map(str::to_string)
    }

    /// Player state, once a player is mounted
    pub fn snapshot(&self) -> Option<PlayerSnapshot> {
        self.core.data.borrow().player.as_ref().map(|p| p.snapshot())
    }

    /// READY_FOR_DATA posts made so far
    pub fn attempts_sent(&self) -> u32 {
        self.core
            .data
            .borrow()
            .handshake
            .as_ref()
            .map(Handshake::attempts_sent)
            .unwrap_or(0)
    }

    /// Attach a handler to the current and every future player
    pub fn on_player_event<F>(&self, factory: F)
    where
        F: Fn() -> Box<dyn PlayerEventHandler> + 'static,
    {
        let factory: HandlerFactory = Rc::new(factory);
        let player = {
            let mut data = self.core.data.borrow_mut();
            data.handler_factories.push(Rc::clone(&factory));
            data.player.clone()
        };
        if let Some(player) = player {
            player.subscribe(factory());
        }
    }

    pub fn toggle_play_pause(&self) {
        self.with_player(PlayerAdapter::toggle_play_pause);
    }

    pub fn seek(&self, seconds: f64) {
        self.with_player(|p| p.seek(seconds));
    }

    pub fn set_volume(&self, level: f64) {
        self.with_player(|p| p.set_volume(level));
    }

    pub fn toggle_mute(&self) {
        self.with_player(PlayerAdapter::toggle_mute);
    }

    /// Stop everything; safe to call more than once
    pub fn teardown(&self) {
        PageCore::teardown(&self.core);
    }

    fn with_player(&self, f: impl FnOnce(&PlayerAdapter)) {
        let player = self.core.data.borrow().player.clone();
        if let Some(player) = player {
            f(&player);
        }
    }
}

impl Drop for DedicationPage {
    fn drop(&mut self) {
        PageCore::teardown(&self.core);
    }
}

impl PageCore {
    /// Data resolved: `None` means the parent never answered
    fn show(this: &Rc<Self>, payload: Option<DedicationPayload>) {
        let phase = if payload.is_some() {
            PagePhase::Showing
        } else {
            PagePhase::ShowingFallback
        };

        let resolved = payload
            .clone()
            .unwrap_or_default()
            .resolve(&this.config.fallback);

        let (reference, start_seconds) = match payload.as_ref().and_then(|p| p.music_source()) {
            Some(source) => (source.to_string(), 0),
            None => (
                this.config.player.default_media.clone(),
                this.config.player.default_start_seconds,
            ),
        };

        let (old_rotation, old_player, remount) = {
            let mut data = this.data.borrow_mut();
            if data.phase == PagePhase::Closed {
                return;
            }

            let same_media = data
                .player
                .as_ref()
                .and_then(|p| p.video_id())
                .zip(extract_video_id(&reference))
                .map(|(current, next)| current == next)
                .unwrap_or(false);

            data.phase = phase;
            data.payload = payload;
            data.resolved = Some(resolved.clone());
            let old_rotation = data.rotation.take();
            let old_player = if same_media { None } else { data.player.take() };
            (old_rotation, old_player, !same_media)
        };

        // Old parts go before new ones are built
        if let Some(rotation) = old_rotation {
            rotation.stop();
        }
        if let Some(player) = old_player {
            player.unmount();
        }

        let rotation = MessageRotation::start(
            Rc::clone(&this.env.scheduler),
            Duration::from_millis(this.config.content.rotation_interval_ms),
            resolved.phrases.clone(),
        );

        let player = if remount {
            info!("page: mounting player for {}", reference);
            let player = PlayerAdapter::mount(
                &reference,
                start_seconds,
                this.config.player.clone(),
                this.env.clone(),
            );
            let factories = this.data.borrow().handler_factories.clone();
            for factory in factories {
                player.subscribe(factory());
            }
            Some(Rc::new(player))
        } else {
            debug!("page: payload replaced, media unchanged");
            None
        };

        let mut data = this.data.borrow_mut();
        data.rotation = Some(rotation);
        if let Some(player) = player {
            data.player = Some(player);
        }
    }

    fn teardown(this: &Rc<Self>) {
        let (handshake, rotation, player) = {
            let mut data = this.data.borrow_mut();
            if data.phase == PagePhase::Closed {
                return;
            }
            data.phase = PagePhase::Closed;
            (data.handshake.take(), data.rotation.take(), data.player.take())
        };

        if let Some(handshake) = handshake {
            handshake.stop();
        }
        if let Some(rotation) = rotation {
            rotation.stop();
        }
        if let Some(player) = player {
            player.unmount();
        }
        info!("page: torn down");
    }
}
