//! Background media player adapter
//!
//! Wraps a third-party streaming widget (the YouTube IFrame player) behind a
//! small transport surface: play/pause, seek, volume and mute. The widget is
//! asynchronous end to end; its bootstrap script loads in the background and
//! the player only becomes usable once it reports ready. Every control issued
//! before that is dropped.
//!
//! The widget itself is reached through three traits so the same adapter runs
//! in the browser and in the simulation:
//! - [`ScriptHost`]: inject the bootstrap script, install its ready hook
//! - [`PlayerFactory`]: construct a widget bound to a host element
//! - [`PlayerBackend`]: drive a constructed widget

mod adapter;
mod bootstrap;
mod media_id;
mod position;

pub use adapter::{PlayerAdapter, PlayerEnvironment};
pub use bootstrap::{BootstrapLoader, WaiterId, YOUTUBE_IFRAME_API};
pub use media_id::extract_video_id;
pub use position::PositionCache;

use crate::utils::error::Result;

/// Adapter lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// No usable media id, or the widget could not be built
    Uninitialized,

    /// Waiting for the bootstrap script or for the widget's ready event
    Loading,

    /// Widget ready, no playback state reported yet
    Ready,

    /// Widget reports playback
    Playing,

    /// Widget reports anything other than playback
    Paused,

    /// Hosting view unmounted
    Destroyed,
}

impl PlayerState {
    /// Transport controls have effect in this state
    pub fn is_ready(&self) -> bool {
        matches!(self, PlayerState::Ready | PlayerState::Playing | PlayerState::Paused)
    }
}

/// Playback state codes reported by the widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
    Unknown(i32),
}

impl WidgetState {
    /// Decode the widget's numeric state
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => WidgetState::Unstarted,
            0 => WidgetState::Ended,
            1 => WidgetState::Playing,
            2 => WidgetState::Paused,
            3 => WidgetState::Buffering,
            5 => WidgetState::Cued,
            other => WidgetState::Unknown(other),
        }
    }

    /// Numeric state as the widget reports it
    pub fn code(&self) -> i32 {
        match self {
            WidgetState::Unstarted => -1,
            WidgetState::Ended => 0,
            WidgetState::Playing => 1,
            WidgetState::Paused => 2,
            WidgetState::Buffering => 3,
            WidgetState::Cued => 5,
            WidgetState::Unknown(code) => *code,
        }
    }
}

/// Player adapter configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Id of the hidden host element the widget replaces
    pub element_id: String,

    /// Position polling period in milliseconds
    pub poll_interval_ms: u64,

    /// Media played when no payload names one
    pub default_media: String,

    /// Start offset for the default media, in seconds
    pub default_start_seconds: u32,

    /// Value written to the embed's `allow` attribute once ready
    pub autoplay_permissions: String,

    /// Widget host passed to the constructor
    pub widget_host: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            element_id: "yt-player".to_string(),
            poll_interval_ms: 500,
            default_media: "L0_nXyTMyqM".to_string(),
            default_start_seconds: 4,
            autoplay_permissions: "autoplay; encrypted-media".to_string(),
            widget_host: "https://www.youtube.com".to_string(),
        }
    }
}

/// What display components need to draw the player bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSnapshot {
    pub state: PlayerState,
    pub playing: bool,
    pub muted: bool,
    pub volume: f64,
    pub position: f64,
    pub duration: f64,
}

/// Player event for external event handling
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Widget ready
    Ready { duration: f64 },

    /// Playback started
    PlaybackStarted,

    /// Playback paused (or ended, or buffering)
    PlaybackPaused,

    /// Position changed, by a poll or an optimistic seek
    PositionChanged { position: f64 },

    /// Volume changed
    VolumeChanged { volume: f64 },

    /// Mute toggled
    MuteChanged { muted: bool },

    /// Adapter torn down
    Destroyed,
}

/// Player event handler trait
pub trait PlayerEventHandler {
    /// Handle player event
    ///
    /// # Arguments
    ///
    /// * `event` - Player event
    fn handle_event(&mut self, event: PlayerEvent);
}

impl<F: FnMut(PlayerEvent)> PlayerEventHandler for F {
    fn handle_event(&mut self, event: PlayerEvent) {
        self(event)
    }
}

/// Constructor arguments for a widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetOptions {
    pub video_id: String,
    pub start_seconds: u32,
    pub host: String,
}

/// Callbacks a widget invokes over its lifetime
pub struct WidgetEvents {
    /// Widget is ready; the argument is the widget itself
    pub on_ready: Box<dyn FnMut(&dyn PlayerBackend)>,

    /// Widget playback state changed
    pub on_state_change: Box<dyn FnMut(WidgetState)>,
}

/// A constructed widget
///
/// Getters return `None` when the widget cannot answer (not loaded yet, or
/// the underlying call failed).
pub trait PlayerBackend {
    fn play_video(&self);
    fn pause_video(&self);
    fn seek_to(&self, seconds: f64, allow_seek_ahead: bool);

    /// Volume in percent, 0 to 100
    fn set_volume(&self, volume: u8);

    fn mute(&self);
    fn un_mute(&self);
    fn current_time(&self) -> Option<f64>;
    fn duration(&self) -> Option<f64>;
    fn volume(&self) -> Option<u8>;
    fn is_muted(&self) -> Option<bool>;

    /// Set the embed's permission policy (`allow` attribute)
    fn allow_autoplay(&self, permissions: &str);

    /// Tear the widget down
    fn destroy(&self) -> Result<()>;
}

/// Builds widgets once the bootstrap runtime is available
pub trait PlayerFactory {
    fn create(
        &self,
        element_id: &str,
        options: &WidgetOptions,
        events: WidgetEvents,
    ) -> Result<Box<dyn PlayerBackend>>;
}

/// Page-level access to the widget's bootstrap script
pub trait ScriptHost {
    /// The widget runtime's global entry point already exists
    fn has_runtime(&self) -> bool;

    /// Append a script tag with the given source
    fn inject_script(&self, src: &str) -> Result<()>;

    /// Install the global callback the runtime invokes once loaded
    ///
    /// The runtime may invoke it more than once.
    fn install_ready_hook(&self, hook: Box<dyn FnMut()>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_state_readiness() {
        assert!(!PlayerState::Uninitialized.is_ready());
        assert!(!PlayerState::Loading.is_ready());
        assert!(PlayerState::Ready.is_ready());
        assert!(PlayerState::Playing.is_ready());
        assert!(PlayerState::Paused.is_ready());
        assert!(!PlayerState::Destroyed.is_ready());
    }

    #[test]
    fn test_widget_state_codes() {
        for code in [-1, 0, 1, 2, 3, 5, 42] {
            assert_eq!(WidgetState::from_code(code).code(), code);
        }
        assert_eq!(WidgetState::from_code(1), WidgetState::Playing);
        assert_eq!(WidgetState::from_code(4), WidgetState::Unknown(4));
    }

    #[test]
    fn test_player_config_default() {
        let config = PlayerConfig::default();
        assert_eq!(config.element_id, "yt-player");
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.default_media, "L0_nXyTMyqM");
        assert_eq!(config.default_start_seconds, 4);
    }

    #[test]
    fn test_closure_event_handler() {
        let mut seen = Vec::new();
        {
            let mut handler = |event: PlayerEvent| seen.push(event);
            handler.handle_event(PlayerEvent::PlaybackStarted);
        }
        assert_eq!(seen, vec![PlayerEvent::PlaybackStarted]);
    }
}
