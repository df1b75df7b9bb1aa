//! Browser bindings
//!
//! Real implementations of the page seams: window timers, `postMessage` to
//! the embedding parent and the YouTube IFrame API. [`WebPage`] is the
//! JavaScript-facing entry point.

mod channel;
mod scheduler;
mod youtube;

pub use channel::BrowserChannel;
pub use scheduler::BrowserScheduler;
pub use youtube::YouTubeRuntime;

use std::rc::Rc;

use log::debug;
use serde_json::json;
use wasm_bindgen::prelude::*;

use crate::page::{DataSource, DedicationPage};
use crate::player::{BootstrapLoader, PlayerEnvironment};
use crate::utils::config::Config;

/// A running dedication page, driven from JavaScript
#[wasm_bindgen]
pub struct WebPage {
    page: DedicationPage,
}

#[wasm_bindgen]
impl WebPage {
    /// Start the page; `config_toml` overrides the defaults
    #[wasm_bindgen(constructor)]
    pub fn new(config_toml: Option<String>) -> Result<WebPage, JsValue> {
        console_error_panic_hook::set_once();

        let config = match config_toml {
            Some(text) => {
                Config::from_toml_str(&text).map_err(|e| JsValue::from_str(&e.to_string()))?
            }
            None => Config::default(),
        };
        // A second page on the same document keeps the first logger
        if console_log::init_with_level(config.general.level()).is_err() {
            debug!("web: logger already installed");
        }
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;

        let runtime = Rc::new(YouTubeRuntime::new(window.clone()));
        let env = PlayerEnvironment {
            scheduler: BrowserScheduler::new(window.clone()),
            loader: BootstrapLoader::for_page(),
            host: runtime.clone(),
            factory: runtime,
        };
        let channel = Rc::new(BrowserChannel::new(window));

        let page = DedicationPage::start(config, DataSource::Handshake(channel), env);
        Ok(WebPage { page })
    }

    #[wasm_bindgen(js_name = togglePlayPause)]
    pub fn toggle_play_pause(&self) {
        self.page.toggle_play_pause();
    }

    pub fn seek(&self, seconds: f64) {
        self.page.seek(seconds);
    }

    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&self, level: f64) {
        self.page.set_volume(level);
    }

    #[wasm_bindgen(js_name = toggleMute)]
    pub fn toggle_mute(&self) {
        self.page.toggle_mute();
    }

    /// Player bar state as a plain object, `null` before a player is mounted
    pub fn player(&self) -> JsValue {
        let Some(snapshot) = self.page.snapshot() else {
            return JsValue::NULL;
        };
        let value = json!({
            "ready": snapshot.state.is_ready(),
            "playing": snapshot.playing,
            "muted": snapshot.muted,
            "volume": snapshot.volume,
            "position": snapshot.position,
            "duration": snapshot.duration,
            "positionLabel": crate::utils::format_time(snapshot.position),
            "durationLabel": crate::utils::format_time(snapshot.duration),
        });
        channel::to_js(&value).unwrap_or(JsValue::NULL)
    }

    /// Display copy as a plain object, `null` while waiting for the parent
    pub fn content(&self) -> JsValue {
        let Some(resolved) = self.page.resolved() else {
            return JsValue::NULL;
        };
        let photos: Vec<_> = resolved
            .photos
            .iter()
            .map(|p| json!({"previewUrl": p.preview_url, "caption": p.caption}))
            .collect();
        let value = json!({
            "title": resolved.title,
            "intro": resolved.intro,
            "button": resolved.button,
            "coupleName": resolved.couple_name,
            "topPhrase": resolved.top_phrase,
            "phrases": resolved.phrases,
            "phraseFinal": resolved.phrase_final,
            "startTimestamp": resolved.start_timestamp,
            "photos": photos,
            "musicTitle": resolved.music_title,
            "currentMessage": self.page.current_message(),
        });
        channel::to_js(&value).unwrap_or(JsValue::NULL)
    }

    pub fn teardown(&self) {
        self.page.teardown();
    }
}
