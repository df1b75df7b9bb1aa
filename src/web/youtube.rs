//! YouTube IFrame API bindings

use std::cell::RefCell;

use log::debug;
use serde_json::json;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use super::channel::to_js;
use crate::player::{
    PlayerBackend, PlayerFactory, ScriptHost, WidgetEvents, WidgetOptions, WidgetState,
};
use crate::utils::error::{DedicationError, Result};

/// Global the API calls once loaded
const READY_HOOK: &str = "onYouTubeIframeAPIReady";

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = YT, js_name = Player)]
    type YtPlayer;

    #[wasm_bindgen(constructor, js_namespace = YT, js_class = "Player", catch)]
    fn new(element_id: &str, options: &JsValue) -> std::result::Result<YtPlayer, JsValue>;

    #[wasm_bindgen(method, js_name = playVideo, catch)]
    fn play_video(this: &YtPlayer) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = pauseVideo, catch)]
    fn pause_video(this: &YtPlayer) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = seekTo, catch)]
    fn seek_to(
        this: &YtPlayer,
        seconds: f64,
        allow_seek_ahead: bool,
    ) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = setVolume, catch)]
    fn set_volume(this: &YtPlayer, volume: f64) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(method, catch)]
    fn mute(this: &YtPlayer) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = unMute, catch)]
    fn un_mute(this: &YtPlayer) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = getCurrentTime, catch)]
    fn get_current_time(this: &YtPlayer) -> std::result::Result<f64, JsValue>;

    #[wasm_bindgen(method, js_name = getDuration, catch)]
    fn get_duration(this: &YtPlayer) -> std::result::Result<f64, JsValue>;

    #[wasm_bindgen(method, js_name = getVolume, catch)]
    fn get_volume(this: &YtPlayer) -> std::result::Result<f64, JsValue>;

    #[wasm_bindgen(method, js_name = isMuted, catch)]
    fn is_muted(this: &YtPlayer) -> std::result::Result<bool, JsValue>;

    #[wasm_bindgen(method, js_name = getIframe, catch)]
    fn get_iframe(this: &YtPlayer) -> std::result::Result<web_sys::Element, JsValue>;

    #[wasm_bindgen(method, catch)]
    fn destroy(this: &YtPlayer) -> std::result::Result<(), JsValue>;
}

/// Page-level access to the IFrame API
pub struct YouTubeRuntime {
    window: web_sys::Window,
    hook: RefCell<Option<Closure<dyn FnMut()>>>,
}

impl YouTubeRuntime {
    pub fn new(window: web_sys::Window) -> Self {
        Self {
            window,
            hook: RefCell::new(None),
        }
    }

    fn document(&self) -> Result<web_sys::Document> {
        self.window
            .document()
            .ok_or_else(|| DedicationError::Bootstrap("no document".to_string()))
    }

    /// Hidden element the widget replaces; created when missing
    fn ensure_host_element(&self, element_id: &str) -> Result<()> {
        let document = self.document()?;
        if document.get_element_by_id(element_id).is_some() {
            return Ok(());
        }

        let element = document
            .create_element("div")
            .map_err(|e| DedicationError::player_error(format!("{:?}", e)))?;
        element.set_id(element_id);
        if let Some(html) = element.dyn_ref::<web_sys::HtmlElement>() {
            let style = html.style();
            // Zero-size or fully transparent embeds may be refused autoplay
            let _ = style.set_property("position", "absolute");
            let _ = style.set_property("left", "-9999px");
            let _ = style.set_property("width", "1px");
            let _ = style.set_property("height", "1px");
            let _ = style.set_property("opacity", "0.01");
            let _ = style.set_property("pointer-events", "none");
        }

        let body = document
            .body()
            .ok_or_else(|| DedicationError::player_error("no document body"))?;
        body.append_child(&element)
            .map_err(|e| DedicationError::player_error(format!("{:?}", e)))?;
        Ok(())
    }
}

impl ScriptHost for YouTubeRuntime {
    fn has_runtime(&self) -> bool {
        let global: JsValue = self.window.clone().into();
        js_sys::Reflect::get(&global, &JsValue::from_str("YT"))
            .ok()
            .filter(|yt| yt.is_object())
            .and_then(|yt| js_sys::Reflect::get(&yt, &JsValue::from_str("Player")).ok())
            .map(|player| player.is_function())
            .unwrap_or(false)
    }

    fn inject_script(&self, src: &str) -> Result<()> {
        let document = self.document()?;
        let script = document
            .create_element("script")
            .map_err(|e| DedicationError::Bootstrap(format!("{:?}", e)))?
            .dyn_into::<web_sys::HtmlScriptElement>()
            .map_err(|_| DedicationError::Bootstrap("not a script element".to_string()))?;
        script.set_src(src);

        let parent: web_sys::Node = match document.head() {
            Some(head) => head.into(),
            None => document
                .body()
                .ok_or_else(|| DedicationError::Bootstrap("no head or body".to_string()))?
                .into(),
        };
        parent
            .append_child(&script)
            .map_err(|e| DedicationError::Bootstrap(format!("{:?}", e)))?;
        Ok(())
    }

    fn install_ready_hook(&self, mut hook: Box<dyn FnMut()>) {
        let closure = Closure::wrap(Box::new(move || hook()) as Box<dyn FnMut()>);
        let global: JsValue = self.window.clone().into();
        let installed =
            js_sys::Reflect::set(&global, &JsValue::from_str(READY_HOOK), closure.as_ref());
        if installed.is_err() {
            debug!("web: could not install {}", READY_HOOK);
        }
        if let Some(previous) = self.hook.borrow_mut().replace(closure) {
            previous.forget();
        }
    }
}

impl PlayerFactory for YouTubeRuntime {
    fn create(
        &self,
        element_id: &str,
        options: &WidgetOptions,
        events: WidgetEvents,
    ) -> Result<Box<dyn PlayerBackend>> {
        self.ensure_host_element(element_id)?;

        let WidgetEvents {
            mut on_ready,
            mut on_state_change,
        } = events;

        let ready = Closure::wrap(Box::new(move |event: JsValue| {
            let target = js_sys::Reflect::get(&event, &JsValue::from_str("target"))
                .unwrap_or(JsValue::UNDEFINED);
            let handle = YtHandle(target.unchecked_into());
            let target: &dyn PlayerBackend = &handle;
            on_ready(target);
        }) as Box<dyn FnMut(JsValue)>);

        let state = Closure::wrap(Box::new(move |event: JsValue| {
            let code = js_sys::Reflect::get(&event, &JsValue::from_str("data"))
                .ok()
                .and_then(|d| d.as_f64())
                .map(|d| d as i32)
                .unwrap_or(-1);
            on_state_change(WidgetState::from_code(code));
        }) as Box<dyn FnMut(JsValue)>);

        let config = to_js(&json!({
            "videoId": options.video_id,
            "host": options.host,
            "playerVars": { "start": options.start_seconds, "enablejsapi": 1 },
        }))?;
        let events = js_sys::Object::new();
        js_sys::Reflect::set(&events, &JsValue::from_str("onReady"), ready.as_ref())
            .map_err(|e| DedicationError::player_error(format!("{:?}", e)))?;
        js_sys::Reflect::set(&events, &JsValue::from_str("onStateChange"), state.as_ref())
            .map_err(|e| DedicationError::player_error(format!("{:?}", e)))?;
        js_sys::Reflect::set(&config, &JsValue::from_str("events"), &events)
            .map_err(|e| DedicationError::player_error(format!("{:?}", e)))?;

        let player = YtPlayer::new(element_id, &config)
            .map_err(|e| DedicationError::player_error(format!("YT.Player threw: {:?}", e)))?;

        Ok(Box::new(YouTubeWidget {
            handle: YtHandle(player),
            callbacks: Some((ready, state)),
        }))
    }
}

/// A `YT.Player` instance
struct YtHandle(YtPlayer);

impl PlayerBackend for YtHandle {
    fn play_video(&self) {
        let _ = self.0.play_video();
    }

    fn pause_video(&self) {
        let _ = self.0.pause_video();
    }

    fn seek_to(&self, seconds: f64, allow_seek_ahead: bool) {
        let _ = self.0.seek_to(seconds, allow_seek_ahead);
    }

    fn set_volume(&self, volume: u8) {
        let _ = self.0.set_volume(f64::from(volume.min(100)));
    }

    fn mute(&self) {
        let _ = self.0.mute();
    }

    fn un_mute(&self) {
        let _ = self.0.un_mute();
    }

    fn current_time(&self) -> Option<f64> {
        self.0.get_current_time().ok()
    }

    fn duration(&self) -> Option<f64> {
        self.0.get_duration().ok()
    }

    fn volume(&self) -> Option<u8> {
        self.0
            .get_volume()
            .ok()
            .map(|v| v.clamp(0.0, 100.0).round() as u8)
    }

    fn is_muted(&self) -> Option<bool> {
        self.0.is_muted().ok()
    }

    fn allow_autoplay(&self, permissions: &str) {
        if let Ok(iframe) = self.0.get_iframe() {
            let _ = iframe.set_attribute("allow", permissions);
        }
    }

    fn destroy(&self) -> Result<()> {
        self.0
            .destroy()
            .map_err(|e| DedicationError::player_error(format!("destroy threw: {:?}", e)))
    }
}

type Callbacks = (Closure<dyn FnMut(JsValue)>, Closure<dyn FnMut(JsValue)>);

/// Player plus the event callbacks it was built with
struct YouTubeWidget {
    handle: YtHandle,
    callbacks: Option<Callbacks>,
}

impl Drop for YouTubeWidget {
    fn drop(&mut self) {
        // The API can still fire queued events after destroy()
        if let Some((ready, state)) = self.callbacks.take() {
            ready.forget();
            state.forget();
        }
    }
}

impl PlayerBackend for YouTubeWidget {
    fn play_video(&self) {
        self.handle.play_video()
    }

    fn pause_video(&self) {
        self.handle.pause_video()
    }

    fn seek_to(&self, seconds: f64, allow_seek_ahead: bool) {
        self.handle.seek_to(seconds, allow_seek_ahead)
    }

    fn set_volume(&self, volume: u8) {
        self.handle.set_volume(volume)
    }

    fn mute(&self) {
        self.handle.mute()
    }

    fn un_mute(&self) {
        self.handle.un_mute()
    }

    fn current_time(&self) -> Option<f64> {
        self.handle.current_time()
    }

    fn duration(&self) -> Option<f64> {
        self.handle.duration()
    }

    fn volume(&self) -> Option<u8> {
        self.handle.volume()
    }

    fn is_muted(&self) -> Option<bool> {
        self.handle.is_muted()
    }

    fn allow_autoplay(&self, permissions: &str) {
        self.handle.allow_autoplay(permissions)
    }

    fn destroy(&self) -> Result<()> {
        self.handle.destroy()
    }
}
