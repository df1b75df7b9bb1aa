//! `window.postMessage` channel

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use log::{debug, error};
use serde_json::Value;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};

use crate::channel::{InboundEnvelope, ListenerId, OutboundMessage, TargetOrigin, WindowChannel};
use crate::utils::error::{DedicationError, Result};

type MessageClosure = Closure<dyn FnMut(web_sys::MessageEvent)>;

/// Channel between this document and its parent window
pub struct BrowserChannel {
    window: web_sys::Window,
    next_id: Cell<u64>,
    listeners: RefCell<HashMap<u64, MessageClosure>>,
}

impl BrowserChannel {
    pub fn new(window: web_sys::Window) -> Self {
        Self {
            window,
            next_id: Cell::new(0),
            listeners: RefCell::new(HashMap::new()),
        }
    }
}

/// JSON value to a JS object
pub(crate) fn to_js(value: &Value) -> Result<JsValue> {
    let text = serde_json::to_string(value)?;
    js_sys::JSON::parse(&text)
        .map_err(|e| DedicationError::Channel(format!("JSON.parse failed: {:?}", e)))
}

/// Structured-clone data back to JSON; `None` for anything JSON cannot express
fn from_js(data: &JsValue) -> Option<Value> {
    let text = js_sys::JSON::stringify(data).ok()?.as_string()?;
    serde_json::from_str(&text).ok()
}

impl WindowChannel for BrowserChannel {
    fn referrer(&self) -> Option<String> {
        let referrer = self.window.document()?.referrer();
        (!referrer.is_empty()).then_some(referrer)
    }

    fn post_to_parent(&self, message: &OutboundMessage, target: &TargetOrigin) {
        let parent = match self.window.parent() {
            Ok(Some(parent)) => parent,
            _ => {
                debug!("web: no parent window to post to");
                return;
            }
        };

        let payload = match to_js(&message.to_value()) {
            Ok(payload) => payload,
            Err(e) => {
                error!("web: {}", e);
                return;
            }
        };

        if let Err(e) = parent.post_message(&payload, target.as_str()) {
            debug!("web: postMessage to {} failed: {:?}", target, e);
        }
    }

    fn listen(&self, mut handler: Box<dyn FnMut(InboundEnvelope)>) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let closure: MessageClosure = Closure::wrap(Box::new(move |event: web_sys::MessageEvent| {
            let Some(data) = from_js(&event.data()) else {
                debug!("web: message from {} is not JSON", event.origin());
                return;
            };
            handler(InboundEnvelope::new(event.origin(), data));
        }) as Box<dyn FnMut(web_sys::MessageEvent)>);

        if let Err(e) = self
            .window
            .add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
        {
            error!("web: addEventListener(message) failed: {:?}", e);
        }
        self.listeners.borrow_mut().insert(id, closure);
        ListenerId(id)
    }

    fn unlisten(&self, id: ListenerId) {
        let closure = self.listeners.borrow_mut().remove(&id.0);
        if let Some(closure) = closure {
            let _ = self
                .window
                .remove_event_listener_with_callback("message", closure.as_ref().unchecked_ref());
            // May be running right now (stop() from inside the handler)
            closure.forget();
        }
    }
}
