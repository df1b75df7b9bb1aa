//! In-process window channel
//!
//! Stands in for the browser when there is no browser: outbound posts are
//! recorded (and optionally forwarded to an observer), inbound messages are
//! injected with [`LoopbackChannel::deliver`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use log::debug;

use super::{InboundEnvelope, ListenerId, OutboundMessage, TargetOrigin, WindowChannel};

type SharedHandler = Rc<RefCell<Box<dyn FnMut(InboundEnvelope)>>>;

/// A post recorded by the loopback channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    /// What was sent
    pub message: OutboundMessage,

    /// Where it was aimed
    pub target: TargetOrigin,
}

/// Channel with no real parent window behind it
pub struct LoopbackChannel {
    referrer: Option<String>,
    posted: RefCell<Vec<PostedMessage>>,
    listeners: RefCell<BTreeMap<u64, SharedHandler>>,
    next_listener: RefCell<u64>,
    post_observer: RefCell<Option<Box<dyn FnMut(&PostedMessage)>>>,
}

impl LoopbackChannel {
    /// Channel for a document with the given referrer
    pub fn new(referrer: Option<&str>) -> Self {
        Self {
            referrer: referrer.map(str::to_string),
            posted: RefCell::new(Vec::new()),
            listeners: RefCell::new(BTreeMap::new()),
            next_listener: RefCell::new(0),
            post_observer: RefCell::new(None),
        }
    }

    /// Forward every post to `observer` as well as recording it
    pub fn on_post(&self, observer: Box<dyn FnMut(&PostedMessage)>) {
        *self.post_observer.borrow_mut() = Some(observer);
    }

    /// All posts so far, oldest first
    pub fn posted(&self) -> Vec<PostedMessage> {
        self.posted.borrow().clone()
    }

    /// Number of posts so far
    pub fn post_count(&self) -> usize {
        self.posted.borrow().len()
    }

    /// Number of attached listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Deliver a message to every attached listener
    ///
    /// Listeners may detach themselves (or each other) while being called; a
    /// listener detached earlier in the same delivery is skipped.
    pub fn deliver(&self, envelope: InboundEnvelope) {
        let snapshot: Vec<(u64, SharedHandler)> = self
            .listeners
            .borrow()
            .iter()
            .map(|(id, handler)| (*id, Rc::clone(handler)))
            .collect();

        debug!(
            "loopback: delivering message from {} to {} listener(s)",
            envelope.origin,
            snapshot.len()
        );

        for (id, handler) in snapshot {
            if !self.listeners.borrow().contains_key(&id) {
                continue;
            }
            (handler.borrow_mut())(envelope.clone());
        }
    }
}

impl Default for LoopbackChannel {
    fn default() -> Self {
        Self::new(None)
    }
}

impl WindowChannel for LoopbackChannel {
    fn referrer(&self) -> Option<String> {
        self.referrer.clone()
    }

    fn post_to_parent(&self, message: &OutboundMessage, target: &TargetOrigin) {
        let posted = PostedMessage {
            message: *message,
            target: target.clone(),
        };
        self.posted.borrow_mut().push(posted.clone());
        if let Some(observer) = self.post_observer.borrow_mut().as_mut() {
            observer(&posted);
        }
    }

    fn listen(&self, handler: Box<dyn FnMut(InboundEnvelope)>) -> ListenerId {
        let mut next = self.next_listener.borrow_mut();
        let id = *next;
        *next += 1;
        self.listeners
            .borrow_mut()
            .insert(id, Rc::new(RefCell::new(handler)));
        ListenerId(id)
    }

    fn unlisten(&self, id: ListenerId) {
        self.listeners.borrow_mut().remove(&id.0);
    }
}
