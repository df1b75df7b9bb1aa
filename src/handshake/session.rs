//! Running handshake

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::{debug, info, warn};

use super::{HandshakeOptions, HandshakeState, RetryBudget, TrustPolicy};
use crate::channel::{
    origin_of, InboundEnvelope, InboundMessage, ListenerId, OutboundMessage, TargetOrigin,
    WindowChannel,
};
use crate::payload::DedicationPayload;
use crate::schedule::{Scheduler, TaskHandle};

type Observer = Box<dyn FnMut(&HandshakeState)>;

/// Mutable handshake data
struct HandshakeData {
    options: HandshakeOptions,
    state: HandshakeState,
    budget: RetryBudget,

    /// Only origin whose payloads are accepted; single writer: the message handler
    /// (or `start()` for the pinned policy)
    trusted_origin: Option<String>,

    referrer_origin: Option<String>,
    running: bool,
    retry_task: Option<TaskHandle>,
    deadline_task: Option<TaskHandle>,
    listener: Option<ListenerId>,
}

impl HandshakeData {
    fn target(&self) -> Option<TargetOrigin> {
        if let Some(origin) = self.trusted_origin.as_ref().or(self.referrer_origin.as_ref()) {
            return Some(TargetOrigin::Exact(origin.clone()));
        }
        if self.options.allow_wildcard_target {
            Some(TargetOrigin::Any)
        } else {
            None
        }
    }
}

struct HandshakeCore {
    data: RefCell<HandshakeData>,
    observers: RefCell<Vec<Observer>>,
    scheduler: Rc<dyn Scheduler>,
    channel: Rc<dyn WindowChannel>,
}

/// Readiness/data exchange with the embedding parent
///
/// Dropping the handshake tears it down like [`Handshake::stop`].
pub struct Handshake {
    core: Rc<HandshakeCore>,
}

impl Handshake {
    /// Create an idle handshake; nothing is sent until [`Handshake::start`]
    pub fn new(
        options: HandshakeOptions,
        scheduler: Rc<dyn Scheduler>,
        channel: Rc<dyn WindowChannel>,
    ) -> Self {
        let budget = RetryBudget::new(options.max_attempts, options.retry_interval);
        Self {
            core: Rc::new(HandshakeCore {
                data: RefCell::new(HandshakeData {
                    options,
                    state: HandshakeState::Pending,
                    budget,
                    trusted_origin: None,
                    referrer_origin: None,
                    running: false,
                    retry_task: None,
                    deadline_task: None,
                    listener: None,
                }),
                observers: RefCell::new(Vec::new()),
                scheduler,
                channel,
            }),
        }
    }

    /// Attach the listener, announce readiness and schedule resends
    ///
    /// No-op while running or once the handshake has reached a final state.
    pub fn start(&self) {
        HandshakeCore::start(&self.core);
    }

    /// Cancel every timer and detach the listener
    ///
    /// Safe to call repeatedly, and before `start()`.
    pub fn stop(&self) {
        self.core.stop();
    }

    /// Feed a message directly, as the listener would
    pub fn handle_message(&self, envelope: InboundEnvelope) {
        self.core.handle_message(envelope);
    }

    /// Be notified after every state change
    pub fn subscribe(&self, observer: Box<dyn FnMut(&HandshakeState)>) {
        self.core.observers.borrow_mut().push(observer);
    }

    /// Current state
    pub fn state(&self) -> HandshakeState {
        self.core.data.borrow().state.clone()
    }

    /// Received payload, if any
    pub fn payload(&self) -> Option<DedicationPayload> {
        self.core.data.borrow().state.payload().cloned()
    }

    /// Origin payloads are accepted from, once known
    pub fn trusted_origin(&self) -> Option<String> {
        self.core.data.borrow().trusted_origin.clone()
    }

    /// READY_FOR_DATA sends so far
    pub fn attempts_sent(&self) -> u32 {
        self.core.data.borrow().budget.sent()
    }

    /// Started and not stopped
    pub fn is_running(&self) -> bool {
        self.core.data.borrow().running
    }
}

impl Drop for Handshake {
    fn drop(&mut self) {
        self.core.stop();
    }
}

impl HandshakeCore {
    fn start(this: &Rc<Self>) {
        {
            let mut data = this.data.borrow_mut();
            if data.running || !data.state.is_pending() {
                return;
            }
            data.running = true;

            let referrer_origin = this.channel.referrer().as_deref().and_then(origin_of);
            if let TrustPolicy::Pinned(configured) = data.options.trust.clone() {
                let pinned = configured.or_else(|| referrer_origin.clone());
                if pinned.is_none() {
                    warn!(
                        "handshake: no trusted origin configured and no referrer; \
                         payloads will be rejected"
                    );
                }
                data.trusted_origin = pinned;
            }
            data.referrer_origin = referrer_origin;

            info!(
                "handshake: starting (trust {:?}, {} attempts every {:?})",
                data.options.trust,
                data.options.max_attempts,
                data.options.retry_interval
            );
        }

        let weak = Rc::downgrade(this);
        let listener = this.channel.listen(Box::new(move |envelope| {
            if let Some(core) = weak.upgrade() {
                core.handle_message(envelope);
            }
        }));
        this.data.borrow_mut().listener = Some(listener);

        if !this.send_next() {
            this.finish_timed_out("retry budget is empty");
            return;
        }
        // The first send may have been answered synchronously
        if !this.data.borrow().state.is_pending() {
            return;
        }

        let (interval, deadline) = {
            let data = this.data.borrow();
            (data.budget.interval(), data.options.deadline)
        };

        let weak: Weak<Self> = Rc::downgrade(this);
        let retry = this.scheduler.set_interval(
            interval,
            Box::new(move || {
                if let Some(core) = weak.upgrade() {
                    core.on_retry_tick();
                }
            }),
        );
        this.data.borrow_mut().retry_task = Some(retry);

        if let Some(deadline) = deadline {
            let weak: Weak<Self> = Rc::downgrade(this);
            let task = this.scheduler.set_timeout(
                deadline,
                Box::new(move || {
                    if let Some(core) = weak.upgrade() {
                        core.finish_timed_out("deadline reached");
                    }
                }),
            );
            this.data.borrow_mut().deadline_task = Some(task);
        }
    }

    /// Spend one attempt and post; false once the budget is spent
    fn send_next(&self) -> bool {
        let (attempt, target) = {
            let mut data = self.data.borrow_mut();
            let Some(attempt) = data.budget.try_consume() else {
                return false;
            };
            (attempt, data.target())
        };

        match target {
            Some(target) => {
                debug!("handshake: READY_FOR_DATA #{} -> {}", attempt, target);
                self.channel.post_to_parent(&OutboundMessage::ReadyForData, &target);
            }
            None => {
                debug!("handshake: attempt #{} skipped, no parent origin known", attempt);
            }
        }
        true
    }

    fn on_retry_tick(&self) {
        let active = {
            let data = self.data.borrow();
            data.running && data.state.is_pending()
        };
        if !active {
            self.cancel_timers();
            return;
        }

        if !self.send_next() {
            self.finish_timed_out("retry budget exhausted");
        }
    }

    fn finish_timed_out(&self, reason: &str) {
        {
            let mut data = self.data.borrow_mut();
            if !data.state.is_pending() {
                return;
            }
            data.state = HandshakeState::TimedOut;
            info!(
                "handshake: timed out after {} attempt(s): {}",
                data.budget.sent(),
                reason
            );
        }
        self.cancel_timers();
        self.notify(&HandshakeState::TimedOut);
    }

    fn handle_message(&self, envelope: InboundEnvelope) {
        let payload = match InboundMessage::parse(&envelope.data) {
            Ok(InboundMessage::DedicationData(payload)) => payload,
            Err(rejection) => {
                debug!("handshake: ignoring message from {}: {}", envelope.origin, rejection);
                return;
            }
        };

        let (first, state) = {
            let mut data = self.data.borrow_mut();
            if !data.running {
                return;
            }
            if matches!(data.state, HandshakeState::TimedOut) {
                debug!("handshake: late payload from {} ignored", envelope.origin);
                return;
            }

            match (&data.options.trust, &data.trusted_origin) {
                (_, Some(trusted)) if *trusted != envelope.origin => {
                    warn!(
                        "handshake: payload from untrusted origin {} dropped (trusted: {})",
                        envelope.origin, trusted
                    );
                    return;
                }
                (TrustPolicy::Pinned(_), None) => {
                    warn!(
                        "handshake: payload from {} dropped, no origin is trusted",
                        envelope.origin
                    );
                    return;
                }
                _ => {}
            }

            let first = data.state.is_pending();
            data.trusted_origin = Some(envelope.origin.clone());
            data.state = HandshakeState::Received {
                payload,
                origin: envelope.origin,
            };
            (first, data.state.clone())
        };

        if first {
            info!("handshake: payload received");
            self.cancel_timers();
        } else {
            debug!("handshake: payload replaced");
        }
        self.notify(&state);
    }

    fn cancel_timers(&self) {
        let (retry, deadline) = {
            let mut data = self.data.borrow_mut();
            (data.retry_task.take(), data.deadline_task.take())
        };
        if let Some(task) = retry {
            self.scheduler.cancel(task);
        }
        if let Some(task) = deadline {
            self.scheduler.cancel(task);
        }
    }

    fn stop(&self) {
        let listener = {
            let mut data = self.data.borrow_mut();
            if data.running {
                debug!("handshake: stopping");
            }
            data.running = false;
            data.listener.take()
        };
        self.cancel_timers();
        if let Some(listener) = listener {
            self.channel.unlisten(listener);
        }
    }

    fn notify(&self, state: &HandshakeState) {
        let mut observers = std::mem::take(&mut *self.observers.borrow_mut());
        for observer in observers.iter_mut() {
            observer(state);
        }
        // Keep observers registered while notifying, after the existing ones
        let mut slot = self.observers.borrow_mut();
        observers.append(&mut slot);
        *slot = observers;
    }
}
