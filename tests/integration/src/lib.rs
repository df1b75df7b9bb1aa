//! Integration test utilities for the dedication page
//!
//! This module provides common utilities for integration testing including:
//! - A page fixture on a virtual clock with a simulated widget runtime
//! - Parent message builders
//! - An event recorder for player events

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use dedication::channel::{InboundEnvelope, LoopbackChannel};
use dedication::player::{
    BootstrapLoader, PlayerEnvironment, PlayerEvent, PlayerEventHandler, YOUTUBE_IFRAME_API,
};
use dedication::schedule::VirtualScheduler;
use dedication::sim::{SimSettings, SimulatedRuntime};
use dedication::{Config, DataSource, DedicationPage};
use serde_json::{json, Value};

/// Origin of the embedding parent in every fixture
pub const PARENT_ORIGIN: &str = "https://parent.example";

/// Referrer the embedded document reports
pub const PARENT_REFERRER: &str = "https://parent.example/gift/42";

/// Test fixture: one page's worth of simulated surroundings
pub struct TestFixture {
    pub clock: Rc<VirtualScheduler>,
    pub channel: Rc<LoopbackChannel>,
    pub runtime: Rc<SimulatedRuntime>,
}

impl TestFixture {
    /// Fixture with default simulation latencies
    pub fn new() -> Self {
        Self::with_settings(SimSettings::default())
    }

    pub fn with_settings(settings: SimSettings) -> Self {
        let clock = Rc::new(VirtualScheduler::new());
        let runtime = SimulatedRuntime::new(clock.clone(), settings);
        Self {
            channel: Rc::new(LoopbackChannel::new(Some(PARENT_REFERRER))),
            runtime,
            clock,
        }
    }

    /// Player services backed by this fixture, with a private loader
    pub fn env(&self) -> PlayerEnvironment {
        PlayerEnvironment {
            scheduler: self.clock.clone(),
            loader: BootstrapLoader::new(YOUTUBE_IFRAME_API),
            host: self.runtime.clone(),
            factory: self.runtime.clone(),
        }
    }

    /// Start a page that waits for its parent
    pub fn start_page(&self, config: Config) -> DedicationPage {
        DedicationPage::start(
            config,
            DataSource::Handshake(self.channel.clone()),
            self.env(),
        )
    }

    /// Deliver a DEDICATION_DATA message from the parent
    pub fn send_payload(&self, payload: Value) {
        self.send_from(PARENT_ORIGIN, payload);
    }

    /// Deliver a DEDICATION_DATA message from any origin
    pub fn send_from(&self, origin: &str, payload: Value) {
        self.channel.deliver(InboundEnvelope::new(origin, dedication_data(payload)));
    }

    /// Advance the virtual clock by `ms` milliseconds
    pub fn advance_ms(&self, ms: u64) {
        self.clock.advance(Duration::from_millis(ms));
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Full DEDICATION_DATA message around `payload`
pub fn dedication_data(payload: Value) -> Value {
    json!({ "type": "DEDICATION_DATA", "payload": payload })
}

/// A payload with every section filled in
pub fn sample_payload() -> Value {
    json!({
        "customText": {
            "title": "Dez anos de nós",
            "intro": "Aperte o play",
            "phrases": ["Cada dia contigo", "Ainda escolho você"],
        },
        "basic": {
            "coupleName": "Ana e Rui",
            "startTimestamp": "2015-10-16T20:00:00Z",
        },
        "photos": [
            { "previewUrl": "https://cdn.example/1.jpg", "caption": "Praia" },
        ],
        "music": {
            "title": "Nossa Música",
            "sourceUrl": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        },
    })
}

/// Records every player event it sees
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Rc<RefCell<Vec<PlayerEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler feeding this recorder
    pub fn handler(&self) -> Box<dyn PlayerEventHandler> {
        let events = Rc::clone(&self.events);
        Box::new(move |event: PlayerEvent| events.borrow_mut().push(event))
    }

    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events.borrow().clone()
    }

    /// Recorded positions, in order
    pub fn positions(&self) -> Vec<f64> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                PlayerEvent::PositionChanged { position } => Some(*position),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matcher: impl Fn(&PlayerEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| matcher(e)).count()
    }
}
