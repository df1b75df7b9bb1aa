//! Integration tests for the background player
//!
//! These tests verify the complete player functionality including:
//! - Bootstrap, ready and polling on the simulated widget
//! - Optimistic seeks and volume/mute handling
//! - Exact widget calls, checked with a mocked backend
//! - Resource cleanup through the page

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use dedication::player::{
    BootstrapLoader, PlayerAdapter, PlayerBackend, PlayerConfig, PlayerEnvironment, PlayerEvent,
    PlayerFactory, PlayerState, WidgetEvents, WidgetOptions, WidgetState, YOUTUBE_IFRAME_API,
};
use dedication::schedule::VirtualScheduler;
use dedication::sim::{SimSettings, SimulatedRuntime};
use dedication::{Config, PagePhase};
use dedication_integration_tests::{sample_payload, EventRecorder, TestFixture};
use mockall::mock;
use mockall::predicate::*;
use serde_json::json;

mock! {
    pub Backend {}

    impl PlayerBackend for Backend {
        fn play_video(&self);
        fn pause_video(&self);
        fn seek_to(&self, seconds: f64, allow_seek_ahead: bool);
        fn set_volume(&self, volume: u8);
        fn mute(&self);
        fn un_mute(&self);
        fn current_time(&self) -> Option<f64>;
        fn duration(&self) -> Option<f64>;
        fn volume(&self) -> Option<u8>;
        fn is_muted(&self) -> Option<bool>;
        fn allow_autoplay(&self, permissions: &str);
        fn destroy(&self) -> dedication::Result<()>;
    }
}

/// Hands out one prepared mock and keeps the widget callbacks
#[derive(Default)]
struct MockFactory {
    backend: RefCell<Option<MockBackend>>,
    events: RefCell<Option<WidgetEvents>>,
    created: RefCell<Vec<WidgetOptions>>,
}

impl MockFactory {
    fn with(backend: MockBackend) -> Rc<Self> {
        Rc::new(Self {
            backend: RefCell::new(Some(backend)),
            ..Self::default()
        })
    }

    fn fire_ready(&self, target: &MockBackend) {
        let target: &dyn PlayerBackend = target;
        let mut events = self.events.borrow_mut();
        let events = events.as_mut().expect("widget should have been created");
        (events.on_ready)(target);
    }

    fn fire_state(&self, state: WidgetState) {
        let mut events = self.events.borrow_mut();
        let events = events.as_mut().expect("widget should have been created");
        (events.on_state_change)(state);
    }
}

impl PlayerFactory for MockFactory {
    fn create(
        &self,
        _element_id: &str,
        options: &WidgetOptions,
        events: WidgetEvents,
    ) -> dedication::Result<Box<dyn PlayerBackend>> {
        self.created.borrow_mut().push(options.clone());
        *self.events.borrow_mut() = Some(events);
        let backend = self
            .backend
            .borrow_mut()
            .take()
            .expect("only one widget per test");
        Ok(Box::new(backend))
    }
}

/// Widget as seen by the ready callback
fn ready_target(duration: f64, volume: u8) -> MockBackend {
    let mut target = MockBackend::new();
    target.expect_duration().return_const(Some(duration));
    target.expect_volume().return_const(Some(volume));
    target.expect_is_muted().return_const(Some(false));
    target
        .expect_allow_autoplay()
        .with(eq("autoplay; encrypted-media"))
        .times(1)
        .return_const(());
    target
}

fn mount_mocked(backend: MockBackend) -> (Rc<VirtualScheduler>, Rc<MockFactory>, PlayerAdapter) {
    let clock = Rc::new(VirtualScheduler::new());
    // Preloaded runtime: the widget is constructed synchronously on mount
    let host = SimulatedRuntime::new(
        clock.clone(),
        SimSettings {
            preloaded: true,
            ..SimSettings::default()
        },
    );
    let factory = MockFactory::with(backend);
    let env = PlayerEnvironment {
        scheduler: clock.clone(),
        loader: BootstrapLoader::new(YOUTUBE_IFRAME_API),
        host,
        factory: factory.clone(),
    };
    let adapter = PlayerAdapter::mount("L0_nXyTMyqM", 4, PlayerConfig::default(), env);
    (clock, factory, adapter)
}

#[test]
fn test_page_player_scenario() {
    let fx = TestFixture::new();
    let page = fx.start_page(Config::default());
    let recorder = EventRecorder::new();
    let handler_source = recorder.clone();
    page.on_player_event(move || handler_source.handler());

    fx.send_payload(sample_payload());
    assert_eq!(page.phase(), PagePhase::Showing);
    assert_eq!(page.snapshot().map(|s| s.state), Some(PlayerState::Loading));

    // Script at 100 ms, widget ready 200 ms later
    fx.advance_ms(300);
    let snapshot = page.snapshot().expect("player mounted");
    assert_eq!(snapshot.state, PlayerState::Ready);
    assert_eq!(snapshot.duration, 240.0);
    assert_eq!(fx.runtime.injected_scripts(), vec![YOUTUBE_IFRAME_API.to_string()]);

    let widget = fx.runtime.latest_widget().expect("widget constructed");
    assert_eq!(widget.video_id(), "dQw4w9WgXcQ");
    assert_eq!(widget.permissions().as_deref(), Some("autoplay; encrypted-media"));

    // The seek shows at once, before the widget has been asked again
    fx.advance_ms(700);
    page.seek(60.0);
    assert_eq!(page.snapshot().map(|s| s.position), Some(60.0));

    // The next poll (t = 1.3 s) reports what the widget says
    fx.advance_ms(500);
    assert_eq!(page.snapshot().map(|s| s.position), Some(widget.position()));
    assert_eq!(recorder.positions().first(), Some(&60.0));

    page.toggle_play_pause();
    fx.advance_ms(50);
    assert!(widget.is_playing());
    assert_eq!(page.snapshot().map(|s| s.state), Some(PlayerState::Playing));

    fx.advance_ms(2_000);
    let position = page.snapshot().map(|s| s.position).unwrap_or_default();
    assert!(position > 60.0, "position should advance while playing, got {}", position);

    assert_eq!(recorder.count(|e| matches!(e, PlayerEvent::Ready { .. })), 1);
    assert_eq!(recorder.count(|e| *e == PlayerEvent::PlaybackStarted), 1);
}

#[test]
fn test_short_link_payload_scenario() {
    let fx = TestFixture::new();
    let page = fx.start_page(Config::default());
    let recorder = EventRecorder::new();
    let handler_source = recorder.clone();
    page.on_player_event(move || handler_source.handler());

    fx.send_payload(json!({"music": {"sourceUrl": "https://youtu.be/L0_nXyTMyqM"}}));
    fx.advance_ms(300);

    let snapshot = page.snapshot().expect("player mounted");
    assert_eq!(snapshot.state, PlayerState::Ready);
    assert_eq!(snapshot.duration, 240.0);
    assert_eq!(recorder.count(|e| *e == PlayerEvent::Ready { duration: 240.0 }), 1);

    let widget = fx.runtime.latest_widget().expect("widget constructed");
    assert_eq!(widget.video_id(), "L0_nXyTMyqM");
    assert_eq!(widget.start_seconds(), 0);

    // t = 1 s
    fx.advance_ms(700);
    page.seek(60.0);
    assert_eq!(page.snapshot().map(|s| s.position), Some(60.0));

    // t = 1.5 s, past the 1.3 s poll
    fx.advance_ms(500);
    assert_eq!(page.snapshot().map(|s| s.position), Some(widget.position()));
    assert_eq!(widget.position(), 60.0);
}

#[test]
fn test_teardown_leaves_no_timers() {
    let fx = TestFixture::new();
    let page = fx.start_page(Config::default());
    fx.send_payload(sample_payload());
    fx.advance_ms(300);
    page.toggle_play_pause();

    fx.advance_ms(10_000);
    assert!(fx.clock.pending() > 0);

    page.teardown();
    assert_eq!(page.phase(), PagePhase::Closed);
    assert_eq!(fx.clock.pending(), 0);
    assert_eq!(fx.channel.listener_count(), 0);
    assert!(page.snapshot().is_none());
    assert!(fx.runtime.widgets().iter().all(|w| w.is_destroyed()));
}

#[test]
fn test_volume_zero_then_unmute_restores_last_level() {
    let fx = TestFixture::new();
    let page = fx.start_page(Config::default());
    fx.send_payload(json!({}));
    fx.advance_ms(300);

    page.set_volume(0.4);
    page.set_volume(0.0);
    let snapshot = page.snapshot().expect("player mounted");
    assert!(snapshot.muted);
    assert_eq!(snapshot.volume, 0.0);

    page.toggle_mute();
    let snapshot = page.snapshot().expect("player mounted");
    assert!(!snapshot.muted);
    assert_eq!(snapshot.volume, 0.4);

    let widget = fx.runtime.latest_widget().expect("widget constructed");
    assert_eq!(widget.volume_percent(), 40);
    assert!(!widget.muted());
}

#[test]
fn test_mocked_widget_receives_exact_calls() {
    let mut backend = MockBackend::new();
    backend.expect_play_video().times(1).return_const(());
    backend
        .expect_seek_to()
        .with(eq(180.0), eq(true))
        .times(1)
        .return_const(());
    backend.expect_set_volume().with(eq(25u8)).times(1).return_const(());
    backend.expect_un_mute().times(1).return_const(());
    backend.expect_destroy().times(1).returning(|| Ok(()));

    let (_clock, factory, adapter) = mount_mocked(backend);
    assert_eq!(adapter.state(), PlayerState::Loading);
    assert_eq!(factory.created.borrow()[0].start_seconds, 4);

    // Nothing reaches the widget before it is ready
    adapter.toggle_play_pause();
    adapter.seek(10.0);

    factory.fire_ready(&ready_target(180.0, 100));
    assert!(adapter.is_ready());

    adapter.toggle_play_pause();
    adapter.seek(500.0);
    adapter.set_volume(0.25);
    adapter.unmount();
    adapter.unmount();
}

#[test]
fn test_mocked_widget_state_drives_adapter() {
    let mut backend = MockBackend::new();
    backend.expect_pause_video().times(1).return_const(());
    backend.expect_destroy().times(1).returning(|| Ok(()));

    let (_clock, factory, adapter) = mount_mocked(backend);
    factory.fire_ready(&ready_target(200.0, 80));
    assert_eq!(adapter.snapshot().volume, 0.8);

    factory.fire_state(WidgetState::Playing);
    assert_eq!(adapter.state(), PlayerState::Playing);

    // Playing: the toggle pauses
    adapter.toggle_play_pause();
    factory.fire_state(WidgetState::Ended);
    assert_eq!(adapter.state(), PlayerState::Paused);
}

#[test]
fn test_mocked_poll_reads_position() {
    let mut backend = MockBackend::new();
    backend.expect_current_time().return_const(Some(12.5));
    backend.expect_duration().return_const(Some(200.0));
    backend.expect_destroy().times(1).returning(|| Ok(()));

    let (clock, factory, adapter) = mount_mocked(backend);
    let recorder = EventRecorder::new();
    adapter.subscribe(recorder.handler());
    factory.fire_ready(&ready_target(200.0, 100));

    clock.advance(Duration::from_millis(1_500));
    assert_eq!(adapter.snapshot().position, 12.5);
    // Three polls, one change
    assert_eq!(recorder.positions(), vec![12.5]);
}
