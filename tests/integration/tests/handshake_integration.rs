//! Integration tests for the parent-frame handshake
//!
//! These tests verify the exchange end to end:
//! - Announcing readiness, resending and giving up
//! - Accepting and rejecting payloads by origin
//! - Talking to a parent running on its own thread

use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use dedication::channel::{InboundEnvelope, LoopbackChannel, OutboundMessage, TargetOrigin};
use dedication::handshake::{Handshake, HandshakeOptions, HandshakeState};
use dedication::schedule::VirtualScheduler;
use dedication::sim::parent::{ParentConfig, SimulatedParent};
use dedication_integration_tests::{
    dedication_data, sample_payload, PARENT_ORIGIN, PARENT_REFERRER,
};
use serde_json::json;
use tokio::time::sleep;

type Harness = (Rc<VirtualScheduler>, Rc<LoopbackChannel>, Handshake);

fn handshake_with(options: HandshakeOptions, referrer: Option<&str>) -> Harness {
    let clock = Rc::new(VirtualScheduler::new());
    let channel = Rc::new(LoopbackChannel::new(referrer));
    let handshake = Handshake::new(options, clock.clone(), channel.clone());
    (clock, channel, handshake)
}

/// Default options, embedded under the usual parent
fn default_handshake() -> Harness {
    handshake_with(HandshakeOptions::default(), Some(PARENT_REFERRER))
}

#[test]
fn test_ready_announced_immediately_and_resent() {
    let (clock, channel, handshake) = default_handshake();
    handshake.start();

    assert_eq!(channel.post_count(), 1);
    let first = &channel.posted()[0];
    assert_eq!(first.message, OutboundMessage::ReadyForData);
    assert_eq!(first.target, TargetOrigin::Exact(PARENT_ORIGIN.to_string()));

    clock.advance(Duration::from_millis(700 * 3));
    assert_eq!(channel.post_count(), 4);
    assert!(handshake.state().is_pending());
}

#[test]
fn test_gives_up_after_budget() {
    let (clock, channel, handshake) = default_handshake();
    handshake.start();

    clock.advance(Duration::from_millis(6_300));
    assert_eq!(channel.post_count(), 10);
    assert!(handshake.state().is_pending());

    clock.advance(Duration::from_millis(700));
    assert_eq!(handshake.state(), HandshakeState::TimedOut);
    assert_eq!(handshake.attempts_sent(), 10);
    assert_eq!(clock.pending(), 0);

    // Nothing more is sent, and late answers change nothing
    clock.advance(Duration::from_secs(10));
    channel.deliver(InboundEnvelope::new(PARENT_ORIGIN, dedication_data(sample_payload())));
    assert_eq!(channel.post_count(), 10);
    assert_eq!(handshake.state(), HandshakeState::TimedOut);
}

#[test]
fn test_payload_from_referrer_origin_is_accepted() {
    let (clock, channel, handshake) = default_handshake();
    handshake.start();
    clock.advance(Duration::from_millis(1_000));

    channel.deliver(InboundEnvelope::new(PARENT_ORIGIN, dedication_data(sample_payload())));

    let payload = handshake.payload().expect("payload should be stored");
    assert_eq!(
        payload.basic.and_then(|b| b.couple_name).as_deref(),
        Some("Ana e Rui")
    );
    assert_eq!(handshake.trusted_origin().as_deref(), Some(PARENT_ORIGIN));

    // Resends stop with the first payload
    let sent = channel.post_count();
    clock.advance(Duration::from_secs(10));
    assert_eq!(channel.post_count(), sent);
    assert_eq!(clock.pending(), 0);
}

#[test]
fn test_foreign_and_malformed_messages_are_ignored() {
    let (_clock, channel, handshake) = default_handshake();
    handshake.start();

    channel.deliver(InboundEnvelope::new(
        "https://evil.example",
        dedication_data(sample_payload()),
    ));
    channel.deliver(InboundEnvelope::new(PARENT_ORIGIN, json!("DEDICATION_DATA")));
    channel.deliver(InboundEnvelope::new(PARENT_ORIGIN, json!({"type": "SOMETHING_ELSE"})));
    channel.deliver(InboundEnvelope::new(
        PARENT_ORIGIN,
        json!({"type": "DEDICATION_DATA", "payload": {"photos": "not a list"}}),
    ));

    assert!(handshake.state().is_pending());
    assert_eq!(handshake.payload(), None);
}

#[test]
fn test_later_payload_replaces_earlier() {
    let (_clock, channel, handshake) = default_handshake();
    handshake.start();

    channel.deliver(InboundEnvelope::new(
        PARENT_ORIGIN,
        dedication_data(json!({"customText": {"title": "Primeiro"}})),
    ));
    channel.deliver(InboundEnvelope::new(
        PARENT_ORIGIN,
        dedication_data(json!({"customText": {"title": "Segundo"}})),
    ));

    let title = handshake
        .payload()
        .and_then(|p| p.custom_text)
        .and_then(|t| t.title);
    assert_eq!(title.as_deref(), Some("Segundo"));
}

#[test]
fn test_first_sender_pins_its_origin() {
    let (_clock, channel, handshake) = handshake_with(HandshakeOptions::first_sender(), None);
    handshake.start();

    // No referrer: the first announcement can only go to any origin
    assert_eq!(channel.posted()[0].target, TargetOrigin::Any);

    channel.deliver(InboundEnvelope::new(
        "https://first.example",
        dedication_data(json!({"customText": {"title": "Primeiro"}})),
    ));
    channel.deliver(InboundEnvelope::new(
        "https://second.example",
        dedication_data(json!({"customText": {"title": "Intruso"}})),
    ));

    assert_eq!(handshake.trusted_origin().as_deref(), Some("https://first.example"));
    let title = handshake
        .payload()
        .and_then(|p| p.custom_text)
        .and_then(|t| t.title);
    assert_eq!(title.as_deref(), Some("Primeiro"));
}

#[test]
fn test_stop_detaches_everything() {
    let (clock, channel, handshake) = default_handshake();
    handshake.start();
    assert_eq!(channel.listener_count(), 1);

    handshake.stop();
    handshake.stop();
    assert_eq!(channel.listener_count(), 0);
    assert_eq!(clock.pending(), 0);

    channel.deliver(InboundEnvelope::new(PARENT_ORIGIN, dedication_data(sample_payload())));
    assert!(handshake.state().is_pending());
}

#[tokio::test]
async fn test_threaded_parent_answers() -> Result<()> {
    let mut parent = SimulatedParent::spawn(ParentConfig {
        origin: PARENT_ORIGIN.to_string(),
        reply_after: Some(Duration::from_millis(20)),
        reply: dedication_data(sample_payload()),
    })?;

    let (clock, channel, handshake) = default_handshake();
    let poster = parent.poster();
    channel.on_post(Box::new(move |posted| {
        let _ = poster.send(posted.clone());
    }));
    handshake.start();

    // Pump replies into the page the way the runner does
    for _ in 0..100 {
        for envelope in parent.drain() {
            channel.deliver(envelope);
        }
        if !handshake.state().is_pending() {
            break;
        }
        sleep(Duration::from_millis(10)).await;
        clock.advance(Duration::from_millis(10));
    }

    assert!(matches!(handshake.state(), HandshakeState::Received { .. }));
    parent.shutdown();
    let stats = parent.stats();
    assert!(stats.replied);
    assert!(stats.ready_seen >= 1);
    assert_eq!(stats.misaddressed, 0);
    Ok(())
}
