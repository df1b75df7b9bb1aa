//! Simulated embedding parent
//!
//! Runs on its own thread, sees every post the page makes and answers the
//! first acceptable READY_FOR_DATA with a DEDICATION_DATA message after a
//! fixed delay. The page side stays single-threaded: replies are collected
//! with [`SimulatedParent::drain`] and handed to the channel by the caller.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info};
use parking_lot::RwLock;
use serde_json::Value;

use crate::channel::{InboundEnvelope, OutboundMessage, PostedMessage, TargetOrigin};
use crate::utils::error::{DedicationError, Result};

/// How the simulated parent behaves
#[derive(Debug, Clone)]
pub struct ParentConfig {
    /// Origin the parent's messages carry
    pub origin: String,

    /// Delay after the first READY_FOR_DATA before replying; `None` never replies
    pub reply_after: Option<Duration>,

    /// Message object sent as the reply
    pub reply: Value,
}

/// What the parent has seen so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentStats {
    /// READY_FOR_DATA posts received
    pub ready_seen: u32,

    /// READY_FOR_DATA posts aimed at some other origin
    pub misaddressed: u32,

    /// Reply sent
    pub replied: bool,
}

/// Parent frame on a background thread
pub struct SimulatedParent {
    posts_tx: Sender<PostedMessage>,
    replies_rx: Receiver<InboundEnvelope>,
    stats: Arc<RwLock<ParentStats>>,
    worker: Option<thread::JoinHandle<()>>,
    shutdown_tx: Option<Sender<()>>,
}

impl SimulatedParent {
    /// Spawn the parent thread
    pub fn spawn(config: ParentConfig) -> Result<Self> {
        let (posts_tx, posts_rx) = unbounded();
        let (replies_tx, replies_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = bounded(1);
        let stats = Arc::new(RwLock::new(ParentStats::default()));

        let worker_stats = Arc::clone(&stats);
        let worker = thread::Builder::new()
            .name("parent-frame".to_string())
            .spawn(move || parent_thread(config, posts_rx, replies_tx, shutdown_rx, worker_stats))
            .map_err(|e| {
                DedicationError::Channel(format!("Failed to start parent thread: {}", e))
            })?;

        Ok(Self {
            posts_tx,
            replies_rx,
            stats,
            worker: Some(worker),
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Sender the page's channel forwards its posts to
    pub fn poster(&self) -> Sender<PostedMessage> {
        self.posts_tx.clone()
    }

    /// Replies ready to be delivered, oldest first
    pub fn drain(&self) -> Vec<InboundEnvelope> {
        self.replies_rx.try_iter().collect()
    }

    pub fn stats(&self) -> ParentStats {
        self.stats.read().clone()
    }

    /// Stop the thread and wait for it
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SimulatedParent {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn parent_thread(
    config: ParentConfig,
    posts_rx: Receiver<PostedMessage>,
    replies_tx: Sender<InboundEnvelope>,
    shutdown_rx: Receiver<()>,
    stats: Arc<RwLock<ParentStats>>,
) {
    let tick = Duration::from_millis(10);
    let mut first_ready: Option<Instant> = None;

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match posts_rx.recv_timeout(tick) {
            Ok(post) => {
                if post.message != OutboundMessage::ReadyForData {
                    continue;
                }
                let addressed = match &post.target {
                    TargetOrigin::Any => true,
                    TargetOrigin::Exact(origin) => *origin == config.origin,
                };

                let mut stats = stats.write();
                stats.ready_seen += 1;
                if addressed {
                    first_ready.get_or_insert_with(Instant::now);
                    debug!("parent: READY_FOR_DATA #{}", stats.ready_seen);
                } else {
                    stats.misaddressed += 1;
                    debug!("parent: READY_FOR_DATA aimed at {}, not us", post.target);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let Some(delay) = config.reply_after else {
            continue;
        };
        let due = first_ready.map(|at| at.elapsed() >= delay).unwrap_or(false);
        if due && !stats.read().replied {
            info!("parent: sending DEDICATION_DATA from {}", config.origin);
            let envelope = InboundEnvelope::new(config.origin.clone(), config.reply.clone());
            if replies_tx.send(envelope).is_err() {
                break;
            }
            stats.write().replied = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ready(target: TargetOrigin) -> PostedMessage {
        PostedMessage {
            message: OutboundMessage::ReadyForData,
            target,
        }
    }

    fn wait_for_reply(parent: &SimulatedParent) -> Vec<InboundEnvelope> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let replies = parent.drain();
            if !replies.is_empty() || Instant::now() > deadline {
                return replies;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_replies_once_to_addressed_ready() {
        let mut parent = SimulatedParent::spawn(ParentConfig {
            origin: "https://parent.example".to_string(),
            reply_after: Some(Duration::ZERO),
            reply: json!({"type": "DEDICATION_DATA", "payload": {}}),
        })
        .unwrap();

        let poster = parent.poster();
        poster.send(ready(TargetOrigin::Exact("https://other.example".into()))).unwrap();
        poster.send(ready(TargetOrigin::Any)).unwrap();

        let replies = wait_for_reply(&parent);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].origin, "https://parent.example");

        poster.send(ready(TargetOrigin::Any)).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(parent.drain().is_empty());

        parent.shutdown();
        let stats = parent.stats();
        assert_eq!(stats.ready_seen, 3);
        assert_eq!(stats.misaddressed, 1);
        assert!(stats.replied);
    }

    #[test]
    fn test_silent_parent_never_replies() {
        let parent = SimulatedParent::spawn(ParentConfig {
            origin: "https://parent.example".to_string(),
            reply_after: None,
            reply: Value::Null,
        })
        .unwrap();

        parent.poster().send(ready(TargetOrigin::Any)).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(parent.drain().is_empty());
    }
}
