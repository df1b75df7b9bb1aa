//! Parent-frame data handshake
//!
//! The embedded page does not know who embeds it. It keeps announcing
//! `READY_FOR_DATA` to its parent until a `DEDICATION_DATA` message from an
//! acceptable origin arrives or the retry budget runs out.
//!
//! State machine:
//!
//! ```text
//! Pending --accepted DEDICATION_DATA--> Received   (payload replaced on later messages)
//! Pending --budget/deadline spent----> TimedOut
//! ```

mod retry;
mod session;

pub use retry::RetryBudget;
pub use session::Handshake;

use std::time::Duration;

use crate::payload::DedicationPayload;
use crate::utils::config::{HandshakeConfig, TrustMode};

/// Where the handshake stands
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeState {
    /// Still waiting for the parent
    Pending,

    /// Payload delivered by `origin`
    Received {
        payload: DedicationPayload,
        origin: String,
    },

    /// The parent never answered
    TimedOut,
}

impl HandshakeState {
    /// Waiting for data
    pub fn is_pending(&self) -> bool {
        matches!(self, HandshakeState::Pending)
    }

    /// Received payload, if any
    pub fn payload(&self) -> Option<&DedicationPayload> {
        match self {
            HandshakeState::Received { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

/// Which senders may deliver the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Only one origin, known before any message arrives
    ///
    /// `None` pins the referrer's origin at `start()`.
    Pinned(Option<String>),

    /// The first well-formed payload pins its sender's origin
    FirstSender,
}

/// Handshake tuning
#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeOptions {
    pub trust: TrustPolicy,
    pub max_attempts: u32,
    pub retry_interval: Duration,
    pub deadline: Option<Duration>,
    pub allow_wildcard_target: bool,
}

impl Default for HandshakeOptions {
    fn default() -> Self {
        Self::from_config(&HandshakeConfig::default())
    }
}

impl HandshakeOptions {
    /// Build options from the `[handshake]` config section
    pub fn from_config(config: &HandshakeConfig) -> Self {
        let trust = match config.trust {
            TrustMode::Pinned => TrustPolicy::Pinned(config.trusted_origin.clone()),
            TrustMode::FirstSender => TrustPolicy::FirstSender,
        };

        Self {
            trust,
            max_attempts: config.max_attempts,
            retry_interval: Duration::from_millis(config.retry_interval_ms),
            deadline: config.deadline_ms.map(Duration::from_millis),
            allow_wildcard_target: config.allow_wildcard_target,
        }
    }

    /// Pin a specific origin
    pub fn pinned(origin: impl Into<String>) -> Self {
        Self {
            trust: TrustPolicy::Pinned(Some(origin.into())),
            ..Self::default()
        }
    }

    /// Trust whoever answers first
    pub fn first_sender() -> Self {
        Self {
            trust: TrustPolicy::FirstSender,
            ..Self::default()
        }
    }
}
