//! Wire format of the parent-frame handshake

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payload::DedicationPayload;

/// Type tag of the readiness signal
pub const READY_FOR_DATA: &str = "READY_FOR_DATA";

/// Type tag of the payload delivery
pub const DEDICATION_DATA: &str = "DEDICATION_DATA";

/// Message sent from the embedded page to its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    /// The page is listening and wants its payload
    #[serde(rename = "READY_FOR_DATA")]
    ReadyForData,
}

impl OutboundMessage {
    /// JSON value posted across the window boundary
    pub fn to_value(&self) -> Value {
        match self {
            OutboundMessage::ReadyForData => serde_json::json!({ "type": READY_FOR_DATA }),
        }
    }
}

/// Recognized message from the parent
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Payload delivery
    DedicationData(DedicationPayload),
}

/// Why an inbound message was ignored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageRejection {
    /// The data is not a JSON object
    NotAnObject,

    /// The object has no string `type` field
    MissingType,

    /// The `type` is not one this page understands
    UnknownType(String),

    /// The `type` is known but the payload has the wrong shape
    MalformedPayload(String),
}

impl std::fmt::Display for MessageRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRejection::NotAnObject => write!(f, "not an object"),
            MessageRejection::MissingType => write!(f, "missing type tag"),
            MessageRejection::UnknownType(t) => write!(f, "unknown type '{}'", t),
            MessageRejection::MalformedPayload(e) => write!(f, "malformed payload: {}", e),
        }
    }
}

impl InboundMessage {
    /// Classify raw message data
    ///
    /// A `DEDICATION_DATA` message without a `payload` (or with `null`) carries
    /// an empty payload; every field is optional.
    pub fn parse(data: &Value) -> Result<Self, MessageRejection> {
        let object = data.as_object().ok_or(MessageRejection::NotAnObject)?;
        let tag = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(MessageRejection::MissingType)?;

        match tag {
            DEDICATION_DATA => {
                let payload = match object.get("payload") {
                    None | Some(Value::Null) => DedicationPayload::default(),
                    Some(raw) => DedicationPayload::deserialize(raw)
                        .map_err(|e| MessageRejection::MalformedPayload(e.to_string()))?,
                };
                Ok(InboundMessage::DedicationData(payload))
            }
            other => Err(MessageRejection::UnknownType(other.to_string())),
        }
    }
}
