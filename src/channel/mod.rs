//! Cross-window messaging between the embedded page and its parent
//!
//! The handshake only needs four things from the host: the referrer, a way to
//! post to the parent, and a way to attach and detach a message listener.
//! [`WindowChannel`] captures exactly that.

mod loopback;
mod message;

pub use loopback::{LoopbackChannel, PostedMessage};
pub use message::{
    InboundMessage, MessageRejection, OutboundMessage, DEDICATION_DATA, READY_FOR_DATA,
};

use serde_json::Value;
use url::Url;

/// Target origin of an outbound post
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOrigin {
    /// "*": delivered whatever the parent's origin is
    Any,

    /// Delivered only if the parent has exactly this origin
    Exact(String),
}

impl TargetOrigin {
    /// String form expected by `postMessage`
    pub fn as_str(&self) -> &str {
        match self {
            TargetOrigin::Any => "*",
            TargetOrigin::Exact(origin) => origin,
        }
    }
}

impl std::fmt::Display for TargetOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialized origin (`scheme://host[:port]`) of a URL
///
/// Returns `None` for unparsable input and for opaque origins (`data:`,
/// `about:blank`, ...), which can never be matched by a sender.
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let origin = parsed.origin();
    if origin.is_tuple() {
        Some(origin.ascii_serialization())
    } else {
        None
    }
}

/// A message as delivered by the host, before any interpretation
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEnvelope {
    /// Origin of the sending window
    pub origin: String,

    /// Structured-clone data, as JSON
    pub data: Value,
}

impl InboundEnvelope {
    /// Create a new envelope
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }
}

/// Identifier of an attached message listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Host side of the cross-window channel
pub trait WindowChannel {
    /// Referrer of the current document, if any
    fn referrer(&self) -> Option<String>;

    /// Post a message to the parent window
    fn post_to_parent(&self, message: &OutboundMessage, target: &TargetOrigin);

    /// Attach a handler invoked for every inbound message, whatever its sender
    fn listen(&self, handler: Box<dyn FnMut(InboundEnvelope)>) -> ListenerId;

    /// Detach a handler; unknown ids are ignored
    fn unlisten(&self, id: ListenerId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_of() {
        assert_eq!(
            origin_of("https://parent.example/pages/embed?x=1"),
            Some("https://parent.example".to_string())
        );
        assert_eq!(
            origin_of("http://localhost:5173/"),
            Some("http://localhost:5173".to_string())
        );
        assert_eq!(
            origin_of("https://parent.example:443/"),
            Some("https://parent.example".to_string())
        );
        assert_eq!(origin_of(""), None);
        assert_eq!(origin_of("not a url"), None);
        assert_eq!(origin_of("data:text/plain,hi"), None);
    }

    #[test]
    fn test_target_origin_str() {
        assert_eq!(TargetOrigin::Any.as_str(), "*");
        assert_eq!(
            TargetOrigin::Exact("https://parent.example".to_string()).to_string(),
            "https://parent.example"
        );
    }
}
