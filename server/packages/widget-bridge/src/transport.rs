use std::fmt;

use serde_json::Value;
use thiserror::Error;
use widget_bridge_protocol::JsonRpcMessage;

/// `postMessage` target origin that does not restrict the receiver.
pub const ANY_ORIGIN: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame-{}", self.0)
    }
}

/// Which window a message event came from, relative to the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    Parent,
    Frame(FrameId),
    Unknown,
}

/// A delivered `message` event.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub origin: String,
    pub source: MessageSource,
    pub data: Value,
}

impl MessageEvent {
    pub fn new(origin: impl Into<String>, source: MessageSource, data: Value) -> Self {
        Self {
            origin: origin.into(),
            source,
            data,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("target window is closed")]
    Closed,
    #[error("failed to deliver message: {0}")]
    Delivery(String),
}

/// A window that can be posted to.
pub trait MessageTarget: Send + Sync + 'static {
    fn post_message(&self, message: &Value, target_origin: &str) -> Result<(), TransportError>;
}

/// Posts a message and logs delivery failures. Undelivered requests are left
/// to the caller's timeout.
pub(crate) fn post_logged(target: &dyn MessageTarget, message: &JsonRpcMessage, target_origin: &str) {
    let value = message.to_value();
    if let Err(err) = target.post_message(&value, target_origin) {
        tracing::warn!(
            method = message.method.as_deref().unwrap_or("<response>"),
            id = ?message.id,
            target_origin = target_origin,
            error = %err,
            "post_message failed"
        );
    }
}
