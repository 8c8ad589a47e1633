//! Relay frame codec.
//!
//! The bridge relay speaks exactly one JSON shape in both directions:
//!
//! ```text
//! {"topic":"<topic>","type":"pub|sub|ack","payload":"...","timestamp":null}
//! ```
//!
//! Historically the envelope is serialized to a JSON *string* first and
//! embedded as the payload field, so the payload of a `pub` frame is JSON
//! inside JSON. Some relay versions deliver the envelope as a bare object
//! instead; inbound parsing tolerates both shapes. `sub` frames carry an
//! empty-string payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::Envelope;
use crate::error::{BridgeError, BridgeResult};

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// Relay frame type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// Publish a payload to every subscriber of the topic.
    Pub,
    /// Subscribe the connection to a topic.
    Sub,
    /// Relay acknowledgement that a published message was delivered.
    Ack,
}

/// One relay frame. Field order matches the historical wire layout and the
/// `timestamp` field is serialized as an explicit `null` when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayFrame {
    pub topic: String,
    #[serde(rename = "type")]
    pub kind: FrameKind,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

impl RelayFrame {
    /// Builds a subscription frame for a topic.
    pub fn subscribe(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            kind: FrameKind::Sub,
            payload: Value::String(String::new()),
            timestamp: None,
        }
    }

    /// Builds a publish frame embedding the envelope as a JSON string.
    pub fn publish(topic: impl Into<String>, envelope: &Envelope) -> Self {
        let embedded =
            serde_json::to_string(envelope).expect("envelope serialization is infallible");
        Self {
            topic: topic.into(),
            kind: FrameKind::Pub,
            payload: Value::String(embedded),
            timestamp: None,
        }
    }

    /// Parses a frame from inbound text.
    pub fn from_json(text: &str) -> BridgeResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serializes the frame for the wire.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("frame serialization is infallible")
    }

    /// Extracts the envelope from the payload, tolerating both the
    /// string-embedded and the bare-object shape. `Ok(None)` when the
    /// payload is empty (subscription frames).
    pub fn envelope(&self) -> BridgeResult<Option<Envelope>> {
        match &self.payload {
            Value::Null => Ok(None),
            Value::String(text) if text.is_empty() => Ok(None),
            Value::String(text) => Ok(Some(serde_json::from_str(text)?)),
            Value::Object(_) => Ok(Some(serde_json::from_value(self.payload.clone())?)),
            other => Err(BridgeError::BadJsonRpcRequest(format!(
                "frame payload must be a string or object, got {other}"
            ))),
        }
    }

    /// Raw payload text, for surfacing acks to the application.
    pub fn payload_text(&self) -> String {
        match &self.payload {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ack
// ---------------------------------------------------------------------------

/// Relay-level delivery acknowledgement surfaced through `on_ack`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckMessage {
    pub topic: String,
    pub payload: String,
    pub timestamp: Option<u64>,
}

impl From<&RelayFrame> for AckMessage {
    fn from(frame: &RelayFrame) -> Self {
        Self {
            topic: frame.topic.clone(),
            payload: frame.payload_text(),
            timestamp: frame.timestamp,
        }
    }
}
