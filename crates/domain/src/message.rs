//! Change records and the subscriber wire protocol.
//!
//! Every committed mutation yields one [`ChangeRecord`]; each record becomes
//! exactly one [`OutboundMessage`] of the form
//! `{"messageType": ..., "data": {<name>: <value-or-description>}}`.
//! Subscribers may also talk back with [`InboundMessage`]s.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::action::ActionDescription;
use crate::event::EventInstance;

/// A committed state change, ready to be fanned out.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeRecord {
    PropertyChanged { name: String, value: Value },
    ActionStatusChanged(ActionDescription),
    EventFired(EventInstance),
}

impl ChangeRecord {
    /// Name of the fired event, for event-subscription filtering.
    #[must_use]
    pub fn event_name(&self) -> Option<&str> {
        match self {
            Self::EventFired(event) => Some(&event.name),
            Self::PropertyChanged { .. } | Self::ActionStatusChanged(_) => None,
        }
    }

    #[must_use]
    pub fn to_message(&self) -> OutboundMessage {
        match self {
            Self::PropertyChanged { name, value } => {
                let mut data = Map::new();
                data.insert(name.clone(), value.clone());
                OutboundMessage::new(OutboundType::PropertyStatus, Value::Object(data))
            }
            Self::ActionStatusChanged(description) => {
                OutboundMessage::new(OutboundType::ActionStatus, description.keyed())
            }
            Self::EventFired(event) => OutboundMessage::new(OutboundType::Event, event.keyed()),
        }
    }
}

/// Kind of a message sent to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutboundType {
    PropertyStatus,
    ActionStatus,
    Event,
    Error,
}

/// A message sent to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub message_type: OutboundType,
    pub data: Value,
}

impl OutboundMessage {
    #[must_use]
    pub fn new(message_type: OutboundType, data: Value) -> Self {
        Self { message_type, data }
    }

    /// Reply to a malformed or rejected inbound request.
    #[must_use]
    pub fn bad_request(message: impl fmt::Display) -> Self {
        let mut data = Map::new();
        data.insert("status".to_string(), Value::from("400 Bad Request"));
        data.insert("message".to_string(), Value::from(message.to_string()));
        Self::new(OutboundType::Error, Value::Object(data))
    }

    /// Encode as UTF-8 JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; does not happen for values built from
    /// `serde_json::Value`.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Body of one entry of a `requestAction` message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    #[serde(default)]
    pub input: Value,
}

/// A request sent by a subscriber over its channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType", content = "data", rename_all = "camelCase")]
pub enum InboundMessage {
    /// `{name: value, ...}`
    SetProperty(Map<String, Value>),
    /// `{name: {"input": ...}, ...}`
    RequestAction(BTreeMap<String, ActionRequest>),
    /// `{name: {}, ...}`
    AddEventSubscription(Map<String, Value>),
}

impl InboundMessage {
    /// Parse an inbound request.
    ///
    /// # Errors
    ///
    /// Returns the parser error for malformed JSON, unknown message types or
    /// a `data` payload of the wrong shape.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
