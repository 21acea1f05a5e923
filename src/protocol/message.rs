//! Immutable message flowing through the router.

use serde::{Deserialize, Serialize};

use super::types::{Control, MessageId};

/// A request (outbound) or response/result (inbound).
///
/// Fields are private: once built a message is never mutated, only read or
/// consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message<P> {
    id: MessageId,
    payload: P,
    #[serde(default)]
    control: Control,
}

impl<P> Message<P> {
    /// Create an outbound request.
    pub fn request(id: impl Into<MessageId>, payload: P) -> Self {
        Self {
            id: id.into(),
            payload,
            control: Control::default(),
        }
    }

    /// Create a request with a generated id.
    pub fn new_request(payload: P) -> Self {
        Self::request(MessageId::generate(), payload)
    }

    /// Create an inbound response that takes part in correlation.
    pub fn response(id: impl Into<MessageId>, payload: P) -> Self {
        Self {
            id: id.into(),
            payload,
            control: Control::default(),
        }
    }

    /// Create an inbound message flagged for relay.
    pub fn relay(id: impl Into<MessageId>, payload: P) -> Self {
        Self {
            id: id.into(),
            payload,
            control: Control::relayed(),
        }
    }

    /// Build the response answering this request.
    pub fn reply<R>(&self, payload: R) -> Message<R> {
        Message::response(self.id.clone(), payload)
    }

    /// Build a relay event tied to this request's id.
    pub fn relay_event<R>(&self, payload: R) -> Message<R> {
        Message::relay(self.id.clone(), payload)
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn control(&self) -> Control {
        self.control
    }

    pub fn is_relay(&self) -> bool {
        self.control.relay
    }

    pub fn into_payload(self) -> P {
        self.payload
    }

    pub fn into_parts(self) -> (MessageId, P, Control) {
        (self.id, self.payload, self.control)
    }
}
