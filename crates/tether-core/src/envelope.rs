//! Multiplexed transmission envelope and its validator.
//!
//! On the wire an envelope is a JSON object `{"protocol": "...", "message": "..."}`.
//! `protocol` names the logical channel; `message` is an opaque payload that
//! must itself be valid JSON text, owned by the protocol's receiver.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::ValidationError;
use crate::receiver::ReceiverRegistry;

/// One unit multiplexed over a physical connection.
///
/// Fields are private: once built, an envelope is never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transmission {
    #[serde(default, deserialize_with = "null_as_empty")]
    protocol: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    message: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Transmission {
    /// Build an envelope. Call [`TransmissionValidator::validate`] before routing it.
    pub fn new(protocol: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            message: message.into(),
        }
    }

    /// Logical channel name.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Opaque JSON payload.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Decode an envelope from wire text.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Encode this envelope to wire text.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Checks that an envelope is well-formed and routable.
pub struct TransmissionValidator {
    receivers: Arc<ReceiverRegistry>,
}

impl TransmissionValidator {
    /// Validate against the protocols registered in `receivers`.
    pub fn new(receivers: Arc<ReceiverRegistry>) -> Self {
        Self { receivers }
    }

    /// Validate `transmission`, reporting the first rule it breaks.
    ///
    /// Rules, in order: non-empty protocol, non-empty message, message is
    /// syntactically valid JSON, protocol has a registered receiver.
    pub fn validate(&self, transmission: &Transmission) -> Result<(), ValidationError> {
        if transmission.protocol.is_empty() {
            return Err(ValidationError::EmptyProtocol);
        }
        if transmission.message.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        if let Err(source) = serde_json::from_str::<serde::de::IgnoredAny>(&transmission.message) {
            return Err(ValidationError::MalformedMessage { source });
        }
        if !self.receivers.contains(&transmission.protocol) {
            return Err(ValidationError::UnknownProtocol {
                protocol: transmission.protocol.clone(),
            });
        }
        Ok(())
    }
}
