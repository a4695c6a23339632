//! Default wiring of the core components.

use std::sync::Arc;

use crate::dispatcher::TransmissionDispatcher;
use crate::endpoint::ConnectionEndpoint;
use crate::envelope::TransmissionValidator;
use crate::receiver::ReceiverRegistry;
use crate::registry::SessionRegistry;
use crate::transmitter::{MessageTransmitter, TextQueue, TransmissionQueue, TransmissionTransmitter};

/// One long-lived instance of every core component, sharing state.
///
/// The validator and the dispatcher both read `receivers`; build the parts
/// by hand to give them different registries.
#[derive(Clone)]
pub struct Hub {
    /// Protocol receivers, populated by the application.
    pub receivers: Arc<ReceiverRegistry>,
    /// Live sessions by endpoint.
    pub registry: Arc<SessionRegistry>,
    /// Transport callbacks.
    pub endpoint: Arc<ConnectionEndpoint>,
    /// Raw text delivery.
    pub messages: Arc<MessageTransmitter>,
    /// Validated envelope delivery.
    pub transmissions: Arc<TransmissionTransmitter>,
}

impl Hub {
    /// Wire a hub around `receivers`.
    pub fn new(receivers: Arc<ReceiverRegistry>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let text_queue = Arc::new(TextQueue::new("text"));
        let transmission_queue = Arc::new(TransmissionQueue::new("transmission"));
        let validator = Arc::new(TransmissionValidator::new(receivers.clone()));
        let dispatcher = Arc::new(TransmissionDispatcher::new(
            validator.clone(),
            receivers.clone(),
        ));

        Self {
            endpoint: Arc::new(ConnectionEndpoint::new(
                registry.clone(),
                text_queue.clone(),
                transmission_queue.clone(),
                dispatcher,
            )),
            messages: Arc::new(MessageTransmitter::new(registry.clone(), text_queue)),
            transmissions: Arc::new(TransmissionTransmitter::new(
                registry.clone(),
                transmission_queue,
                validator,
            )),
            receivers,
            registry,
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(Arc::new(ReceiverRegistry::new()))
    }
}
