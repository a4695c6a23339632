//! Outbound delivery: direct send when the endpoint is online, queue otherwise.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::envelope::{Transmission, TransmissionValidator};
use crate::errors::{SendError, ValidationError};
use crate::ids::EndpointId;
use crate::pending::PendingQueue;
use crate::registry::SessionRegistry;
use crate::session::SessionRef;

/// Raw text store-and-forward queue.
pub type TextQueue = PendingQueue<String>;

/// Typed envelope store-and-forward queue.
pub type TransmissionQueue = PendingQueue<Transmission>;

/// Outcome of a unicast transmit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the endpoint's open session.
    Sent,
    /// Stored until the endpoint's next flush.
    Queued,
}

/// Send one encoded envelope through a session.
pub(crate) fn send_transmission(
    session: &SessionRef,
    transmission: &Transmission,
) -> Result<(), SendError> {
    match transmission.encode() {
        Ok(json) => session.send(&json),
        Err(error) => {
            // Two plain strings always encode; treat the impossible case as a refusal.
            warn!(%error, "failed to encode transmission");
            Err(SendError::Closed)
        }
    }
}

fn open_session(registry: &SessionRegistry, endpoint: &EndpointId) -> Option<SessionRef> {
    registry.get(endpoint).filter(|session| session.is_open())
}

/// Queue `payload`, then flush `endpoint`'s queue.
///
/// The flush runs whether or not a session was seen earlier: a session
/// registered between that check and the append would otherwise find an
/// empty queue on open and leave `payload` behind.
fn enqueue_and_flush<T, F>(
    registry: &SessionRegistry,
    pending: &PendingQueue<T>,
    endpoint: &EndpointId,
    payload: T,
    send: F,
) -> Delivery
where
    F: FnMut(&SessionRef, &T) -> Result<(), SendError>,
{
    pending.append(endpoint.clone(), payload);
    let _ = pending.flush(endpoint, registry, send);
    if pending.has_pending(endpoint) {
        Delivery::Queued
    } else {
        Delivery::Sent
    }
}

/// Send `payload` to every session open in a snapshot of the registry.
///
/// Returns how many sessions accepted it.
fn broadcast_to_open(registry: &SessionRegistry, payload: &str) -> usize {
    let sessions = registry.all_sessions();
    let mut recipients = 0;
    for session in sessions.iter().filter(|s| s.is_open()) {
        match session.send(payload) {
            Ok(()) => recipients += 1,
            Err(error) => warn!(%error, "failed to deliver broadcast to session"),
        }
    }
    debug!(snapshot = sessions.len(), recipients, "broadcast delivered");
    recipients
}

/// Transmitter for raw, unvalidated text.
pub struct MessageTransmitter {
    registry: Arc<SessionRegistry>,
    pending: Arc<TextQueue>,
}

impl MessageTransmitter {
    /// Create a transmitter over the shared registry and raw queue.
    pub fn new(registry: Arc<SessionRegistry>, pending: Arc<TextQueue>) -> Self {
        Self { registry, pending }
    }

    /// Send `text` to `endpoint` now if it is online, otherwise queue it.
    ///
    /// If earlier payloads are still queued for an online endpoint, `text`
    /// joins the queue and the queue is flushed so arrival order holds.
    pub fn transmit(&self, endpoint: &EndpointId, text: &str) -> Delivery {
        if let Some(session) = open_session(&self.registry, endpoint) {
            if !self.pending.has_pending(endpoint) && session.send(text).is_ok() {
                return Delivery::Sent;
            }
        }
        enqueue_and_flush(
            &self.registry,
            &self.pending,
            endpoint,
            text.to_owned(),
            |session, text| session.send(text),
        )
    }

    /// Send `text` to every currently open session. Never queues.
    pub fn broadcast(&self, text: &str) -> usize {
        broadcast_to_open(&self.registry, text)
    }
}

/// Transmitter for validated protocol envelopes.
pub struct TransmissionTransmitter {
    registry: Arc<SessionRegistry>,
    pending: Arc<TransmissionQueue>,
    validator: Arc<TransmissionValidator>,
}

impl TransmissionTransmitter {
    /// Create a transmitter over the shared registry, typed queue and validator.
    pub fn new(
        registry: Arc<SessionRegistry>,
        pending: Arc<TransmissionQueue>,
        validator: Arc<TransmissionValidator>,
    ) -> Self {
        Self {
            registry,
            pending,
            validator,
        }
    }

    /// Validate and deliver `message` on `protocol` to `endpoint`.
    ///
    /// Nothing is sent or queued when validation fails.
    pub fn transmit(
        &self,
        protocol: &str,
        message: &str,
        endpoint: &EndpointId,
    ) -> Result<Delivery, ValidationError> {
        let transmission = Transmission::new(protocol, message);
        self.validator.validate(&transmission)?;

        if let Some(session) = open_session(&self.registry, endpoint) {
            if !self.pending.has_pending(endpoint)
                && send_transmission(&session, &transmission).is_ok()
            {
                return Ok(Delivery::Sent);
            }
        }
        Ok(enqueue_and_flush(
            &self.registry,
            &self.pending,
            endpoint,
            transmission,
            send_transmission,
        ))
    }

    /// Validate once and send to every currently open session. Never queues.
    pub fn broadcast(&self, protocol: &str, message: &str) -> Result<usize, ValidationError> {
        let transmission = Transmission::new(protocol, message);
        self.validator.validate(&transmission)?;
        match transmission.encode() {
            Ok(json) => Ok(broadcast_to_open(&self.registry, &json)),
            Err(error) => {
                warn!(%error, protocol, "failed to encode broadcast transmission");
                Ok(0)
            }
        }
    }
}
