//! Connection lifecycle adapter invoked by the transport.
//!
//! Per endpoint the state is either *absent* (no registry entry) or *open*.
//! A registered session that silently stopped being open is only noticed
//! the next time a flush or send is attempted against it.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info, instrument, warn};

use crate::dispatcher::TransmissionDispatcher;
use crate::errors::Result;
use crate::ids::EndpointId;
use crate::registry::SessionRegistry;
use crate::session::SessionRef;
use crate::transmitter::{TextQueue, TransmissionQueue, send_transmission};

/// Orchestrates registry, pending queues and dispatcher on transport events.
pub struct ConnectionEndpoint {
    registry: Arc<SessionRegistry>,
    text_queue: Arc<TextQueue>,
    transmission_queue: Arc<TransmissionQueue>,
    dispatcher: Arc<TransmissionDispatcher>,
}

impl ConnectionEndpoint {
    /// Create an endpoint over shared core components.
    pub fn new(
        registry: Arc<SessionRegistry>,
        text_queue: Arc<TextQueue>,
        transmission_queue: Arc<TransmissionQueue>,
        dispatcher: Arc<TransmissionDispatcher>,
    ) -> Self {
        Self {
            registry,
            text_queue,
            transmission_queue,
            dispatcher,
        }
    }

    /// A connection for `endpoint` opened (or reopened).
    ///
    /// Registers the session, then delivers everything queued while the
    /// endpoint was away.
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub fn on_open(&self, session: SessionRef, endpoint: EndpointId) {
        session.disable_idle_timeout();
        self.registry.add(endpoint.clone(), session);
        info!("endpoint connected");
        let delivered = self.resend(&endpoint);
        if delivered > 0 {
            info!(delivered, "delivered queued messages on connect");
        }
    }

    /// Inbound text from `endpoint`.
    pub fn on_message(&self, raw: &str, endpoint: &EndpointId) -> Result<()> {
        let result = self.dispatcher.dispatch(raw, endpoint);
        if let Err(ref error) = result {
            counter!("tether_dispatch_errors_total", "code" => error.code()).increment(1);
        }
        result
    }

    /// The connection for `endpoint` closed. Queued messages are kept.
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub fn on_close(&self, reason: &str, endpoint: &EndpointId) {
        self.registry.remove(endpoint);
        info!(reason, "endpoint disconnected");
    }

    /// Like [`on_close`](Self::on_close), but leaves a newer session for the
    /// same endpoint registered.
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub fn on_session_close(&self, session: &SessionRef, reason: &str, endpoint: &EndpointId) {
        if self.registry.remove_if_same(endpoint, session) {
            info!(reason, "endpoint disconnected");
        } else {
            debug!(reason, "superseded connection closed");
        }
    }

    /// Transport-level error on `endpoint`'s connection. No state change.
    pub fn on_error(&self, error: &dyn std::error::Error, endpoint: &EndpointId) {
        warn!(%endpoint, %error, "connection error");
    }

    /// Flush both pending queues for `endpoint`.
    ///
    /// Returns the number of payloads delivered.
    pub fn resend(&self, endpoint: &EndpointId) -> usize {
        let text = self
            .text_queue
            .flush(endpoint, &self.registry, |session, text| session.send(text));
        let typed = self
            .transmission_queue
            .flush(endpoint, &self.registry, send_transmission);
        text + typed
    }

    /// Session registry this endpoint maintains.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Whether either queue still holds payloads for `endpoint`.
    pub fn has_pending(&self, endpoint: &EndpointId) -> bool {
        self.text_queue.has_pending(endpoint) || self.transmission_queue.has_pending(endpoint)
    }

    /// Total payloads waiting across both queues.
    pub fn pending_messages(&self) -> usize {
        self.text_queue.total_pending() + self.transmission_queue.total_pending()
    }
}
