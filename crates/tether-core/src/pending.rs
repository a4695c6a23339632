//! Per-endpoint store-and-forward queues.
//!
//! Payloads addressed to an endpoint without an open session are appended
//! here and delivered, in arrival order, the next time the endpoint's queue
//! is flushed against an open session. Queues live in memory only.

use dashmap::DashMap;
use metrics::counter;
use tracing::{debug, warn};

use crate::errors::SendError;
use crate::ids::EndpointId;
use crate::registry::SessionRegistry;
use crate::session::SessionRef;

/// Ordered, per-endpoint buffer of undelivered payloads.
///
/// Append and flush for one endpoint are mutually exclusive: the endpoint's
/// list stays locked for the whole flush. Different endpoints only contend
/// when they hash to the same shard.
pub struct PendingQueue<T> {
    pending: DashMap<EndpointId, Vec<T>>,
    kind: &'static str,
}

impl<T> PendingQueue<T> {
    /// Create an empty queue. `kind` labels log lines and metrics.
    pub fn new(kind: &'static str) -> Self {
        Self {
            pending: DashMap::new(),
            kind,
        }
    }

    /// Add `payload` to the tail of `endpoint`'s list.
    pub fn append(&self, endpoint: EndpointId, payload: T) {
        let mut list = self.pending.entry(endpoint).or_default();
        list.push(payload);
        debug!(endpoint = %list.key(), kind = self.kind, queued = list.len(), "queued payload");
        counter!("tether_messages_queued_total", "kind" => self.kind).increment(1);
    }

    /// Deliver everything queued for `endpoint` through `send`.
    ///
    /// No-op unless `registry` holds an open session for `endpoint`. With an
    /// open session, `send` is called once per payload in arrival order and
    /// the delivered payloads are removed. If `send` fails, that payload and
    /// all later ones stay queued in order.
    ///
    /// Returns the number of payloads delivered.
    pub fn flush<F>(&self, endpoint: &EndpointId, registry: &SessionRegistry, mut send: F) -> usize
    where
        F: FnMut(&SessionRef, &T) -> Result<(), SendError>,
    {
        let Some(session) = registry.get(endpoint) else {
            return 0;
        };
        if !session.is_open() {
            return 0;
        }
        let Some(mut list) = self.pending.get_mut(endpoint) else {
            return 0;
        };

        let mut delivered = 0;
        for payload in list.iter() {
            if let Err(error) = send(&session, payload) {
                warn!(%endpoint, kind = self.kind, %error, "flush interrupted, keeping remainder queued");
                break;
            }
            delivered += 1;
        }
        let _ = list.drain(..delivered);
        let drained = list.is_empty();
        drop(list);

        if drained {
            let _ = self.pending.remove_if(endpoint, |_, list| list.is_empty());
        }
        if delivered > 0 {
            debug!(%endpoint, kind = self.kind, delivered, "flushed pending payloads");
            counter!("tether_messages_flushed_total", "kind" => self.kind)
                .increment(delivered as u64);
        }
        delivered
    }

    /// Number of payloads queued for `endpoint`.
    pub fn pending_count(&self, endpoint: &EndpointId) -> usize {
        self.pending.get(endpoint).map_or(0, |list| list.len())
    }

    /// Whether anything is queued for `endpoint`.
    pub fn has_pending(&self, endpoint: &EndpointId) -> bool {
        self.pending_count(endpoint) > 0
    }

    /// Number of payloads queued across all endpoints.
    pub fn total_pending(&self) -> usize {
        self.pending.iter().map(|entry| entry.value().len()).sum()
    }

    /// Whether nothing is queued for any endpoint.
    pub fn is_empty(&self) -> bool {
        self.total_pending() == 0
    }
}
