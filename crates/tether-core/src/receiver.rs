//! Protocol receivers and their registry.

use std::sync::Arc;

use dashmap::DashMap;

use crate::ids::EndpointId;

/// Handler for messages of one multiplexed protocol.
pub trait MessageReceiver: Send + Sync {
    /// Handle the `message` payload sent by `endpoint`.
    fn receive(&self, message: &str, endpoint: &EndpointId);
}

impl<F> MessageReceiver for F
where
    F: Fn(&str, &EndpointId) + Send + Sync,
{
    fn receive(&self, message: &str, endpoint: &EndpointId) {
        self(message, endpoint);
    }
}

/// Registry mapping protocol names to receivers.
///
/// Populated by application wiring. The validator reads its protocol set;
/// the dispatcher reads its receivers.
pub struct ReceiverRegistry {
    receivers: DashMap<String, Arc<dyn MessageReceiver>>,
}

impl ReceiverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            receivers: DashMap::new(),
        }
    }

    /// Register a receiver for a protocol, replacing any previous one.
    pub fn register(&self, protocol: &str, receiver: impl MessageReceiver + 'static) {
        let _ = self
            .receivers
            .insert(protocol.to_owned(), Arc::new(receiver));
    }

    /// Remove the receiver for a protocol.
    pub fn unregister(&self, protocol: &str) {
        let _ = self.receivers.remove(protocol);
    }

    /// Receiver registered for `protocol`.
    pub fn get(&self, protocol: &str) -> Option<Arc<dyn MessageReceiver>> {
        self.receivers.get(protocol).map(|r| r.value().clone())
    }

    /// Check whether a protocol is registered.
    pub fn contains(&self, protocol: &str) -> bool {
        self.receivers.contains_key(protocol)
    }

    /// List all registered protocol names (sorted).
    pub fn protocols(&self) -> Vec<String> {
        let mut names: Vec<String> = self.receivers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for ReceiverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
