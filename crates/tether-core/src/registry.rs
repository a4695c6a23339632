//! Endpoint → live session registry.

use dashmap::DashMap;
use tracing::debug;

use crate::ids::EndpointId;
use crate::session::{SessionRef, same_session};

/// Tracks the session currently associated with each endpoint.
///
/// At most one session is held per endpoint; adding a session for an
/// endpoint that already has one replaces it (a reconnect).
pub struct SessionRegistry {
    sessions: DashMap<EndpointId, SessionRef>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Associate `session` with `endpoint`, replacing any previous session.
    pub fn add(&self, endpoint: EndpointId, session: SessionRef) {
        if self.sessions.insert(endpoint.clone(), session).is_some() {
            debug!(%endpoint, "replaced existing session");
        }
    }

    /// Drop the association for `endpoint`, if any.
    pub fn remove(&self, endpoint: &EndpointId) {
        let _ = self.sessions.remove(endpoint);
    }

    /// Drop the association only while it still points at `session`.
    ///
    /// Returns `true` if the entry was removed. A connection that has
    /// already been superseded by a reconnect leaves the newer entry alone.
    pub fn remove_if_same(&self, endpoint: &EndpointId, session: &SessionRef) -> bool {
        self.sessions
            .remove_if(endpoint, |_, current| same_session(current, session))
            .is_some()
    }

    /// Session currently registered for `endpoint`.
    pub fn get(&self, endpoint: &EndpointId) -> Option<SessionRef> {
        self.sessions.get(endpoint).map(|entry| entry.value().clone())
    }

    /// Point-in-time copy of every registered session.
    pub fn all_sessions(&self) -> Vec<SessionRef> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Whether `endpoint` has a registered session.
    pub fn contains(&self, endpoint: &EndpointId) -> bool {
        self.sessions.contains_key(endpoint)
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
