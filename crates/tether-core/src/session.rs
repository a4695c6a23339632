//! Transport-facing session handle.

use std::sync::Arc;

use crate::errors::SendError;

/// A live physical connection, owned by the transport.
///
/// The core only holds `Arc` references to sessions between the transport's
/// open and close callbacks. `send` must not block on network I/O: it hands
/// the payload to the transport and returns.
pub trait Session: Send + Sync {
    /// Whether the connection can currently accept payloads.
    fn is_open(&self) -> bool;

    /// Queue `payload` for delivery on this connection.
    fn send(&self, payload: &str) -> Result<(), SendError>;

    /// Lift any idle timeout the transport applies to this connection.
    fn disable_idle_timeout(&self) {}
}

/// Shared session handle as stored by the registry.
pub type SessionRef = Arc<dyn Session>;

/// Whether two handles refer to the same session object.
pub fn same_session(a: &SessionRef, b: &SessionRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSession;

    #[test]
    fn same_session_compares_identity() {
        let a: SessionRef = RecordingSession::open();
        let b: SessionRef = RecordingSession::open();
        let a2 = a.clone();
        assert!(same_session(&a, &a2));
        assert!(!same_session(&a, &b));
    }

    #[test]
    fn default_idle_timeout_hook_is_noop() {
        struct Bare;
        impl Session for Bare {
            fn is_open(&self) -> bool {
                true
            }
            fn send(&self, _payload: &str) -> Result<(), SendError> {
                Ok(())
            }
        }
        let s = Bare;
        s.disable_idle_timeout();
        assert!(s.is_open());
    }
}
