//! Channel-backed session handle for one WebSocket connection.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tether_core::{EndpointId, SendError, Session};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// A connected WebSocket client as seen by the core.
///
/// `send` pushes onto the connection's outbound channel; a separate writer
/// task drains it into the socket.
pub struct ClientSession {
    /// Endpoint this connection belongs to.
    pub endpoint: EndpointId,
    /// Send channel to the socket writer task.
    tx: mpsc::Sender<String>,
    /// Cleared when the socket loop ends.
    open: AtomicBool,
    /// Read idle limit; `None` means unlimited.
    idle_timeout: Mutex<Option<Duration>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Count of payloads refused because the channel was full.
    dropped_messages: AtomicU64,
}

impl ClientSession {
    /// Create a session writing into `tx`.
    pub fn new(endpoint: EndpointId, tx: mpsc::Sender<String>, idle_timeout: Option<Duration>) -> Self {
        Self {
            endpoint,
            tx,
            open: AtomicBool::new(true),
            idle_timeout: Mutex::new(idle_timeout),
            connected_at: Instant::now(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Current read idle limit.
    pub fn idle_timeout(&self) -> Option<Duration> {
        *self.idle_timeout.lock()
    }

    /// Mark the connection closed. Later sends fail with [`SendError::Closed`].
    pub fn close(&self) {
        self.open.store(false, Ordering::Relaxed);
    }

    /// Total payloads refused because the outbound channel was full.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl Session for ClientSession {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed) && !self.tx.is_closed()
    }

    fn send(&self, payload: &str) -> Result<(), SendError> {
        if !self.open.load(Ordering::Relaxed) {
            return Err(SendError::Closed);
        }
        match self.tx.try_send(payload.to_owned()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                Err(SendError::Full)
            }
            Err(TrySendError::Closed(_)) => Err(SendError::Closed),
        }
    }

    fn disable_idle_timeout(&self) {
        *self.idle_timeout.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_session(capacity: usize) -> (ClientSession, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        let session = ClientSession::new("conn_1".into(), tx, Some(Duration::from_secs(30)));
        (session, rx)
    }

    #[tokio::test]
    async fn send_reaches_channel() {
        let (session, mut rx) = make_session(8);
        assert!(session.is_open());
        session.send("hello").unwrap();
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn send_preserves_order() {
        let (session, mut rx) = make_session(8);
        for i in 0..5 {
            session.send(&format!("msg_{i}")).unwrap();
        }
        for i in 0..5 {
            assert_eq!(rx.recv().await.unwrap(), format!("msg_{i}"));
        }
    }

    #[test]
    fn full_channel_reports_full_and_counts() {
        let (session, _rx) = make_session(1);
        session.send("first").unwrap();
        assert_eq!(session.send("second"), Err(SendError::Full));
        assert_eq!(session.drop_count(), 1);
        // Still open: a full buffer is not a dead connection
        assert!(session.is_open());
    }

    #[test]
    fn dropped_receiver_closes_session() {
        let (session, rx) = make_session(8);
        drop(rx);
        assert!(!session.is_open());
        assert_eq!(session.send("x"), Err(SendError::Closed));
    }

    #[test]
    fn close_marks_not_open() {
        let (session, _rx) = make_session(8);
        session.close();
        assert!(!session.is_open());
        assert_eq!(session.send("x"), Err(SendError::Closed));
    }

    #[test]
    fn disable_idle_timeout_clears_limit() {
        let (session, _rx) = make_session(8);
        assert_eq!(session.idle_timeout(), Some(Duration::from_secs(30)));
        session.disable_idle_timeout();
        assert_eq!(session.idle_timeout(), None);
    }

    #[test]
    fn age_increases() {
        let (session, _rx) = make_session(8);
        let a = session.age();
        std::thread::sleep(Duration::from_millis(5));
        assert!(session.age() > a);
    }
}
