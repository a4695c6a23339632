//! In-memory session double shared by the unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::errors::SendError;
use crate::session::Session;

/// Session that records every payload it is asked to send.
pub struct RecordingSession {
    open: AtomicBool,
    fail_after: AtomicUsize,
    idle_disabled: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl RecordingSession {
    fn with_state(open: bool) -> Arc<Self> {
        Arc::new(Self {
            open: AtomicBool::new(open),
            fail_after: AtomicUsize::new(usize::MAX),
            idle_disabled: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn open() -> Arc<Self> {
        Self::with_state(true)
    }

    pub fn closed() -> Arc<Self> {
        Self::with_state(false)
    }

    /// Report `SendError::Full` once `n` payloads have been recorded.
    pub fn fail_after(&self, n: usize) {
        self.fail_after.store(n, Ordering::SeqCst);
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn idle_disabled(&self) -> bool {
        self.idle_disabled.load(Ordering::SeqCst)
    }
}

impl Session for RecordingSession {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send(&self, payload: &str) -> Result<(), SendError> {
        if !self.is_open() {
            return Err(SendError::Closed);
        }
        let mut sent = self.sent.lock();
        if sent.len() >= self.fail_after.load(Ordering::SeqCst) {
            return Err(SendError::Full);
        }
        sent.push(payload.to_owned());
        Ok(())
    }

    fn disable_idle_timeout(&self) {
        self.idle_disabled.store(true, Ordering::SeqCst);
    }
}
