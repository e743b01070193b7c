//! Per-connection handshake observation
//!
//! Renegotiation is an easy denial-of-service lever, so the proxy refuses
//! it outright. The TLS engine already rejects renegotiation at the
//! protocol level; this monitor gives the connection handler the same
//! observable signal the proxy acts on (drop the connection) and keeps
//! the accounting at one place per connection.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Tracks handshake progress on one connection.
///
/// All methods are callable from any thread; the proxy drives
/// `on_handshake_start` / `on_handshake_complete` from its I/O loop and
/// polls `renegotiation_detected` when deciding whether to keep the
/// connection.
#[derive(Debug, Default)]
pub struct HandshakeMonitor {
    completed: AtomicBool,
    renegotiation: AtomicBool,
}

impl HandshakeMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a handshake starting. A start observed after the initial
    /// handshake completed is a renegotiation attempt.
    pub fn on_handshake_start(&self) {
        if self.completed.load(Ordering::Acquire) {
            self.renegotiation.store(true, Ordering::Release);
            debug!("TLS renegotiation started");
        }
    }

    /// Record the initial handshake finishing.
    pub fn on_handshake_complete(&self) {
        self.completed.store(true, Ordering::Release);
    }

    /// True once the initial handshake has finished.
    pub fn handshake_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// True when a renegotiation attempt was observed; the connection
    /// should be dropped.
    pub fn renegotiation_detected(&self) -> bool {
        self.renegotiation.load(Ordering::Acquire)
    }
}
