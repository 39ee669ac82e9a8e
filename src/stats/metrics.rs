//! Counters for server and hub activity
//!
//! Plain atomic counters shared behind `Arc`; updated by the listener and
//! the broadcaster, read by whoever holds a handle.

use std::sync::atomic::{AtomicU64, Ordering};

/// Server-wide connection counters
#[derive(Debug, Default)]
pub struct ServerStats {
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    rejected_connections: AtomicU64,
    negotiation_failures: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_accepted(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_negotiation_failure(&self) {
        self.negotiation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Total connections ever accepted
    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    /// Connections currently open
    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Connections turned away at the limit
    pub fn rejected_connections(&self) -> u64 {
        self.rejected_connections.load(Ordering::Relaxed)
    }

    /// Connections closed because no recognized protocol was negotiated
    pub fn negotiation_failures(&self) -> u64 {
        self.negotiation_failures.load(Ordering::Relaxed)
    }
}

/// Hub-level delivery counters
#[derive(Debug, Default)]
pub struct HubStats {
    events_published: AtomicU64,
    frames_delivered: AtomicU64,
    frames_skipped: AtomicU64,
    slow_removals: AtomicU64,
    active_subscribers: AtomicU64,
}

impl HubStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.frames_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_slow_removal(&self) {
        self.slow_removals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_subscriber_added(&self) {
        self.active_subscribers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_subscriber_removed(&self) {
        self.active_subscribers.fetch_sub(1, Ordering::Relaxed);
    }

    /// Events accepted and sequenced
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    /// Frames enqueued to subscriber sinks
    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered.load(Ordering::Relaxed)
    }

    /// Frames skipped because a sink was full
    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped.load(Ordering::Relaxed)
    }

    /// Subscribers removed for persistent unwritability
    pub fn slow_removals(&self) -> u64 {
        self.slow_removals.load(Ordering::Relaxed)
    }

    /// Currently registered subscribers
    pub fn active_subscribers(&self) -> u64 {
        self.active_subscribers.load(Ordering::Relaxed)
    }
}
