//! Counters for filter decisions and control-channel activity.
//!
//! Everything is a relaxed atomic so the packet path can count without
//! taking a lock.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Creates a new counter initialized to zero.
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increments the counter by 1.
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the current value of the counter.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Metrics shared by the engine, the control server and the packet tap.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    // Decision metrics
    /// Packets accepted by a matching unblock rule.
    pub packets_accepted: Counter,
    /// Packets dropped by a matching block rule.
    pub packets_dropped: Counter,
    /// Packets accepted because no rule matched.
    pub packets_unmatched: Counter,

    // Control metrics
    /// Rules appended to the store.
    pub rules_added: Counter,
    /// Rules removed from the store.
    pub rules_deleted: Counter,
    /// Command lines rejected with an error.
    pub commands_rejected: Counter,
    /// Control sessions opened.
    pub control_sessions: Counter,

    /// Current number of rules in the store.
    pub rule_count: AtomicU64,
}

impl MetricsRegistry {
    /// Creates a new metrics registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the rule count gauge.
    pub fn set_rule_count(&self, count: usize) {
        self.rule_count.store(count as u64, Ordering::Relaxed);
    }

    /// Exports all metrics as key-value pairs.
    pub fn export(&self) -> Vec<(String, u64)> {
        vec![
            ("packets_accepted".into(), self.packets_accepted.get()),
            ("packets_dropped".into(), self.packets_dropped.get()),
            ("packets_unmatched".into(), self.packets_unmatched.get()),
            ("rules_added".into(), self.rules_added.get()),
            ("rules_deleted".into(), self.rules_deleted.get()),
            ("commands_rejected".into(), self.commands_rejected.get()),
            ("control_sessions".into(), self.control_sessions.get()),
            ("rule_count".into(), self.rule_count.load(Ordering::Relaxed)),
        ]
    }
}
