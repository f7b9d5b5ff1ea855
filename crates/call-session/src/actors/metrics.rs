//! Mailbox monitoring for the session actor.
//!
//! | Level    | Depth     |
//! |----------|-----------|
//! | Normal   | < 64      |
//! | Warning  | 64-191    |
//! | Critical | >= 192    |
//!
//! Depth is sampled from the receiver after each dequeue, so it counts
//! commands and engine events still waiting behind the one being handled.

use crate::observability::metrics;

use tracing::{debug, warn};

/// Depth at which the mailbox is considered elevated.
pub const MAILBOX_WARNING: usize = 64;

/// Depth at which the mailbox is considered critical.
pub const MAILBOX_CRITICAL: usize = 192;

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MailboxLevel {
    Normal,
    Warning,
    Critical,
}

impl MailboxLevel {
    #[must_use]
    pub const fn for_depth(depth: usize) -> Self {
        if depth >= MAILBOX_CRITICAL {
            MailboxLevel::Critical
        } else if depth >= MAILBOX_WARNING {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

/// Tracks queue depth and throughput for one session actor.
///
/// Owned by the actor; not shared.
#[derive(Debug)]
pub struct MailboxMonitor {
    session_id: String,
    level: MailboxLevel,
    peak_depth: usize,
    messages_processed: u64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            level: MailboxLevel::Normal,
            peak_depth: 0,
            messages_processed: 0,
        }
    }

    /// Record the number of messages still queued.
    ///
    /// Logs only when the level changes upward.
    pub fn record_depth(&mut self, depth: usize) {
        self.peak_depth = self.peak_depth.max(depth);
        metrics::set_mailbox_depth(depth);

        let level = MailboxLevel::for_depth(depth);
        if level > self.level {
            match level {
                MailboxLevel::Critical => warn!(
                    target: "call.actor.mailbox",
                    session_id = %self.session_id,
                    depth,
                    threshold = MAILBOX_CRITICAL,
                    "Mailbox depth critical"
                ),
                MailboxLevel::Warning => debug!(
                    target: "call.actor.mailbox",
                    session_id = %self.session_id,
                    depth,
                    "Mailbox depth elevated"
                ),
                MailboxLevel::Normal => {}
            }
        }
        self.level = level;
    }

    /// Record one message handled.
    pub fn record_processed(&mut self) {
        self.messages_processed += 1;
    }

    #[must_use]
    pub fn level(&self) -> MailboxLevel {
        self.level
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_thresholds() {
        assert_eq!(MailboxLevel::for_depth(0), MailboxLevel::Normal);
        assert_eq!(MailboxLevel::for_depth(63), MailboxLevel::Normal);
        assert_eq!(MailboxLevel::for_depth(64), MailboxLevel::Warning);
        assert_eq!(MailboxLevel::for_depth(191), MailboxLevel::Warning);
        assert_eq!(MailboxLevel::for_depth(192), MailboxLevel::Critical);
    }

    #[test]
    fn test_monitor_tracks_peak_and_level() {
        let mut monitor = MailboxMonitor::new("session-1");

        monitor.record_depth(10);
        monitor.record_depth(100);
        assert_eq!(monitor.level(), MailboxLevel::Warning);

        monitor.record_depth(200);
        assert_eq!(monitor.level(), MailboxLevel::Critical);

        monitor.record_depth(3);
        assert_eq!(monitor.level(), MailboxLevel::Normal);
        assert_eq!(monitor.peak_depth(), 200);
    }

    #[test]
    fn test_monitor_counts_processed() {
        let mut monitor = MailboxMonitor::new("session-2");
        for _ in 0..5 {
            monitor.record_processed();
        }
        assert_eq!(monitor.messages_processed(), 5);
    }
}
