//! Run bookkeeping so that results of cancelled runs are discarded.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

/// Identifies one processing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTicket {
    id: u64,
}

impl RunTicket {
    /// Sequence number of the run, starting at 1.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

/// Hands out run tickets and tracks which runs are still wanted.
///
/// Runs with an id at or below the cancellation watermark are stale.
#[derive(Debug, Default)]
pub struct RunTracker {
    issued: AtomicU64,
    watermark: AtomicU64,
}

impl RunTracker {
    /// Create a tracker with no runs.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            issued: AtomicU64::new(0),
            watermark: AtomicU64::new(0),
        }
    }

    /// Start a run that coexists with any runs already in flight.
    pub fn begin(&self) -> RunTicket {
        RunTicket {
            id: self.issued.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    /// Start a run that supersedes every run started before it.
    pub fn begin_exclusive(&self) -> RunTicket {
        let ticket = self.begin();
        self.watermark.fetch_max(ticket.id - 1, Ordering::SeqCst);
        ticket
    }

    /// Invalidate every run issued so far.
    pub fn cancel_all(&self) {
        let issued = self.issued.load(Ordering::SeqCst);
        self.watermark.fetch_max(issued, Ordering::SeqCst);
        tracing::debug!(up_to = issued, "cancelled runs");
    }

    /// Whether the run's result may still be applied.
    #[must_use]
    pub fn is_live(&self, ticket: RunTicket) -> bool {
        ticket.id > self.watermark.load(Ordering::SeqCst)
    }

    /// Fail with [`Error::Cancelled`] if the run has been invalidated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] for a stale ticket.
    pub fn ensure_live(&self, ticket: RunTicket) -> Result<()> {
        if self.is_live(ticket) {
            Ok(())
        } else {
            Err(Error::Cancelled { run: ticket.id })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tickets_are_sequential() {
        let tracker = RunTracker::new();
        assert_eq!(tracker.begin().id(), 1);
        assert_eq!(tracker.begin().id(), 2);
    }

    #[test]
    fn test_runs_coexist() {
        let tracker = RunTracker::new();
        let first = tracker.begin();
        let second = tracker.begin();

        assert!(tracker.is_live(first));
        assert!(tracker.is_live(second));
    }

    #[test]
    fn test_cancel_all_spares_later_runs() {
        let tracker = RunTracker::new();
        let before = tracker.begin();
        tracker.cancel_all();
        let after = tracker.begin();

        assert!(!tracker.is_live(before));
        assert!(tracker.is_live(after));
        assert!(matches!(
            tracker.ensure_live(before),
            Err(Error::Cancelled { run: 1 })
        ));
        assert!(tracker.ensure_live(after).is_ok());
    }

    #[test]
    fn test_exclusive_run_supersedes_older() {
        let tracker = RunTracker::new();
        let old = tracker.begin();
        let older_exclusive = tracker.begin_exclusive();
        let newest = tracker.begin_exclusive();

        assert!(!tracker.is_live(old));
        assert!(!tracker.is_live(older_exclusive));
        assert!(tracker.is_live(newest));
    }
}
