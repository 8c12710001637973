//! Capability-recall cycle accounting.
//!
//! Under memory pressure the server asks a client to voluntarily release
//! capabilities down to a new limit. These counters track one in-flight
//! recall cycle so the eviction policy can judge whether the client is
//! cooperating. They are monitoring signals only; losing them degrades the
//! recall heuristics, never correctness.

use tracing::debug;

/// One in-flight recall cycle; inert while `recalled_at_ms` is unset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecallState {
    recalled_at_ms: Option<u64>,
    recall_count: u32,
    recall_release_count: u32,
}

impl RecallState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A recall was sent asking the client to shrink to `new_limit` caps
    /// out of `cap_count` currently held. Starts a cycle if none is in
    /// flight; a recall sent during an open cycle leaves the cycle's
    /// targets unchanged (the client is still working on the last one).
    pub fn notify_recall_sent(&mut self, cap_count: usize, new_limit: usize, now_ms: u64) {
        if self.recalled_at_ms.is_some() {
            return;
        }
        let asked = cap_count.saturating_sub(new_limit);
        self.recalled_at_ms = Some(now_ms);
        self.recall_count = asked.min(u32::MAX as usize) as u32;
        self.recall_release_count = 0;
        debug!(asked, cap_count, new_limit, "recall cycle started");
    }

    /// The client released `n` capabilities. Completes the cycle once the
    /// releases reach the amount asked for.
    pub fn notify_cap_release(&mut self, n: usize) {
        if self.recalled_at_ms.is_none() {
            return;
        }
        let n = n.min(u32::MAX as usize) as u32;
        self.recall_release_count = self.recall_release_count.saturating_add(n);
        if self.recall_release_count >= self.recall_count {
            debug!(released = self.recall_release_count, "recall cycle complete");
            *self = Self::default();
        }
    }

    /// When the current cycle started, if one is in flight.
    pub fn recalled_at_ms(&self) -> Option<u64> {
        self.recalled_at_ms
    }

    pub fn in_recall(&self) -> bool {
        self.recalled_at_ms.is_some()
    }

    /// Capability releases requested by the current cycle.
    pub fn recall_count(&self) -> u32 {
        self.recall_count
    }

    /// Capability releases the client has delivered so far.
    pub fn recall_release_count(&self) -> u32 {
        self.recall_release_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_runs_to_completion() {
        let mut recall = RecallState::new();
        recall.notify_recall_sent(100, 60, 1_000);
        assert!(recall.in_recall());
        assert_eq!(recall.recalled_at_ms(), Some(1_000));
        assert_eq!(recall.recall_count(), 40);

        recall.notify_cap_release(25);
        assert_eq!(recall.recall_release_count(), 25);
        assert!(recall.in_recall());

        recall.notify_cap_release(15);
        assert!(!recall.in_recall());
        assert_eq!(recall.recall_count(), 0);
        assert_eq!(recall.recall_release_count(), 0);
    }

    #[test]
    fn resend_during_open_cycle_does_not_restart() {
        let mut recall = RecallState::new();
        recall.notify_recall_sent(100, 60, 1_000);
        recall.notify_cap_release(10);
        recall.notify_recall_sent(90, 50, 2_000);
        assert_eq!(recall.recalled_at_ms(), Some(1_000));
        assert_eq!(recall.recall_count(), 40);
        assert_eq!(recall.recall_release_count(), 10);
    }

    #[test]
    fn releases_outside_a_cycle_are_ignored() {
        let mut recall = RecallState::new();
        recall.notify_cap_release(5);
        assert_eq!(recall.recall_release_count(), 0);
        assert!(!recall.in_recall());
    }

    #[test]
    fn limit_above_held_caps_asks_for_nothing_and_completes_immediately() {
        let mut recall = RecallState::new();
        recall.notify_recall_sent(10, 50, 1_000);
        assert_eq!(recall.recall_count(), 0);
        // the first release report closes the vacuous cycle
        recall.notify_cap_release(0);
        assert!(!recall.in_recall());
    }
}
