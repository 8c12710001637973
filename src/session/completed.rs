//! Completed-request idempotency ledger.
//!
//! The transport may deliver a request more than once after a
//! timeout-driven client retry. Recording each completed transaction id
//! (with the ino it created, if any) lets a replay be answered without
//! re-executing server-side effects. The client reports, out of band, the
//! lowest tid it may still retry; everything below that watermark is
//! trimmed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{Ino, Tid};

/// Per-session idempotency ledger keyed by transaction id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletedRequests {
    by_tid: BTreeMap<Tid, Option<Ino>>,
}

impl CompletedRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed request and the ino it created, if any.
    /// Re-recording the same tid overwrites (replays carry the same
    /// outcome).
    pub fn insert(&mut self, tid: Tid, created: Option<Ino>) {
        self.by_tid.insert(tid, created);
    }

    /// Look up a tid. `Some(created)` means the request already completed;
    /// `None` means first-time execution (an expected outcome, not an
    /// error).
    pub fn get(&self, tid: Tid) -> Option<Option<Ino>> {
        self.by_tid.get(&tid).copied()
    }

    pub fn contains(&self, tid: Tid) -> bool {
        self.by_tid.contains_key(&tid)
    }

    /// Discard every entry with tid below `min_tid`; `Tid::ZERO` discards
    /// everything. The ledger only ever shrinks from the low end.
    pub fn trim(&mut self, min_tid: Tid) {
        if min_tid == Tid::ZERO {
            self.by_tid.clear();
            return;
        }
        while let Some(entry) = self.by_tid.first_entry() {
            if *entry.key() >= min_tid {
                break;
            }
            entry.remove();
        }
    }

    /// Evict lowest tids until at most `max_entries` remain.
    pub fn evict_to(&mut self, max_entries: usize) {
        while self.by_tid.len() > max_entries {
            if let Some((tid, _)) = self.by_tid.pop_first() {
                debug!(%tid, "evicting completed request past ledger bound");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_tid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tid.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_tid.clear();
    }

    /// Lowest tid still recorded.
    pub fn oldest(&self) -> Option<Tid> {
        self.by_tid.keys().next().copied()
    }
}
