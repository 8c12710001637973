//! Session bookkeeping limits (normative defaults).

use serde::{Deserialize, Serialize};

/// Per-session and per-table bookkeeping bounds.
///
/// Values are intentionally explicit about their units to avoid confusion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Idempotency ledger entries kept per session; the lowest tids are
    /// evicted past this bound.
    pub max_completed_requests: usize,
    /// Outbound messages queued while the client has no connection; the
    /// oldest are dropped past this bound.
    pub max_preopen_messages: usize,
    /// Projected preallocated-ino count below which the allocator should
    /// request a top-up for the session.
    pub prealloc_low_water: u64,
    /// Sessions the table accepts before refusing new clients.
    pub max_sessions: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_completed_requests: 1024,
            max_preopen_messages: 128,
            prealloc_low_water: 64,
            max_sessions: 4096,
        }
    }
}
