//! Monotonic counter atoms.
//!
//! StateSeq: freshness token bumped on every distinct session state change
//! PushSeq: tags each capability message pushed to a client
//! LeaseSeq: lease validity epoch for a client

use std::fmt;

use serde::{Deserialize, Serialize};

/// Session state-change counter.
///
/// Strictly increases on every distinct state change; setting the same
/// state twice never bumps it. Asynchronous completions capture the value
/// at dispatch time and compare it on completion to detect staleness.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateSeq(u64);

impl StateSeq {
    pub const ZERO: StateSeq = StateSeq(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(
            self.0
                .checked_add(1)
                .expect("state seq overflow computing next value"),
        )
    }
}

impl fmt::Debug for StateSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateSeq({})", self.0)
    }
}

impl fmt::Display for StateSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<StateSeq> for u64 {
    fn from(value: StateSeq) -> u64 {
        value.0
    }
}

/// Capability push-sequence counter.
///
/// Every capability message sent to the client is tagged with the value
/// after incrementing, so flush acknowledgements can be correlated back to
/// the work waiting on them. Acknowledgement is cumulative: acking `n`
/// acks everything at or below `n`.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PushSeq(u64);

impl PushSeq {
    pub const ZERO: PushSeq = PushSeq(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(
            self.0
                .checked_add(1)
                .expect("push seq overflow computing next value"),
        )
    }
}

impl fmt::Debug for PushSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PushSeq({})", self.0)
    }
}

impl fmt::Display for PushSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<PushSeq> for u64 {
    fn from(value: PushSeq) -> u64 {
        value.0
    }
}

/// Lease validity epoch for one client.
///
/// Bumped by the locking layer when all leases granted to the client are
/// invalidated at once; individual lease objects carry the epoch they were
/// issued under.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeaseSeq(u32);

impl LeaseSeq {
    pub const ZERO: LeaseSeq = LeaseSeq(0);

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Debug for LeaseSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LeaseSeq({})", self.0)
    }
}

impl fmt::Display for LeaseSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
