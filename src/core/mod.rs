//! Core domain types.
//!
//! Module hierarchy follows type dependency order:
//! - identity: ClientId, Tid, RequestId, Ino, CapId, LeaseId, AuthCaps
//! - seq: StateSeq, PushSeq, LeaseSeq counters
//! - interval: InoSet interval set
//! - limits: bookkeeping bounds

pub mod identity;
pub mod interval;
pub mod limits;
pub mod seq;

pub use identity::{AuthCaps, CapId, ClientId, Ino, LeaseId, RequestId, Tid};
pub use interval::InoSet;
pub use limits::Limits;
pub use seq::{LeaseSeq, PushSeq, StateSeq};
