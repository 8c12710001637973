//! Session tracking for the metadata tier.
//!
//! One `Session` per connected client, owned by a `SessionTable`. The
//! dispatch layer looks a session up, checks its state, and invokes an
//! operation; the session mutates its owned substructures and hands any
//! released work back as batches.

pub mod completed;
pub mod flush;
pub mod info;
pub mod mru;
pub mod recall;
pub mod registry;
#[allow(clippy::module_inception)]
pub mod session;
pub mod state;

pub use completed::CompletedRequests;
pub use flush::FlushSequencer;
pub use info::{RecordError, SessionInfo};
pub use mru::MruList;
pub use recall::RecallState;
pub use registry::{RegistryError, SessionTable};
pub use session::{ConnectionHandle, Session};
pub use state::SessionState;
