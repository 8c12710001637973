#![forbid(unsafe_code)]

pub mod config;
pub mod core;
pub mod error;
pub mod session;
pub mod telemetry;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

// Re-export core types at crate root for convenience
pub use crate::config::{Config, ConfigError, LogFormat, LoggingConfig};
pub use crate::core::{
    AuthCaps, CapId, ClientId, Ino, InoSet, LeaseId, LeaseSeq, Limits, PushSeq, RequestId,
    StateSeq, Tid,
};
pub use crate::session::{
    CompletedRequests, ConnectionHandle, FlushSequencer, MruList, RecallState, RecordError,
    RegistryError, Session, SessionInfo, SessionState, SessionTable,
};
