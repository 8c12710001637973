use thiserror::Error;

use crate::config::ConfigError;
use crate::session::{RecordError, RegistryError};

/// Crate-level convenience error.
///
/// Not a "god error": it is a thin wrapper over the per-concern errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
