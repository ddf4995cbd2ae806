//! Top-level error types for nvl.

use thiserror::Error;

use crate::config::ConfigError;
use crate::prompt::PromptError;
use crate::registry::RegistryError;
use crate::store::StoreError;

#[cfg(feature = "http")]
use crate::client::ClientError;

/// Top-level error type encompassing all nvl errors.
#[derive(Debug, Error)]
pub enum NvlError {
    /// Error from file storage operations.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error from the issuer registry.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Error locating the home directory.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error while asking the operator.
    #[error("prompt error: {0}")]
    Prompt(#[from] PromptError),

    /// Error talking to an issuer.
    #[cfg(feature = "http")]
    #[error(transparent)]
    Client(#[from] ClientError),
}
