//! # nvl Core
//!
//! Core library for the nvl identity-provider CLI.
//!
//! This crate provides:
//! - A file store for YAML and JSON records with merge-on-write
//! - The issuer registry: named profiles, their sessions and the default issuer
//! - The selection rules that pick which issuer a command operates against
//! - (feature `http`) A client for the issuer's discovery, login and admin APIs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nvl_core::{IssuerRegistry, NvlHome};
//!
//! fn current_issuer() -> Result<nvl_core::IssuerProfile, nvl_core::NvlError> {
//!     let registry = IssuerRegistry::open(NvlHome::resolve(None)?)?;
//!     Ok(registry.load(None, true)?)
//! }
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod prompt;
pub mod registry;
pub mod resolve;
pub mod store;
pub mod token;

#[cfg(feature = "http")]
pub mod client;

// Re-export commonly used types at crate root
pub use model::{
    IssuerId,
    IssuerProfile,
    Session,
};

pub use store::{
    FileStore,
    Format,
    Secret,
    StoreError,
    WriteMode,
};

pub use token::Tokens;

pub use config::{
    ConfigError,
    GlobalConfig,
    NvlHome,
    HOME_ENV,
};

pub use resolve::{
    Resolution,
    SelectOptions,
};

pub use prompt::{
    Choice,
    Chooser,
    PromptError,
};

pub use registry::{
    IssuerRegistry,
    RegistryError,
};

pub use error::NvlError;

#[cfg(feature = "http")]
pub use client::{
    AuthorizationParams,
    ClientError,
    IssuerClient,
    ProviderMetadata,
    Resource,
};
