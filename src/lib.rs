//! Furlong: a pruning crawler for sparse race identifier spaces
//!
//! This crate discovers which race identifiers exist on a remote results
//! service that can only be asked one identifier at a time, then fetches
//! the results table for each one. Probes are paced, retried and
//! checkpointed so multi-day runs can be interrupted and resumed.

pub mod config;
pub mod crawler;
pub mod identifier;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Furlong operations
#[derive(Debug, Error)]
pub enum FurlongError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Identifier error: {0}")]
    Identifier(#[from] IdentifierError),

    #[error("Checkpoint error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Unknown place code: {0}")]
    InvalidPlace(String),
}

/// Identifier parsing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Identifier must be 12 digits, got '{0}'")]
    Length(String),

    #[error("Identifier contains non-digit characters: '{0}'")]
    NonDigit(String),

    #[error("Unknown place code '{0}'")]
    UnknownPlace(String),

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: u32 },
}

/// Result type alias for Furlong operations
pub type Result<T> = std::result::Result<T, FurlongError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for identifier operations
pub type IdentifierResult<T> = std::result::Result<T, IdentifierError>;

// Re-export commonly used types
pub use config::{Config, RunPlan};
pub use identifier::{Place, RaceId};
pub use state::Verdict;
