//! Common error types for AVS

use thiserror::Error;

/// Common result type for AVS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by AVS crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
