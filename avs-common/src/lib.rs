//! # AVS Common Library
//!
//! Shared code for the address verification service crates:
//! - Error types
//! - TOML configuration discovery and loading

pub mod config;
pub mod error;

pub use error::{Error, Result};
