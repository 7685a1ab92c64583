//! # lote common library
//!
//! Shared code for the lote bulk-import tooling:
//! - Error type and result alias
//! - TOML configuration loading and root folder resolution
//! - Event bus used to publish import progress

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
