//! lote-import library interface
//!
//! Bulk work-item import: a delimited file is parsed, validated against the
//! fixed field schema, previewed, then sent record by record to the remote
//! work-tracking service. The in-flight session and a capped history of
//! outcomes are persisted in SQLite.
//!
//! Exposes public APIs for the `lote-import` binary and integration tests.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod parser;
pub mod remote;
pub mod report;
pub mod schema;
pub mod template;
pub mod validator;
pub mod workflow;

pub use crate::config::{Credentials, ImportConfig};
pub use crate::error::ImportError;
pub use crate::workflow::{ImportWorkflow, RestoreOutcome};
