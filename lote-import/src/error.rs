//! Error types for lote-import
//!
//! One variant per failure class of the import pipeline. Row-level
//! validation findings and per-record remote failures are not errors at
//! this level: they are collected into the import result and the run
//! continues.

use thiserror::Error;

use crate::models::ImportState;
use crate::remote::RemoteError;

/// Import pipeline error
#[derive(Debug, Error)]
pub enum ImportError {
    /// Bad extension or size; no session is created
    #[error("Arquivo inválido: {0}")]
    FileSelection(String),

    /// Structural problems in the file; nothing was validated
    #[error("Erro de leitura do arquivo: {}", .0.join("; "))]
    Parse(Vec<String>),

    /// Validation left no record to import
    #[error("Nenhum registro válido encontrado ({errors} linha(s) com erro)")]
    NoValidRecords { errors: usize },

    /// Authentication failed; no record was attempted
    #[error("Falha de autenticação: {0}")]
    Authentication(#[source] RemoteError),

    /// Identity or secret not supplied
    #[error("Credenciais ausentes: informe identidade e senha")]
    MissingCredentials,

    /// Operation not allowed in the current state
    #[error("Operação '{operation}' inválida no estado {from}")]
    InvalidTransition {
        from: ImportState,
        operation: &'static str,
    },

    /// Execution requested without any pending record
    #[error("Nada a importar")]
    NothingToImport,

    /// The import was reset while running
    #[error("Importação cancelada")]
    Cancelled,

    /// Session or history persistence failure
    #[error("Storage error: {0}")]
    Storage(#[from] lote_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Report or template could not be written
    #[error("Report error: {0}")]
    Report(String),
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Report(err.to_string())
    }
}

impl From<sqlx::Error> for ImportError {
    fn from(err: sqlx::Error) -> Self {
        ImportError::Storage(lote_common::Error::Database(err))
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::Storage(lote_common::Error::Serialization(err))
    }
}
