// src/error.rs
// Error types for provisioning and driving test mysqld instances

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;
use tracing::error;

use crate::server::ServerState;

/// Main error type for the mysqltest library
#[derive(Error, Debug)]
pub enum MysqlTestError {
    #[error("no free port available: {0}")]
    PortUnavailable(String),

    #[error("failed to prepare instance directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write server config {path}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not discover mysqld base directory: {0}")]
    BaseDir(String),

    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("mysqld --initialize-insecure failed ({status}): {output}")]
    InitFailed { status: ExitStatus, output: String },

    #[error("mysqld exited before it was ready for connections")]
    ExitedBeforeReady,

    #[error("cannot {action} a server in state {state}")]
    InvalidState {
        action: &'static str,
        state: ServerState,
    },

    #[error("invalid connection options for {url}: {source}")]
    ConnectOptions {
        url: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("\"{statement}\" failed: {source}")]
    Statement {
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("start attempt cancelled")]
    Cancelled,

    #[error("start attempt panicked: {0}")]
    Join(String),
}

/// Convenience type alias for Result using MysqlTestError
pub type Result<T> = std::result::Result<T, MysqlTestError>;

impl MysqlTestError {
    /// Whether a fresh instance might succeed where this one failed.
    ///
    /// Only a server that died before printing its ready marker qualifies;
    /// everything else is fatal to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MysqlTestError::ExitedBeforeReady)
    }
}

impl From<tokio::task::JoinError> for MysqlTestError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            MysqlTestError::Cancelled
        } else {
            MysqlTestError::Join(err.to_string())
        }
    }
}

/// Fail the calling test: log the error and panic with the failing step.
pub(crate) fn fatal(step: &str, err: &MysqlTestError) -> ! {
    error!(step, error = %err, "mysqltest fatal error");
    panic!("mysqltest: {step} failed: {err}");
}
