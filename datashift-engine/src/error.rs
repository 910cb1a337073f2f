//! Error types for the transfer engine.

use crate::config::VersionStrategy;
use crate::integrity::SchemaDiff;
use datashift_types::TransferStage;
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type for transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;

/// Errors that can occur while running a transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The engine was wired with providers of the wrong kind.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Source and destination are not compatible.
    #[error(
        "unable to transfer the data between {source_name} and {destination_name}: {report}"
    )]
    Integrity {
        source_name: String,
        destination_name: String,
        report: IntegrityError,
    },

    /// A provider hook failed.
    #[error("provider error: {0}")]
    Provider(String),

    /// A stream failed while a stage was running.
    #[error("{stage} stream error: {message}")]
    Stream {
        stage: TransferStage,
        message: String,
    },

    /// A configured transform failed.
    #[error("transform error: {0}")]
    Transform(String),

    /// The other end of a channel went away.
    #[error("channel closed")]
    ChannelClosed,

    /// IO error. Providers reading files or sockets convert into this
    /// with `?`.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record-level type error.
    #[error(transparent)]
    Types(#[from] datashift_types::Error),

    /// The destination could not roll back after `cause`.
    #[error("rollback failed ({rollback}) after transfer error: {cause}")]
    Rollback {
        cause: Box<TransferError>,
        rollback: Box<TransferError>,
    },
}

impl TransferError {
    /// Shorthand for a stream error on `stage`.
    pub fn stream(stage: TransferStage, message: impl Into<String>) -> Self {
        Self::Stream {
            stage,
            message: message.into(),
        }
    }

    /// The error that made the transfer fail, looking through a failed
    /// rollback.
    pub fn root_cause(&self) -> &TransferError {
        match self {
            Self::Rollback { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

/// Why source and destination were judged incompatible.
#[derive(Debug, Error)]
pub enum IntegrityError {
    /// Platform versions differ by more than the strategy allows.
    #[error(
        "versions don't match ({strategy} check): {source_version} does not match with {destination_version}"
    )]
    VersionMismatch {
        strategy: VersionStrategy,
        source_version: String,
        destination_version: String,
    },

    /// Content types differ structurally.
    #[error("the destination doesn't have a matching data structure ({} content types differ)", .diffs.len())]
    SchemaMismatch {
        diffs: BTreeMap<String, Vec<SchemaDiff>>,
    },

    /// Metadata or schemas could not be fetched.
    #[error("integrity data unavailable: {0}")]
    Unavailable(String),
}
