//! Error types for the ban sync node.

use crate::client::ClientError;
use crate::models::{SubjectId, TargetRef};
use bansync_duration::ParseError;
use thiserror::Error;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in node operations.
///
/// Per-target rejections are not errors at this level: they are collected
/// into pass reports and never abort a pass.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unban requested for a subject that is not in the registry
    #[error("user {0} is not globally banned (or the ID is wrong)")]
    SubjectNotFound(SubjectId),

    /// The guild does not exist or the bot is not connected to it
    #[error("server {0} does not exist or I am not connected to it")]
    TargetUnresolvable(TargetRef),

    /// Bad ban duration; nothing was touched
    #[error("{0}")]
    MalformedDuration(#[from] ParseError),

    /// Client failure outside of a per-target action
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        Error::Storage(e.to_string())
    }
}
