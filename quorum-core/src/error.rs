//! Error types for Quorum

use thiserror::Error;

use crate::query::QueryError;
use crate::rules::ValidationError;

/// Result type alias for Quorum operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Quorum operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Git error
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A filter expression failed validation
    #[error("Invalid filter \"{filter}\": {source}")]
    InvalidFilter {
        /// The offending match expression
        filter: String,
        /// Why it was rejected
        #[source]
        source: QueryError,
    },

    /// A rules write was rejected by validation
    #[error("Rules failed validation ({} problem(s))", .0.len())]
    InvalidRules(Vec<ValidationError>),

    /// Account directory lookup failed
    #[error("Directory error: {0}")]
    Directory(String),

    /// Change tracking backend rejected or failed a call
    #[error("Tracker error: {0}")]
    Tracker(String),

    /// The work queue is closed and cannot accept tasks
    #[error("Work queue is shut down")]
    QueueClosed,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
