//! Error types for GitHub operations

use thiserror::Error;

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during GitHub operations
#[derive(Error, Debug)]
pub enum Error {
    /// GitHub API error
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    /// Authentication error
    #[error("GitHub authentication error: {0}")]
    Auth(String),

    /// Pull request not found
    #[error("Pull request #{0} not found")]
    PrNotFound(u64),

    /// A change does not belong to the client's repository
    #[error("Change of project {project} cannot be handled by {repository}")]
    WrongRepository { project: String, repository: String },

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether GitHub answered 404
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::PrNotFound(_) => true,
            Error::Api(octocrab::Error::GitHub { source, .. }) => source.message.contains("Not Found"),
            _ => false,
        }
    }
}
