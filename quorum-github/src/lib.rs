//! Quorum GitHub - GitHub adapters for Quorum
//!
//! Pull requests are read as changes, users and organisation teams serve as
//! the account directory, and assignments become review requests.

mod client;
mod directory;
mod error;
mod pr;
mod tracker;

pub use client::{parse_github_url, GitHubClient};
pub use directory::GitHubDirectory;
pub use error::{Error, Result};
pub use tracker::{cc_comment, GitHubTracker};
