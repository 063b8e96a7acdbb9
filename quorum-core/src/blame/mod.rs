//! Reviewer candidates from line authorship
//!
//! For a change with a single parent, every line the change edits or deletes
//! is blamed as of the parent revision. Authors of those lines are scored by
//! how many of them they last touched.

mod git;
mod scorer;

pub use git::{GitBlameProvider, GitBlameSource};
pub use scorer::{top, BlameScorer, DEFAULT_MAX_REVIEWERS};

use crate::model::{Change, ChangeKind};
use crate::Result;

/// Old-side line regions of one file edited by a revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEdits {
    /// Path in the parent revision
    pub path: String,
    pub kind: ChangeKind,
    /// `(first_line, line_count)` pairs, 1-based, on the parent side
    pub regions: Vec<(u32, u32)>,
}

impl FileEdits {
    /// Parent-side line numbers covered by the edit regions
    pub fn old_lines(&self) -> impl Iterator<Item = u32> + '_ {
        self.regions
            .iter()
            .flat_map(|&(start, count)| start..start.saturating_add(count))
    }
}

/// Repository access needed for blame scoring
///
/// Implementations hold an open repository handle and are used by one scorer
/// invocation only.
pub trait BlameSource {
    /// Number of parents of a revision
    fn parent_count(&self, revision: &str) -> Result<usize>;

    /// Parent of a single-parent revision
    fn parent(&self, revision: &str) -> Result<String>;

    /// Files edited between `parent` and `revision`
    fn diff(&self, revision: &str, parent: &str) -> Result<Vec<FileEdits>>;

    /// Author email per line of `path` as of `revision` (index 0 is line 1)
    fn blame(&self, path: &str, revision: &str) -> Result<Vec<String>>;
}

/// Opens a [`BlameSource`] for a change's repository
pub trait BlameProvider: Send + Sync {
    fn open(&self, change: &Change) -> Result<Box<dyn BlameSource>>;
}
