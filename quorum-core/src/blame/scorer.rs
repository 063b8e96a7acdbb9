//! Scoring of blamed authors

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use super::{BlameProvider, BlameSource};
use crate::model::{Account, Change};
use crate::resolver::AccountDirectory;
use crate::{Error, Result};

/// Default number of blame reviewers
pub const DEFAULT_MAX_REVIEWERS: usize = 3;

/// Scores accounts by how many of a change's edited lines they last touched
pub struct BlameScorer {
    provider: Arc<dyn BlameProvider>,
    directory: Arc<dyn AccountDirectory>,
    ignore: Option<Regex>,
    max_reviewers: usize,
}

impl std::fmt::Debug for BlameScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlameScorer")
            .field("ignore", &self.ignore)
            .field("max_reviewers", &self.max_reviewers)
            .finish_non_exhaustive()
    }
}

impl BlameScorer {
    pub fn new(provider: Arc<dyn BlameProvider>, directory: Arc<dyn AccountDirectory>) -> Self {
        Self {
            provider,
            directory,
            ignore: None,
            max_reviewers: DEFAULT_MAX_REVIEWERS,
        }
    }

    /// Number of accounts returned by [`BlameScorer::reviewers`]
    pub fn with_max_reviewers(mut self, max_reviewers: usize) -> Self {
        self.max_reviewers = max_reviewers;
        self
    }

    /// Skip files whose whole path matches `pattern` (empty disables)
    pub fn with_ignore_pattern(mut self, pattern: &str) -> Result<Self> {
        self.ignore = if pattern.trim().is_empty() {
            None
        } else {
            Some(crate::query::anchored_regex(pattern).map_err(|source| Error::InvalidFilter {
                filter: pattern.to_string(),
                source,
            })?)
        };
        Ok(self)
    }

    /// Blame counts per account for the lines a change edits
    ///
    /// Empty for merge and root commits. The change owner and inactive
    /// accounts never score.
    pub async fn score_candidates(&self, change: &Change) -> HashMap<Account, u32> {
        let by_email = match self.author_lines(change).await {
            Ok(by_email) => by_email,
            Err(e) => {
                warn!(change = change.number, error = %e, "Blame scoring failed");
                return HashMap::new();
            }
        };

        let mut scores: HashMap<Account, u32> = HashMap::new();
        for (email, lines) in by_email {
            let accounts = match self.directory.find_by_email(&email).await {
                Ok(accounts) => accounts,
                Err(e) => {
                    warn!(change = change.number, email = %email, error = %e, "Failed to look up blamed author");
                    continue;
                }
            };
            for account in accounts {
                if account.active && account.id != change.owner.id {
                    *scores.entry(account).or_insert(0) += lines;
                }
            }
        }

        debug!(change = change.number, candidates = scores.len(), "Scored blame candidates");
        scores
    }

    /// Blamed line counts per author email
    ///
    /// The repository is opened and blamed on the blocking thread pool.
    pub async fn author_lines(&self, change: &Change) -> Result<BTreeMap<String, u32>> {
        let provider = self.provider.clone();
        let ignore = self.ignore.clone();
        let snapshot = change.clone();

        tokio::task::spawn_blocking(move || {
            let source = provider.open(&snapshot)?;
            line_authors(source.as_ref(), &snapshot, ignore.as_ref())
        })
        .await
        .map_err(|e| Error::Other(format!("Blame task failed: {}", e)))?
    }

    /// Top accounts for a change
    pub async fn reviewers(&self, change: &Change) -> Vec<Account> {
        let scores = self.score_candidates(change).await;
        top(&scores, self.max_reviewers)
    }
}

/// Highest-scoring `n` accounts, ordered by score then account id
pub fn top(scores: &HashMap<Account, u32>, n: usize) -> Vec<Account> {
    let mut ranked: Vec<(&Account, u32)> = scores.iter().map(|(a, s)| (a, *s)).collect();
    ranked.sort_by(|(a, sa), (b, sb)| sb.cmp(sa).then_with(|| a.id.cmp(&b.id)));
    ranked.into_iter().take(n).map(|(a, _)| a.clone()).collect()
}

/// Count blamed lines per author email
///
/// Files that cannot be blamed are logged and skipped.
pub(crate) fn line_authors(
    source: &dyn BlameSource,
    change: &Change,
    ignore: Option<&Regex>,
) -> Result<BTreeMap<String, u32>> {
    let mut counts = BTreeMap::new();
    let revision = change.revision.as_str();

    let parents = source.parent_count(revision)?;
    if parents != 1 {
        debug!(change = change.number, parents, "Skipping blame for non-linear revision");
        return Ok(counts);
    }
    let parent = source.parent(revision)?;

    for edits in source.diff(revision, &parent)? {
        if !edits.kind.has_old_lines() {
            continue;
        }
        if ignore.is_some_and(|re| re.is_match(&edits.path)) {
            debug!(change = change.number, path = %edits.path, "Ignoring file for blame");
            continue;
        }

        let authors = match source.blame(&edits.path, &parent) {
            Ok(authors) => authors,
            Err(e) => {
                warn!(change = change.number, path = %edits.path, error = %e, "Failed to blame file");
                continue;
            }
        };

        for line in edits.old_lines() {
            if let Some(email) = (line as usize).checked_sub(1).and_then(|i| authors.get(i)) {
                if !email.is_empty() {
                    *counts.entry(email.clone()).or_insert(0) += 1;
                }
            }
        }
    }

    Ok(counts)
}
