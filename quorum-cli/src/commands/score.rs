//! Score command - blame ranking of a local commit

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use quorum_core::blame::{BlameScorer, GitBlameProvider, GitBlameSource};
use quorum_core::{Account, AccountDirectory, Config};

use super::{load_directory, print_accounts};

/// Rank the authors of the lines a commit edits
#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// Repository to blame
    #[arg(short, long, default_value = ".")]
    repo: PathBuf,

    /// Commit to score
    #[arg(long, default_value = "HEAD")]
    rev: String,

    /// Accounts and groups as JSON, to turn emails into accounts
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Number of reviewers to pick (overrides config)
    #[arg(short = 'n', long)]
    max: Option<usize>,
}

impl ScoreArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let source = GitBlameSource::open(&self.repo)?;
        // Owner id 0 never matches a directory account
        let change = source.change_at("local", &self.rev, Account::new(0, "local"))?;
        drop(source);

        let directory: Arc<dyn AccountDirectory> = Arc::new(load_directory(self.directory.as_deref())?);
        let scorer = BlameScorer::new(Arc::new(GitBlameProvider::Single(self.repo.clone())), directory)
            .with_max_reviewers(self.max.unwrap_or(config.blame.max_reviewers))
            .with_ignore_pattern(&config.blame.ignore_file_pattern)?;

        println!("Commit {} ({} parent(s))", change.revision, change.parents.len());
        if change.parents.len() != 1 {
            println!("Only single-parent commits are scored");
            return Ok(());
        }

        let mut lines: Vec<(String, u32)> = scorer.author_lines(&change).await?.into_iter().collect();
        lines.sort_by(|(a, la), (b, lb)| lb.cmp(la).then_with(|| a.cmp(b)));
        println!();
        println!("Blamed lines by author:");
        for (email, count) in &lines {
            println!("  {:>6}  {}", count, email);
        }

        if self.directory.is_some() {
            println!();
            print_accounts("Reviewers", &scorer.reviewers(&change).await);
        }
        Ok(())
    }
}
