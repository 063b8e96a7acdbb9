//! Assign command - run the pipeline for a GitHub pull request

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use quorum_core::blame::{BlameProvider, GitBlameProvider};
use quorum_core::{ChangeEvent, Config, Outcome, Pipeline};
use quorum_github::{GitHubClient, GitHubDirectory, GitHubTracker};
use tracing::info;

use super::print_accounts;

/// Add reviewers to a pull request according to the repository's rules
#[derive(Args, Debug)]
pub struct AssignArgs {
    /// Repository (owner/repo or URL); rules are read for project `owner/repo`
    #[arg(short, long)]
    repo: String,

    /// Pull request number
    #[arg(long)]
    pr: u64,

    /// Local clone used for blame scoring
    #[arg(long)]
    clone: Option<PathBuf>,

    /// Only show what would be added
    #[arg(long)]
    dry_run: bool,
}

impl AssignArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let client = Arc::new(GitHubClient::from_url(&self.repo)?);
        let change = client.fetch_change(self.pr).await?;

        let directory = Arc::new(GitHubDirectory::new(client.clone()));
        let tracker = Arc::new(GitHubTracker::new(client.clone()));
        let provider = self
            .clone
            .as_ref()
            .map(|path| Arc::new(GitBlameProvider::Single(path.clone())) as Arc<dyn BlameProvider>);
        let pipeline = Pipeline::from_config(config, directory, tracker, provider)?;

        if self.dry_run {
            let preview = pipeline.preview(&change, &change.owner).await?;
            println!("Matched rules: {}", preview.matched.join(", "));
            print_accounts("Would request reviews from", &preview.assignment.reviewers);
            print_accounts("Would cc", &preview.assignment.ccs);
            pipeline.shutdown().await;
            return Ok(());
        }

        let event = ChangeEvent::revision_created(change.clone(), change.owner.clone());
        let outcome = pipeline.handle(&event).await.settle().await;
        pipeline.shutdown().await;

        match outcome {
            Outcome::NoOp(reason) => {
                println!("Nothing to do for #{}: {:?}", change.number, reason);
            }
            Outcome::Applied(assignment) => {
                info!(pr = change.number, "Assignment applied");
                print_accounts("Requested reviews from", &assignment.reviewers);
                print_accounts("Cc", &assignment.ccs);
            }
            Outcome::Failed(assignment) => {
                anyhow::bail!(
                    "Failed to add {} reviewer(s) and {} cc(s) to #{}",
                    assignment.reviewers.len(),
                    assignment.ccs.len(),
                    change.number
                );
            }
            Outcome::Dispatched { .. } => {
                anyhow::bail!("Assignment for #{} did not finish", change.number);
            }
        }
        Ok(())
    }
}
