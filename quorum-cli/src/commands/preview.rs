//! Match command - dry run of the rules against a change

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use quorum_core::blame::{BlameScorer, GitBlameProvider};
use quorum_core::dispatch::MemoryTracker;
use quorum_core::{AccountDirectory, Change, Config, Dispatcher, Pipeline, Resolver};

use super::{load_directory, print_accounts, rule_cache};

/// Show which rules match a change and whom they would add
#[derive(Args, Debug)]
pub struct MatchArgs {
    /// Change snapshot as JSON
    #[arg(short, long)]
    change: PathBuf,

    /// Project to take rules from (defaults to the change's project)
    #[arg(short, long)]
    project: Option<String>,

    /// Accounts and groups as JSON
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Username of the uploader (defaults to the change owner)
    #[arg(short, long)]
    uploader: Option<String>,

    /// Blame the change's revision in this repository
    #[arg(long)]
    repo: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

impl MatchArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let contents = std::fs::read_to_string(&self.change)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", self.change.display(), e))?;
        let mut change: Change = serde_json::from_str(&contents)?;
        if let Some(project) = &self.project {
            change.project = project.clone();
        }

        let directory = load_directory(self.directory.as_deref())?;
        let uploader = match &self.uploader {
            Some(name) => directory
                .accounts()
                .iter()
                .find(|a| a.is_named_by(name))
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("Unknown uploader {}", name))?,
            None => change.owner.clone(),
        };
        let directory: Arc<dyn AccountDirectory> = Arc::new(directory);

        let dispatcher = Dispatcher::direct(Arc::new(MemoryTracker::new()), Duration::from_secs(1));
        let mut pipeline = Pipeline::new(rule_cache(config)?, Resolver::new(directory.clone()), dispatcher)
            .with_automation(config.automation.clone())
            .with_scope(config.match_scope());
        if let Some(repo) = &self.repo {
            let scorer = BlameScorer::new(Arc::new(GitBlameProvider::Single(repo.clone())), directory)
                .with_max_reviewers(config.blame.max_reviewers)
                .with_ignore_pattern(&config.blame.ignore_file_pattern)?;
            pipeline = pipeline.with_blame(scorer);
        }

        let preview = pipeline.preview(&change, &uploader).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&preview)?);
            return Ok(());
        }

        println!("Change {} on {} ({})", change.number, change.branch, change.project);
        println!();
        println!("Matched rules ({}):", preview.matched.len());
        for filter in &preview.matched {
            println!("  {}", filter);
        }
        println!();
        println!("Reviewer identifiers: {}", preview.candidates.reviewers.join(", "));
        println!("CC identifiers: {}", preview.candidates.ccs.join(", "));
        if !preview.blame.is_empty() {
            println!();
            print_accounts("Blame reviewers", &preview.blame);
        }
        println!();
        print_accounts("Would add as reviewers", &preview.assignment.reviewers);
        print_accounts("Would add as CCs", &preview.assignment.ccs);

        Ok(())
    }
}
