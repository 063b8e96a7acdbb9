//! Rules commands - edit and inspect project rules files

use clap::{Args, Subcommand};
use quorum_core::{Config, ReviewerType, RuleSource};

use super::rule_cache;

/// Project rules management
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// Add a reviewer or CC to a filter, creating the filter if needed
    Add {
        /// Project name
        project: String,

        /// Match expression of the filter (`*` for every change)
        filter: String,

        /// Account or group identifier
        identifier: String,

        /// Add as CC instead of reviewer
        #[arg(long)]
        cc: bool,
    },

    /// Remove a reviewer or CC from a filter
    Remove {
        project: String,
        filter: String,
        identifier: String,

        #[arg(long)]
        cc: bool,
    },

    /// Show a project's own rules and the rules in effect
    Show {
        project: String,
    },
}

fn reviewer_type(cc: bool) -> ReviewerType {
    if cc {
        ReviewerType::Cc
    } else {
        ReviewerType::Reviewer
    }
}

impl RulesArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let cache = rule_cache(config)?;

        match &self.command {
            RulesCommand::Add {
                project,
                filter,
                identifier,
                cc,
            } => {
                let ty = reviewer_type(*cc);
                if cache.add_reviewer(project, filter, identifier, ty).await? {
                    println!("Added {} as {} for \"{}\" in {}", identifier, ty, filter, project);
                } else {
                    println!("{} is already a {} for \"{}\"", identifier, ty, filter);
                }
            }
            RulesCommand::Remove {
                project,
                filter,
                identifier,
                cc,
            } => {
                let ty = reviewer_type(*cc);
                if cache.remove_reviewer(project, filter, identifier, ty).await? {
                    println!("Removed {} as {} for \"{}\" in {}", identifier, ty, filter, project);
                } else {
                    println!("{} is not a {} for \"{}\"", identifier, ty, filter);
                }
            }
            RulesCommand::Show { project } => {
                let own = cache.source().load(project).await?;
                println!("# {} ({})", project, config.rules.dir()?.display());
                println!("{}", own.to_toml()?);

                let effective = cache.rules_for(project).await;
                println!("# In effect ({} filter(s))", effective.len());
                for rule in effective.iter() {
                    println!("{}", rule);
                    if !rule.reviewers.is_empty() {
                        println!("\treviewers: {}", rule.reviewers.join(", "));
                    }
                    if !rule.ccs.is_empty() {
                        println!("\tccs: {}", rule.ccs.join(", "));
                    }
                }
            }
        }
        Ok(())
    }
}
