//! Validate command - check a project rules file

use std::path::PathBuf;

use clap::Args;
use quorum_core::rules::validate_rules;
use quorum_core::ProjectRules;

/// Check a `reviewers.toml` file without saving anything
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the rules file
    path: PathBuf,
}

impl ValidateArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", self.path.display(), e))?;
        let rules = ProjectRules::from_toml(&contents)?;

        let problems = validate_rules(&rules);
        if problems.is_empty() {
            println!("{}: {} filter(s) OK", self.path.display(), rules.filters.len());
            if let Some(parent) = &rules.parent {
                println!("  inherits from {}", parent);
            }
            return Ok(());
        }

        for problem in &problems {
            eprintln!("{}: {}", self.path.display(), problem);
        }
        anyhow::bail!("{} problem(s) found", problems.len())
    }
}
