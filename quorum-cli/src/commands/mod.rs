//! CLI command implementations

pub mod assign;
pub mod preview;
pub mod rules;
pub mod score;
pub mod validate;

pub use assign::AssignArgs;
pub use preview::MatchArgs;
pub use rules::RulesArgs;
pub use score::ScoreArgs;
pub use validate::ValidateArgs;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use quorum_core::resolver::MemoryDirectory;
use quorum_core::rules::FileRuleSource;
use quorum_core::{Account, AccountId, Config, RuleCache};
use serde::Deserialize;

/// Local stand-in for an account directory, read from JSON
///
/// ```json
/// { "accounts": [{"id": 1, "username": "alice", "emails": ["alice@example.com"]}],
///   "groups": {"leads": [1]} }
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DirectoryFile {
    accounts: Vec<Account>,
    groups: BTreeMap<String, Vec<u64>>,
}

/// Load a directory file, or an empty directory without one
pub(crate) fn load_directory(path: Option<&Path>) -> anyhow::Result<MemoryDirectory> {
    let Some(path) = path else {
        return Ok(MemoryDirectory::new());
    };
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read directory {}: {}", path.display(), e))?;
    let file: DirectoryFile = serde_json::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse directory {}: {}", path.display(), e))?;

    let directory = file
        .accounts
        .into_iter()
        .fold(MemoryDirectory::new(), |d, account| d.with_account(account));
    Ok(file
        .groups
        .into_iter()
        .fold(directory, |d, (name, ids)| d.with_group(name, ids.into_iter().map(AccountId))))
}

/// Rule cache over the configured rules directory
pub(crate) fn rule_cache(config: &Config) -> anyhow::Result<Arc<RuleCache>> {
    let source = FileRuleSource::new(config.rules.dir()?);
    Ok(Arc::new(RuleCache::new(Arc::new(source), config.automation.merge_filters)))
}

/// Print accounts one per line
pub(crate) fn print_accounts<'a>(title: &str, accounts: impl IntoIterator<Item = &'a Account>) {
    let accounts: Vec<&Account> = accounts.into_iter().collect();
    println!("{} ({}):", title, accounts.len());
    for account in accounts {
        match account.preferred_email() {
            Some(email) => println!("  {} <{}>", account, email),
            None => println!("  {}", account),
        }
    }
}
