//! Identifier resolution: account handles and group names to active accounts

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::model::{Account, AccountId, Change};
use crate::Result;

/// Lookup of accounts and group membership
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Accounts matching an identifier (id, username or email)
    ///
    /// With `ignore_visibility = false` only accounts visible to the caller
    /// are returned.
    async fn find_accounts(&self, identifier: &str, ignore_visibility: bool) -> Result<Vec<Account>>;

    /// Accounts owning an email address
    async fn find_by_email(&self, email: &str) -> Result<Vec<Account>>;

    /// Members of a group as seen from a project, `None` if no such group
    async fn group_members(&self, group: &str, project: &str) -> Result<Option<Vec<Account>>>;
}

/// Outcome of resolving one identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Exactly one active account
    Account(Account),
    /// Active members of a group
    Group { name: String, members: Vec<Account> },
    /// Neither an account nor a group
    Unresolved,
}

/// Turns identifiers into concrete accounts
#[derive(Clone)]
pub struct Resolver {
    directory: Arc<dyn AccountDirectory>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

impl Resolver {
    pub fn new(directory: Arc<dyn AccountDirectory>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Arc<dyn AccountDirectory> {
        &self.directory
    }

    /// Resolve a single identifier: account first, then group
    ///
    /// A unique but inactive account is not a match and falls through to the
    /// group lookup.
    pub async fn resolve_one(
        &self,
        identifier: &str,
        project: &str,
        ignore_visibility: bool,
    ) -> Result<Resolution> {
        let accounts = self
            .directory
            .find_accounts(identifier, ignore_visibility)
            .await?;
        if let [account] = accounts.as_slice() {
            if account.active {
                return Ok(Resolution::Account(account.clone()));
            }
            warn!(project, identifier, "Account is inactive");
        } else if accounts.len() > 1 {
            debug!(project, identifier, matches = accounts.len(), "Identifier is ambiguous");
        }

        match self.directory.group_members(identifier, project).await? {
            Some(members) => Ok(Resolution::Group {
                name: identifier.to_string(),
                members: members.into_iter().filter(|a| a.active).collect(),
            }),
            None => Ok(Resolution::Unresolved),
        }
    }

    /// Resolve identifiers to active accounts
    ///
    /// The change owner is never returned, nor is the uploader if given.
    /// Failures never abort the batch: each affected identifier is logged and
    /// dropped.
    pub async fn resolve(
        &self,
        identifiers: &[String],
        change: &Change,
        uploader: Option<AccountId>,
        ignore_visibility: bool,
    ) -> BTreeSet<Account> {
        let project = change.project.as_str();
        let excluded = |account: &Account| account.id == change.owner.id || Some(account.id) == uploader;
        let mut resolved = BTreeSet::new();

        for identifier in identifiers {
            match self.resolve_one(identifier, project, ignore_visibility).await {
                Ok(Resolution::Account(account)) => {
                    if !excluded(&account) {
                        resolved.insert(account);
                    }
                }
                Ok(Resolution::Group { name, members }) => {
                    debug!(change = change.number, project, group = %name, members = members.len(), "Expanded group");
                    resolved.extend(members.into_iter().filter(|a| !excluded(a)));
                }
                Ok(Resolution::Unresolved) => {
                    warn!(
                        change = change.number,
                        project,
                        identifier = %identifier,
                        "Reviewer is neither an account nor a group"
                    );
                }
                Err(e) => {
                    error!(
                        change = change.number,
                        project,
                        identifier = %identifier,
                        error = %e,
                        "Failed to resolve reviewer"
                    );
                }
            }
        }

        resolved
    }
}

#[derive(Debug, Clone, Default)]
struct Group {
    members: Vec<AccountId>,
    /// Projects the group is visible from; `None` means everywhere
    projects: Option<HashSet<String>>,
}

/// Account directory held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    accounts: Vec<Account>,
    hidden: HashSet<AccountId>,
    groups: HashMap<String, Group>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, account: Account) -> Self {
        self.accounts.push(account);
        self
    }

    /// Add an account that is only found when visibility is ignored
    pub fn with_hidden_account(mut self, account: Account) -> Self {
        self.hidden.insert(account.id);
        self.accounts.push(account);
        self
    }

    /// Add a group visible from every project
    pub fn with_group(mut self, name: impl Into<String>, members: impl IntoIterator<Item = AccountId>) -> Self {
        self.groups.insert(
            name.into(),
            Group {
                members: members.into_iter().collect(),
                projects: None,
            },
        );
        self
    }

    /// Restrict a group's visibility to the given projects
    pub fn visible_in(mut self, group: &str, projects: impl IntoIterator<Item = impl Into<String>>) -> Self {
        if let Some(g) = self.groups.get_mut(group) {
            g.projects = Some(projects.into_iter().map(Into::into).collect());
        }
        self
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }
}

#[async_trait]
impl AccountDirectory for MemoryDirectory {
    async fn find_accounts(&self, identifier: &str, ignore_visibility: bool) -> Result<Vec<Account>> {
        Ok(self
            .accounts
            .iter()
            .filter(|a| ignore_visibility || !self.hidden.contains(&a.id))
            .filter(|a| {
                let wanted = identifier.trim();
                a.id.to_string() == wanted
                    || a.username.eq_ignore_ascii_case(wanted)
                    || a.has_email(wanted)
            })
            .cloned()
            .collect())
    }

    async fn find_by_email(&self, email: &str) -> Result<Vec<Account>> {
        Ok(self
            .accounts
            .iter()
            .filter(|a| a.has_email(email))
            .cloned()
            .collect())
    }

    async fn group_members(&self, group: &str, project: &str) -> Result<Option<Vec<Account>>> {
        let Some(g) = self.groups.get(group) else {
            return Ok(None);
        };
        if let Some(projects) = &g.projects {
            if !projects.contains(project) {
                return Ok(None);
            }
        }
        Ok(Some(
            g.members
                .iter()
                .filter_map(|id| self.account(*id).cloned())
                .collect(),
        ))
    }
}
