//! GitHub users and organisation teams as an account directory

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::pr::User;
use crate::{Error, GitHubClient};
use quorum_core::model::Account;
use quorum_core::AccountDirectory;

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    items: Vec<User>,
}

/// Resolves logins, emails and `org/team` names through the GitHub API
///
/// A bare team name is looked up in the organisation owning the client's
/// repository. GitHub has no notion of inactive users, so every account is
/// active.
#[derive(Debug, Clone)]
pub struct GitHubDirectory {
    client: Arc<GitHubClient>,
}

impl GitHubDirectory {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }

    async fn user(&self, login: &str) -> crate::Result<Option<Account>> {
        match self.client.get_json::<User>(&format!("/users/{}", login)).await {
            Ok(user) => Ok(Some(user.into())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn search_email(&self, email: &str) -> crate::Result<Vec<Account>> {
        let route = format!("/search/users?q={}+in:email", encode(email));
        let result: SearchResult = self.client.get_json(&route).await?;
        Ok(result
            .items
            .into_iter()
            .map(|user| Account::from(user).with_email(email))
            .collect())
    }

    async fn team_members(&self, org: &str, slug: &str) -> crate::Result<Option<Vec<Account>>> {
        let route = format!("/orgs/{}/teams/{}/members", org, slug);
        match self.client.get_all::<User>(&route).await {
            Ok(users) => Ok(Some(users.into_iter().map(Account::from).collect())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn directory_error(e: Error) -> quorum_core::Error {
    quorum_core::Error::Directory(e.to_string())
}

/// Percent-encode a query value
fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Split a group name into organisation and team slug
fn team_of<'a>(group: &'a str, default_org: &'a str) -> (&'a str, &'a str) {
    group.split_once('/').unwrap_or((default_org, group))
}

#[async_trait]
impl AccountDirectory for GitHubDirectory {
    async fn find_accounts(&self, identifier: &str, _ignore_visibility: bool) -> quorum_core::Result<Vec<Account>> {
        let identifier = identifier.trim();
        if identifier.is_empty() || identifier.contains('/') {
            return Ok(Vec::new());
        }
        if identifier.contains('@') {
            return self.find_by_email(identifier).await;
        }
        let found = self.user(identifier).await.map_err(directory_error)?;
        debug!(identifier, found = found.is_some(), "Looked up GitHub user");
        Ok(found.into_iter().collect())
    }

    async fn find_by_email(&self, email: &str) -> quorum_core::Result<Vec<Account>> {
        self.search_email(email).await.map_err(directory_error)
    }

    async fn group_members(&self, group: &str, _project: &str) -> quorum_core::Result<Option<Vec<Account>>> {
        let (org, slug) = team_of(group, self.client.owner());
        self.team_members(org, slug).await.map_err(directory_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_names() {
        assert_eq!(team_of("acme/core", "octo"), ("acme", "core"));
        assert_eq!(team_of("core", "octo"), ("octo", "core"));
    }

    #[test]
    fn test_email_is_encoded() {
        assert_eq!(encode("a+b@example.com"), "a%2Bb%40example.com");
    }
}
