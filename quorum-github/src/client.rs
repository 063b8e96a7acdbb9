//! GitHub API client using octocrab

use std::future::Future;

use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::{Error, Result};
use quorum_core::Secrets;

/// GitHub API access scoped to one repository
pub struct GitHubClient {
    client: Octocrab,
    owner: String,
    repo: String,
}

impl GitHubClient {
    /// Create a client for `owner/repo`
    ///
    /// The token comes from `GITHUB_TOKEN` or `~/.config/quorum/secrets.toml`.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Result<Self> {
        let secrets = Secrets::load().map_err(|e| Error::Auth(e.to_string()))?;
        let token = secrets.github_token().ok_or_else(|| {
            Error::Auth(
                "GitHub token not found. Set GITHUB_TOKEN or add it to ~/.config/quorum/secrets.toml"
                    .to_string(),
            )
        })?;
        Self::with_token(owner, repo, token)
    }

    pub fn with_token(owner: impl Into<String>, repo: impl Into<String>, token: String) -> Result<Self> {
        let owner = owner.into();
        let repo = repo.into();
        let client = Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(|e| Error::Auth(format!("Failed to create GitHub client: {}", e)))?;

        info!(owner = %owner, repo = %repo, "Created GitHub client");
        Ok(Self { client, owner, repo })
    }

    /// Create a client from `owner/repo`, an https URL or an ssh remote
    pub fn from_url(url: &str) -> Result<Self> {
        let (owner, repo) = parse_github_url(url)?;
        Self::new(owner, repo)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// `owner/repo`, used as the project name of changes
    pub fn project(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn client(&self) -> &Octocrab {
        &self.client
    }

    /// Check the token can see the repository
    pub async fn test_connection(&self) -> Result<()> {
        debug!(owner = %self.owner, repo = %self.repo, "Testing GitHub connection");
        self.client
            .repos(&self.owner, &self.repo)
            .get()
            .await
            .map_err(|e| match e {
                octocrab::Error::GitHub { ref source, .. } if source.message.contains("Bad credentials") => {
                    Error::Auth("Invalid GitHub token".to_string())
                }
                other => Error::Api(other),
            })?;
        info!("GitHub connection successful");
        Ok(())
    }

    /// GET a route below the API root
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, route: &str) -> Result<T> {
        debug!(route, "GET");
        Ok(self.client.get(route, None::<&()>).await?)
    }

    /// GET every page of a list route
    pub(crate) async fn get_all<T: DeserializeOwned>(&self, route: &str) -> Result<Vec<T>> {
        collect_pages(|page| {
            let route = paged(route, page);
            async move { self.get_json::<Vec<T>>(&route).await }
        })
        .await
    }

    /// POST a JSON body to a route below the API root
    pub(crate) async fn post_json<B: Serialize, T: DeserializeOwned>(&self, route: &str, body: &B) -> Result<T> {
        debug!(route, "POST");
        Ok(self.client.post(route, Some(body)).await?)
    }

    /// Route below `/repos/{owner}/{repo}`
    pub(crate) fn repo_route(&self, rest: &str) -> String {
        format!("/repos/{}/{}/{}", self.owner, self.repo, rest.trim_start_matches('/'))
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

/// Split a repository reference into owner and name
pub fn parse_github_url(url: &str) -> Result<(String, String)> {
    let invalid = || Error::Parse(format!("Invalid repository: {}. Expected owner/repo", url));

    let path = if url.starts_with("https://") || url.starts_with("http://") {
        url::Url::parse(url)
            .map_err(|e| Error::Parse(e.to_string()))?
            .path()
            .to_string()
    } else if let Some(rest) = url.strip_prefix("git@") {
        rest.split_once(':').map(|(_, path)| path.to_string()).ok_or_else(invalid)?
    } else if !url.contains(':') {
        url.to_string()
    } else {
        return Err(invalid());
    };

    let mut parts = path
        .trim_matches('/')
        .trim_end_matches(".git")
        .split('/')
        .filter(|p| !p.is_empty());
    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) => Ok((owner.to_string(), repo.to_string())),
        _ => Err(invalid()),
    }
}

/// Items per page requested from list routes
pub(crate) const PAGE_SIZE: usize = 100;

fn paged(route: &str, page: u32) -> String {
    let sep = if route.contains('?') { '&' } else { '?' };
    format!("{}{}per_page={}&page={}", route, sep, PAGE_SIZE, page)
}

/// Fetch numbered pages until one comes back short
pub(crate) async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut items = Vec::new();
    for page in 1u32.. {
        let batch = fetch(page).await?;
        let last = batch.len() < PAGE_SIZE;
        items.extend(batch);
        if last {
            break;
        }
    }
    Ok(items)
}
