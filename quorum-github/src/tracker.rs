//! Review requests on pull requests

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Error, GitHubClient};
use quorum_core::model::{Account, Change};
use quorum_core::{ChangeTracker, IdentityContext};

#[derive(Debug, Serialize)]
struct ReviewRequest<'a> {
    reviewers: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

/// Response bodies are not needed
#[derive(Debug, Deserialize)]
struct Ignored {}

/// Adds reviewers as review requests and CCs as a mention comment
///
/// GitHub acts as the token owner; the identity of a task is only logged.
#[derive(Debug, Clone)]
pub struct GitHubTracker {
    client: Arc<GitHubClient>,
}

impl GitHubTracker {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }

    fn check_project(&self, change: &Change) -> crate::Result<()> {
        let project = self.client.project();
        if change.project == project {
            Ok(())
        } else {
            Err(Error::WrongRepository {
                project: change.project.clone(),
                repository: project,
            })
        }
    }

    async fn comment(&self, number: u64, body: &str) -> crate::Result<()> {
        let route = self.client.repo_route(&format!("issues/{}/comments", number));
        let _: Ignored = self.client.post_json(&route, &CommentBody { body }).await?;
        Ok(())
    }
}

fn tracker_error(e: Error) -> quorum_core::Error {
    quorum_core::Error::Tracker(e.to_string())
}

/// Comment text mentioning CC accounts
pub fn cc_comment(ccs: &[Account]) -> String {
    let mentions: Vec<String> = ccs.iter().map(|a| format!("@{}", a.username)).collect();
    format!("cc {}", mentions.join(" "))
}

#[async_trait]
impl ChangeTracker for GitHubTracker {
    async fn add_reviewers_and_ccs(
        &self,
        change: &Change,
        reviewers: &[Account],
        ccs: &[Account],
        identity: &IdentityContext,
    ) -> quorum_core::Result<()> {
        self.check_project(change).map_err(tracker_error)?;
        debug!(change = change.number, %identity, "Requesting reviews");

        if !reviewers.is_empty() {
            let route = self
                .client
                .repo_route(&format!("pulls/{}/requested_reviewers", change.number));
            let request = ReviewRequest {
                reviewers: reviewers.iter().map(|a| a.username.as_str()).collect(),
            };
            let _: Ignored = self
                .client
                .post_json(&route, &request)
                .await
                .map_err(tracker_error)?;
        }

        if !ccs.is_empty() {
            self.comment(change.number, &cc_comment(ccs))
                .await
                .map_err(tracker_error)?;
        }

        info!(
            change = change.number,
            reviewers = reviewers.len(),
            ccs = ccs.len(),
            "Requested reviews on GitHub"
        );
        Ok(())
    }

    async fn post_message(&self, change: &Change, message: &str, identity: &IdentityContext) -> quorum_core::Result<()> {
        self.check_project(change).map_err(tracker_error)?;
        debug!(change = change.number, %identity, "Posting comment");
        self.comment(change.number, message).await.map_err(tracker_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cc_comment_mentions_everyone() {
        let ccs = vec![Account::new(1, "alice"), Account::new(2, "bob")];
        assert_eq!(cc_comment(&ccs), "cc @alice @bob");
    }
}
