//! Pull requests as changes under review

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{Error, GitHubClient, Result};
use quorum_core::model::{Account, Change, ChangeKind, ChangeStatus, FileChange, Person};

/// One entry of `GET /pulls/{n}/files`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PrFile {
    pub filename: String,
    pub status: String,
    #[serde(default)]
    pub additions: u32,
    #[serde(default)]
    pub deletions: u32,
    #[serde(default)]
    pub previous_filename: Option<String>,
}

impl From<PrFile> for FileChange {
    fn from(file: PrFile) -> Self {
        let kind = match file.status.as_str() {
            "added" => ChangeKind::Added,
            "removed" => ChangeKind::Deleted,
            "renamed" => ChangeKind::Renamed,
            "copied" => ChangeKind::Copied,
            _ => ChangeKind::Modified,
        };
        let change = FileChange::new(file.filename, kind).with_lines(file.additions, file.deletions);
        match file.previous_filename {
            Some(old) => change.renamed_from(old),
            None => change,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GitUser {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CommitDetail {
    #[serde(default)]
    author: Option<GitUser>,
    #[serde(default)]
    committer: Option<GitUser>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ParentRef {
    sha: String,
}

/// `GET /commits/{sha}`
#[derive(Debug, Clone, Deserialize)]
struct Commit {
    commit: CommitDetail,
    #[serde(default)]
    parents: Vec<ParentRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct User {
    pub login: String,
    pub id: u64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<User> for Account {
    fn from(user: User) -> Self {
        let mut account = Account::new(user.id, user.login);
        if let Some(email) = user.email.filter(|e| !e.is_empty()) {
            account = account.with_email(email);
        }
        if let Some(name) = user.name.filter(|n| !n.is_empty()) {
            account = account.with_name(name);
        }
        account
    }
}

/// `GET /pulls/{n}/reviews`
#[derive(Debug, Clone, Deserialize)]
struct Review {
    #[serde(default)]
    user: Option<User>,
}

fn person(user: Option<GitUser>) -> Person {
    user.map(|u| Person::new(u.name, u.email)).unwrap_or_default()
}

impl GitHubClient {
    /// Snapshot a pull request as a change
    ///
    /// Requested reviewers and everyone who already reviewed count as
    /// existing reviewers. Labels become hashtags and drafts are work in
    /// progress.
    pub async fn fetch_change(&self, number: u64) -> Result<Change> {
        debug!(number, "Fetching pull request");

        let pr = self
            .client()
            .pulls(self.owner(), self.repo())
            .get(number)
            .await
            .map_err(|e| match &e {
                octocrab::Error::GitHub { source, .. } if source.message.contains("Not Found") => {
                    Error::PrNotFound(number)
                }
                _ => Error::Api(e),
            })?;

        let owner = pr
            .user
            .as_ref()
            .map(|u| Account::new(u.id.0, u.login.clone()))
            .ok_or_else(|| Error::Other(format!("Pull request #{} has no author", number)))?;

        let mut change = Change::new(number, self.project(), pr.base.ref_field.clone(), owner);
        change.status = match (pr.merged_at, &pr.closed_at) {
            (Some(_), _) => ChangeStatus::Merged,
            (None, Some(_)) => ChangeStatus::Abandoned,
            (None, None) => ChangeStatus::New,
        };
        change.work_in_progress = pr.draft.unwrap_or(false);
        change.topic = Some(pr.head.ref_field.clone());
        change.hashtags = pr
            .labels
            .iter()
            .flatten()
            .map(|label| label.name.clone())
            .collect();
        change.created = pr.created_at.unwrap_or_else(Utc::now);
        change.updated = pr.updated_at.unwrap_or_else(Utc::now);

        let mut reviewers: BTreeMap<u64, Account> = pr
            .requested_reviewers
            .iter()
            .flatten()
            .map(|u| (u.id.0, Account::new(u.id.0, u.login.clone())))
            .collect();
        for user in self.reviewed_by(number).await? {
            reviewers.entry(user.id).or_insert_with(|| user.into());
        }
        change.reviewers = reviewers.into_values().collect();

        let commit: Commit = self
            .get_json(&self.repo_route(&format!("commits/{}", pr.head.sha)))
            .await?;
        change.author = person(commit.commit.author);
        change.committer = person(commit.commit.committer);
        change.commit_message = commit.commit.message;
        change.revision = pr.head.sha.clone();
        change.parents = commit.parents.into_iter().map(|p| p.sha).collect();

        change.files = self.changed_files(number).await?;

        info!(
            number,
            branch = %change.branch,
            files = change.files.len(),
            reviewers = change.reviewers.len(),
            "Fetched pull request"
        );
        Ok(change)
    }

    /// Files touched by a pull request, all pages
    pub async fn changed_files(&self, number: u64) -> Result<Vec<FileChange>> {
        let files: Vec<PrFile> = self
            .get_all(&self.repo_route(&format!("pulls/{}/files", number)))
            .await?;
        Ok(files.into_iter().map(FileChange::from).collect())
    }

    async fn reviewed_by(&self, number: u64) -> Result<Vec<User>> {
        let reviews: Vec<Review> = self
            .get_all(&self.repo_route(&format!("pulls/{}/reviews", number)))
            .await?;
        Ok(reviews.into_iter().filter_map(|r| r.user).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_status_mapping() {
        let json = r#"[
            {"filename": "src/new.rs", "status": "added", "additions": 10, "deletions": 0},
            {"filename": "src/gone.rs", "status": "removed", "additions": 0, "deletions": 4},
            {"filename": "src/b.rs", "status": "renamed", "previous_filename": "src/a.rs"},
            {"filename": "README.md", "status": "changed", "additions": 1, "deletions": 1}
        ]"#;
        let files: Vec<FileChange> = serde_json::from_str::<Vec<PrFile>>(json)
            .unwrap()
            .into_iter()
            .map(FileChange::from)
            .collect();

        assert_eq!(files[0].kind, ChangeKind::Added);
        assert_eq!(files[0].insertions, 10);
        assert_eq!(files[1].kind, ChangeKind::Deleted);
        assert_eq!(files[2].kind, ChangeKind::Renamed);
        assert_eq!(files[2].old_path.as_deref(), Some("src/a.rs"));
        assert_eq!(files[3].kind, ChangeKind::Modified);
    }

    #[test]
    fn test_user_to_account() {
        let user: User =
            serde_json::from_str(r#"{"login": "octocat", "id": 583231, "email": "", "name": "The Octocat"}"#)
                .unwrap();
        let account = Account::from(user);
        assert_eq!(account.id.0, 583231);
        assert_eq!(account.username, "octocat");
        assert!(account.preferred_email().is_none());
        assert!(account.is_named_by("octocat"));
    }
}
