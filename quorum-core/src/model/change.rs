//! Change snapshots
//!
//! A [`Change`] is an immutable view of a change under review at the moment an
//! event fired. A new snapshot is produced for every new revision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::{Account, AccountId, Person};

/// How a file was touched by the current revision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    #[default]
    Modified,
    Deleted,
    Renamed,
    Copied,
}

impl ChangeKind {
    /// Whether the parent revision holds lines this change edits
    pub fn has_old_lines(&self) -> bool {
        matches!(self, ChangeKind::Modified | ChangeKind::Deleted)
    }
}

/// Review status of a change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    #[default]
    New,
    Merged,
    Abandoned,
}

impl ChangeStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, ChangeStatus::New)
    }
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeStatus::New => "new",
            ChangeStatus::Merged => "merged",
            ChangeStatus::Abandoned => "abandoned",
        };
        write!(f, "{}", s)
    }
}

/// A file touched by the current revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Path in the new revision (old path for deletions)
    pub path: String,
    /// Previous path for renames and copies
    #[serde(default)]
    pub old_path: Option<String>,
    #[serde(default)]
    pub kind: ChangeKind,
    #[serde(default)]
    pub insertions: u32,
    #[serde(default)]
    pub deletions: u32,
}

impl FileChange {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            old_path: None,
            kind,
            insertions: 0,
            deletions: 0,
        }
    }

    /// Set inserted and deleted line counts
    pub fn with_lines(mut self, insertions: u32, deletions: u32) -> Self {
        self.insertions = insertions;
        self.deletions = deletions;
        self
    }

    /// Set the previous path
    pub fn renamed_from(mut self, old_path: impl Into<String>) -> Self {
        self.old_path = Some(old_path.into());
        self
    }

    /// File extension without the dot, lowercased
    pub fn extension(&self) -> Option<String> {
        let name = self.path.rsplit('/').next().unwrap_or(&self.path);
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
                Some(ext.to_ascii_lowercase())
            }
            _ => None,
        }
    }
}

/// A single label vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelVote {
    pub label: String,
    pub value: i32,
    pub account: AccountId,
}

/// Snapshot of a change under review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    /// Numeric change id
    pub number: u64,
    /// Project the change belongs to
    pub project: String,
    /// Destination branch, short form (`main`)
    pub branch: String,
    /// Change owner
    pub owner: Account,
    #[serde(default)]
    pub author: Person,
    #[serde(default)]
    pub committer: Person,
    #[serde(default)]
    pub commit_message: String,
    /// Commit id of the current revision
    #[serde(default)]
    pub revision: String,
    /// Parent commit ids of the current revision
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub files: Vec<FileChange>,
    #[serde(default)]
    pub status: ChangeStatus,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub work_in_progress: bool,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    /// Accounts already recorded as reviewers
    #[serde(default)]
    pub reviewers: Vec<Account>,
    /// Accounts already recorded as CCs
    #[serde(default)]
    pub ccs: Vec<Account>,
    #[serde(default)]
    pub assignee: Option<Account>,
    #[serde(default)]
    pub labels: Vec<LabelVote>,
    #[serde(default)]
    pub submittable: bool,
    #[serde(default)]
    pub unresolved_comments: u32,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated: DateTime<Utc>,
}

impl Change {
    /// Create a minimal open change
    pub fn new(
        number: u64,
        project: impl Into<String>,
        branch: impl Into<String>,
        owner: Account,
    ) -> Self {
        let now = Utc::now();
        Self {
            number,
            project: project.into(),
            branch: branch.into(),
            owner,
            author: Person::default(),
            committer: Person::default(),
            commit_message: String::new(),
            revision: String::new(),
            parents: Vec::new(),
            files: Vec::new(),
            status: ChangeStatus::New,
            private: false,
            work_in_progress: false,
            topic: None,
            hashtags: Vec::new(),
            reviewers: Vec::new(),
            ccs: Vec::new(),
            assignee: None,
            labels: Vec::new(),
            submittable: false,
            unresolved_comments: 0,
            created: now,
            updated: now,
        }
    }

    /// Add a touched file
    pub fn with_file(mut self, file: FileChange) -> Self {
        self.files.push(file);
        self
    }

    /// Set the current revision and its parents
    pub fn with_revision(mut self, revision: impl Into<String>, parents: Vec<String>) -> Self {
        self.revision = revision.into();
        self.parents = parents;
        self
    }

    /// Set the author (and committer) identity
    pub fn with_author(mut self, author: Person) -> Self {
        self.committer = author.clone();
        self.author = author;
        self
    }

    /// Set the commit message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = message.into();
        self
    }

    /// Record an existing reviewer
    pub fn with_reviewer(mut self, account: Account) -> Self {
        self.reviewers.push(account);
        self
    }

    /// Record an existing CC
    pub fn with_cc(mut self, account: Account) -> Self {
        self.ccs.push(account);
        self
    }

    /// Set the topic
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Add a hashtag
    pub fn with_hashtag(mut self, hashtag: impl Into<String>) -> Self {
        self.hashtags.push(hashtag.into());
        self
    }

    /// Mark the change private
    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    /// Mark the change work-in-progress
    pub fn work_in_progress(mut self) -> Self {
        self.work_in_progress = true;
        self
    }

    /// Full destination ref name
    pub fn ref_name(&self) -> String {
        if self.branch.starts_with("refs/") {
            self.branch.clone()
        } else {
            format!("refs/heads/{}", self.branch)
        }
    }

    /// Touched paths (new paths, plus old paths of renames)
    pub fn paths(&self) -> Vec<&str> {
        let mut paths = Vec::with_capacity(self.files.len());
        for file in &self.files {
            paths.push(file.path.as_str());
            if let Some(old) = file.old_path.as_deref() {
                if old != file.path {
                    paths.push(old);
                }
            }
        }
        paths
    }

    /// Total inserted lines
    pub fn insertions(&self) -> u64 {
        self.files.iter().map(|f| u64::from(f.insertions)).sum()
    }

    /// Total deleted lines
    pub fn deletions(&self) -> u64 {
        self.files.iter().map(|f| u64::from(f.deletions)).sum()
    }

    /// Whether the current revision has exactly one parent
    pub fn has_single_parent(&self) -> bool {
        self.parents.len() == 1
    }

    /// Whether an account is already a reviewer or CC on this change
    pub fn is_participant(&self, id: AccountId) -> bool {
        self.reviewers.iter().chain(self.ccs.iter()).any(|a| a.id == id)
    }

    /// Footer lines (`Key: Value`) of the commit message's last paragraph
    pub fn footers(&self) -> Vec<(String, String)> {
        let message = self.commit_message.trim_end();
        let last_paragraph = message.rsplit("\n\n").next().unwrap_or("");
        // A one-paragraph message is only a subject, never footers
        if last_paragraph.len() == message.len() {
            return Vec::new();
        }

        let mut footers = Vec::new();
        for line in last_paragraph.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty()
                || !key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                continue;
            }
            footers.push((key.to_string(), value.trim().to_string()));
        }
        footers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Account {
        Account::new(1, "carol")
    }

    #[test]
    fn test_ref_name() {
        let change = Change::new(1, "proj", "main", owner());
        assert_eq!(change.ref_name(), "refs/heads/main");

        let change = Change::new(1, "proj", "refs/meta/config", owner());
        assert_eq!(change.ref_name(), "refs/meta/config");
    }

    #[test]
    fn test_paths_include_rename_sources() {
        let change = Change::new(1, "proj", "main", owner())
            .with_file(FileChange::new("src/new.rs", ChangeKind::Renamed).renamed_from("src/old.rs"))
            .with_file(FileChange::new("README.md", ChangeKind::Modified));

        assert_eq!(change.paths(), vec!["src/new.rs", "src/old.rs", "README.md"]);
    }

    #[test]
    fn test_extension() {
        assert_eq!(
            FileChange::new("a/b/c.RS", ChangeKind::Added).extension(),
            Some("rs".to_string())
        );
        assert_eq!(FileChange::new("Makefile", ChangeKind::Added).extension(), None);
        assert_eq!(FileChange::new("a/.gitignore", ChangeKind::Added).extension(), None);
    }

    #[test]
    fn test_line_totals() {
        let change = Change::new(1, "proj", "main", owner())
            .with_file(FileChange::new("a", ChangeKind::Modified).with_lines(10, 2))
            .with_file(FileChange::new("b", ChangeKind::Modified).with_lines(5, 3));
        assert_eq!(change.insertions(), 15);
        assert_eq!(change.deletions(), 5);
    }

    #[test]
    fn test_footers() {
        let change = Change::new(1, "proj", "main", owner()).with_message(
            "Fix the thing\n\nLonger body: with a colon.\n\nBug: 1234\nReviewed-on: https://example.com/1\n",
        );
        let footers = change.footers();
        assert_eq!(
            footers,
            vec![
                ("Bug".to_string(), "1234".to_string()),
                ("Reviewed-on".to_string(), "https://example.com/1".to_string()),
            ]
        );
    }

    #[test]
    fn test_subject_only_has_no_footers() {
        let change = Change::new(1, "proj", "main", owner()).with_message("Bug: in subject");
        assert!(change.footers().is_empty());
    }

    #[test]
    fn test_is_participant() {
        let change = Change::new(1, "proj", "main", owner())
            .with_reviewer(Account::new(2, "alice"))
            .with_cc(Account::new(3, "bob"));
        assert!(change.is_participant(AccountId(2)));
        assert!(change.is_participant(AccountId(3)));
        assert!(!change.is_participant(AccountId(1)));
    }

    #[test]
    fn test_deserialize_minimal_change() {
        let json = r#"{
            "number": 5,
            "project": "demo",
            "branch": "main",
            "owner": {"id": 1, "username": "carol"},
            "files": [{"path": "src/lib.rs"}]
        }"#;
        let change: Change = serde_json::from_str(json).unwrap();
        assert_eq!(change.files[0].kind, ChangeKind::Modified);
        assert_eq!(change.status, ChangeStatus::New);
        assert!(!change.private);
    }
}
