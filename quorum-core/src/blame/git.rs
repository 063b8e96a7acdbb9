//! git2-backed blame source

use std::path::{Path, PathBuf};

use git2::{BlameOptions, Commit, Delta, DiffFindOptions, DiffOptions, Patch, Repository};

use super::{BlameProvider, BlameSource, FileEdits};
use crate::model::{Account, Change, ChangeKind, FileChange, Person};
use crate::{Error, Result};

/// Blame source over an open git repository
pub struct GitBlameSource {
    repo: Repository,
}

impl std::fmt::Debug for GitBlameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitBlameSource")
            .field("path", &self.repo.path())
            .finish_non_exhaustive()
    }
}

impl GitBlameSource {
    /// Open the repository containing `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let repo = Repository::discover(path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                Error::Config(format!("Not a git repository: {}", path.display()))
            } else {
                Error::Git(e)
            }
        })?;
        Ok(Self { repo })
    }

    fn commit(&self, revision: &str) -> Result<Commit<'_>> {
        Ok(self.repo.revparse_single(revision)?.peel_to_commit()?)
    }

    /// Snapshot a local commit as a change owned by `owner`
    ///
    /// The branch is the one checked out; files are listed only for
    /// single-parent commits.
    pub fn change_at(&self, project: &str, revision: &str, owner: Account) -> Result<Change> {
        let commit = self.commit(revision)?;
        let id = commit.id().to_string();
        let parents: Vec<String> = commit.parent_ids().map(|p| p.to_string()).collect();
        let branch = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.shorthand().map(str::to_string))
            .unwrap_or_else(|| "HEAD".to_string());
        let person = |s: git2::Signature<'_>| Person::new(s.name().unwrap_or_default(), s.email().unwrap_or_default());

        let mut change = Change::new(0, project, branch, owner)
            .with_revision(id.clone(), parents.clone())
            .with_author(person(commit.author()))
            .with_message(commit.message().unwrap_or_default());
        change.committer = person(commit.committer());

        if let [parent] = parents.as_slice() {
            for (edits, current) in self.file_edits(&id, parent)? {
                let mut file = FileChange::new(current, edits.kind);
                if matches!(edits.kind, ChangeKind::Renamed | ChangeKind::Copied) {
                    file.old_path = Some(edits.path);
                }
                change = change.with_file(file);
            }
        }
        Ok(change)
    }

    /// Edited regions per file plus each file's path in `revision`
    ///
    /// Renames and copies are detected, so a moved file is one delta rather
    /// than a deletion and an addition.
    fn file_edits(&self, revision: &str, parent: &str) -> Result<Vec<(FileEdits, String)>> {
        let new_tree = self.commit(revision)?.tree()?;
        let old_tree = self.commit(parent)?.tree()?;

        let mut opts = DiffOptions::new();
        opts.context_lines(0);
        let mut diff = self
            .repo
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut opts))?;
        diff.find_similar(Some(DiffFindOptions::new().renames(true).copies(true)))?;

        let mut edits = Vec::new();
        for (idx, delta) in diff.deltas().enumerate() {
            let kind = match delta.status() {
                Delta::Added => ChangeKind::Added,
                Delta::Deleted => ChangeKind::Deleted,
                Delta::Renamed => ChangeKind::Renamed,
                Delta::Copied => ChangeKind::Copied,
                _ => ChangeKind::Modified,
            };
            let old_path = delta.old_file().path().and_then(|p| p.to_str());
            let new_path = delta.new_file().path().and_then(|p| p.to_str());
            let (Some(path), Some(current)) = (old_path.or(new_path), new_path.or(old_path)) else {
                continue;
            };

            let mut regions = Vec::new();
            if let Some(patch) = Patch::from_diff(&diff, idx)? {
                for hunk_idx in 0..patch.num_hunks() {
                    let (hunk, _) = patch.hunk(hunk_idx)?;
                    if hunk.old_lines() > 0 {
                        regions.push((hunk.old_start(), hunk.old_lines()));
                    }
                }
            }

            edits.push((
                FileEdits {
                    path: path.to_string(),
                    kind,
                    regions,
                },
                current.to_string(),
            ));
        }
        Ok(edits)
    }
}

impl BlameSource for GitBlameSource {
    fn parent_count(&self, revision: &str) -> Result<usize> {
        Ok(self.commit(revision)?.parent_count())
    }

    fn parent(&self, revision: &str) -> Result<String> {
        Ok(self.commit(revision)?.parent_id(0)?.to_string())
    }

    fn diff(&self, revision: &str, parent: &str) -> Result<Vec<FileEdits>> {
        Ok(self
            .file_edits(revision, parent)?
            .into_iter()
            .map(|(edits, _)| edits)
            .collect())
    }

    fn blame(&self, path: &str, revision: &str) -> Result<Vec<String>> {
        let mut opts = BlameOptions::new();
        opts.newest_commit(self.commit(revision)?.id());
        let blame = self.repo.blame_file(Path::new(path), Some(&mut opts))?;

        let mut emails = Vec::new();
        for hunk in blame.iter() {
            let signature = hunk.final_signature();
            let email = signature.email().unwrap_or_default().to_string();
            for _ in 0..hunk.lines_in_hunk() {
                emails.push(email.clone());
            }
        }
        Ok(emails)
    }
}

/// Locates the repository of a change on disk
#[derive(Debug, Clone)]
pub enum GitBlameProvider {
    /// Every change lives in this one repository
    Single(PathBuf),
    /// `<root>/<project>` or `<root>/<project>.git`
    Projects(PathBuf),
}

impl GitBlameProvider {
    fn repo_path(&self, project: &str) -> PathBuf {
        match self {
            GitBlameProvider::Single(path) => path.clone(),
            GitBlameProvider::Projects(root) => {
                let bare = root.join(format!("{}.git", project));
                if bare.exists() {
                    bare
                } else {
                    root.join(project)
                }
            }
        }
    }
}

impl BlameProvider for GitBlameProvider {
    fn open(&self, change: &Change) -> Result<Box<dyn BlameSource>> {
        Ok(Box::new(GitBlameSource::open(self.repo_path(&change.project))?))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use git2::Signature;
    use std::fs;
    use tempfile::TempDir;

    /// Commit the given files on top of HEAD as `author`
    pub(crate) fn commit_files(
        repo: &Repository,
        author: (&str, &str),
        files: &[(&str, &str)],
        message: &str,
    ) -> git2::Oid {
        let workdir = repo.workdir().unwrap().to_path_buf();
        let mut index = repo.index().unwrap();
        for (path, contents) in files {
            let full = workdir.join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&full, contents).unwrap();
            index.add_path(Path::new(path)).unwrap();
        }
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now(author.0, author.1).unwrap();
        let parents: Vec<Commit> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    pub(crate) fn remove_file(repo: &Repository, author: (&str, &str), path: &str) -> git2::Oid {
        let workdir = repo.workdir().unwrap().to_path_buf();
        fs::remove_file(workdir.join(path)).unwrap();
        let mut index = repo.index().unwrap();
        index.remove_path(Path::new(path)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now(author.0, author.1).unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "remove", &tree, &[&head])
            .unwrap()
    }

    const ALICE: (&str, &str) = ("Alice", "alice@example.com");
    const BOB: (&str, &str) = ("Bob", "bob@example.com");
    const CAROL: (&str, &str) = ("Carol", "carol@example.com");

    #[test]
    fn test_diff_and_blame() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        commit_files(&repo, ALICE, &[("a.txt", "1\n2\n3\n4\n")], "alice");
        commit_files(&repo, BOB, &[("a.txt", "1\n2\nB3\n4\n")], "bob");
        let parent = commit_files(&repo, ALICE, &[("new.txt", "x\n")], "more");
        let head = commit_files(&repo, CAROL, &[("a.txt", "C1\n2\nC3\n4\n"), ("b.txt", "b\n")], "carol");

        let source = GitBlameSource::open(dir.path()).unwrap();
        let head = head.to_string();
        assert_eq!(source.parent_count(&head).unwrap(), 1);
        assert_eq!(source.parent(&head).unwrap(), parent.to_string());

        let edits = source.diff(&head, &parent.to_string()).unwrap();
        let a = edits.iter().find(|e| e.path == "a.txt").unwrap();
        assert_eq!(a.kind, ChangeKind::Modified);
        assert_eq!(a.old_lines().collect::<Vec<_>>(), vec![1, 3]);
        let b = edits.iter().find(|e| e.path == "b.txt").unwrap();
        assert_eq!(b.kind, ChangeKind::Added);
        assert!(b.regions.is_empty());

        let emails = source.blame("a.txt", &parent.to_string()).unwrap();
        assert_eq!(
            emails,
            vec![
                "alice@example.com",
                "alice@example.com",
                "bob@example.com",
                "alice@example.com"
            ]
        );
    }

    #[test]
    fn test_deleted_file_covers_all_lines() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let parent = commit_files(&repo, BOB, &[("gone.txt", "a\nb\n"), ("keep.txt", "k\n")], "bob");
        let head = remove_file(&repo, CAROL, "gone.txt");

        let source = GitBlameSource::open(dir.path()).unwrap();
        let edits = source.diff(&head.to_string(), &parent.to_string()).unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].kind, ChangeKind::Deleted);
        assert_eq!(edits[0].old_lines().collect::<Vec<_>>(), vec![1, 2]);
    }

    /// Stage a pure move of `from` to `to` and commit it as `author`
    pub(crate) fn rename_file(repo: &Repository, author: (&str, &str), from: &str, to: &str) -> git2::Oid {
        let workdir = repo.workdir().unwrap().to_path_buf();
        fs::rename(workdir.join(from), workdir.join(to)).unwrap();
        let mut index = repo.index().unwrap();
        index.remove_path(Path::new(from)).unwrap();
        index.add_path(Path::new(to)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now(author.0, author.1).unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "rename", &tree, &[&head])
            .unwrap()
    }

    #[test]
    fn test_rename_is_one_delta() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let body: String = (1..=10).map(|n| format!("line {n}\n")).collect();
        let parent = commit_files(&repo, BOB, &[("old.txt", body.as_str())], "bob");
        let head = rename_file(&repo, CAROL, "old.txt", "new.txt");

        let source = GitBlameSource::open(dir.path()).unwrap();
        let edits = source.diff(&head.to_string(), &parent.to_string()).unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].kind, ChangeKind::Renamed);
        assert_eq!(edits[0].path, "old.txt");
        assert!(edits[0].regions.is_empty());

        let change = source.change_at("demo", "HEAD", Account::new(9, "carol")).unwrap();
        assert_eq!(change.files.len(), 1);
        assert_eq!(change.files[0].path, "new.txt");
        assert_eq!(change.files[0].old_path.as_deref(), Some("old.txt"));
    }

    #[test]
    fn test_root_commit_has_no_parent() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let root = commit_files(&repo, ALICE, &[("a.txt", "1\n")], "root");

        let source = GitBlameSource::open(dir.path()).unwrap();
        assert_eq!(source.parent_count(&root.to_string()).unwrap(), 0);
        assert!(source.parent(&root.to_string()).is_err());
    }

    #[test]
    fn test_change_at_snapshots_commit() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let parent = commit_files(&repo, ALICE, &[("a.txt", "1\n")], "first");
        let head = commit_files(&repo, BOB, &[("a.txt", "2\n"), ("src/b.rs", "b\n")], "Second\n\nBug: 12\n");

        let source = GitBlameSource::open(dir.path()).unwrap();
        let change = source.change_at("demo", "HEAD", Account::new(9, "owner")).unwrap();
        assert_eq!(change.revision, head.to_string());
        assert_eq!(change.parents, vec![parent.to_string()]);
        assert_eq!(change.author.email, "bob@example.com");
        assert_eq!(change.paths(), vec!["a.txt", "src/b.rs"]);
        assert_eq!(change.footers(), vec![("Bug".to_string(), "12".to_string())]);
    }

    #[test]
    fn test_open_non_git_dir() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(GitBlameSource::open(dir.path()), Err(Error::Config(_))));
    }
}
