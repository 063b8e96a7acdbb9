//! Where project rules are stored

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::ProjectRules;
use crate::Result;

/// File name of a project's rules inside the rules directory
pub const RULES_FILE_NAME: &str = "reviewers.toml";

/// Storage backend for project rules
#[async_trait]
pub trait RuleSource: Send + Sync {
    /// Load a project's own rules (no inheritance)
    ///
    /// A project without rules yields an empty [`ProjectRules`].
    async fn load(&self, project: &str) -> Result<ProjectRules>;

    /// Persist a project's rules
    async fn save(&self, project: &str, rules: &ProjectRules) -> Result<()>;
}

/// Rules stored as `<dir>/<project>/reviewers.toml`
#[derive(Debug, Clone)]
pub struct FileRuleSource {
    dir: PathBuf,
}

impl FileRuleSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a project's rules file
    pub fn path_for(&self, project: &str) -> PathBuf {
        self.dir.join(project).join(RULES_FILE_NAME)
    }
}

#[async_trait]
impl RuleSource for FileRuleSource {
    async fn load(&self, project: &str) -> Result<ProjectRules> {
        let path = self.path_for(project);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                debug!(project, path = %path.display(), "Loaded rules file");
                ProjectRules::from_toml(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProjectRules::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, project: &str, rules: &ProjectRules) -> Result<()> {
        let path = self.path_for(project);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, rules.to_toml()?).await?;
        debug!(project, path = %path.display(), "Wrote rules file");
        Ok(())
    }
}

/// In-memory rules, for tests and direct mode
#[derive(Debug, Default)]
pub struct MemoryRuleSource {
    projects: RwLock<HashMap<String, ProjectRules>>,
}

impl MemoryRuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a project's rules
    pub fn with_project(mut self, project: impl Into<String>, rules: ProjectRules) -> Self {
        self.projects.get_mut().insert(project.into(), rules);
        self
    }
}

#[async_trait]
impl RuleSource for MemoryRuleSource {
    async fn load(&self, project: &str) -> Result<ProjectRules> {
        Ok(self
            .projects
            .read()
            .await
            .get(project)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, project: &str, rules: &ProjectRules) -> Result<()> {
        self.projects
            .write()
            .await
            .insert(project.to_string(), rules.clone());
        Ok(())
    }
}
