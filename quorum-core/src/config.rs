//! Configuration management for Quorum
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (QUORUM_*)
//! 3. Config file (~/.config/quorum/config.toml)
//! 4. Default values

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dispatch::DispatchMode;
use crate::query::MatchScope;
use crate::{Error, Result};

/// Event handling switches
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Skip work-in-progress changes
    pub ignore_wip: bool,

    /// Skip private changes
    pub ignore_private: bool,

    /// Never add reviewers automatically; suggestions still work
    pub suggest_only: bool,

    /// Union rules across the whole project ancestry
    pub merge_filters: bool,

    /// Post a message listing the matched rules before adding reviewers
    pub comment: bool,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            ignore_wip: true,
            ignore_private: true,
            suggest_only: false,
            merge_filters: false,
            comment: false,
        }
    }
}

/// Blame-based reviewer selection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlameConfig {
    pub enabled: bool,

    /// Number of top-scoring authors to add
    pub max_reviewers: usize,

    /// Files whose path matches this regex are not blamed (empty disables)
    pub ignore_file_pattern: String,
}

impl Default for BlameConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_reviewers: crate::blame::DEFAULT_MAX_REVIEWERS,
            ignore_file_pattern: String::new(),
        }
    }
}

/// Work queue settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub mode: DispatchMode,

    /// Worker tasks in scheduled mode
    pub workers: usize,

    /// Pending tasks before `dispatch` waits for room
    pub queue_capacity: usize,

    /// Bound on every remote call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Scheduled,
            workers: 4,
            queue_capacity: 64,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Where per-project rules live
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Directory holding `<project>/reviewers.toml`; `~/` is expanded
    pub dir: Option<PathBuf>,
}

impl RulesConfig {
    /// Effective rules directory
    ///
    /// Defaults to `~/.config/quorum/projects`.
    pub fn dir(&self) -> Result<PathBuf> {
        match &self.dir {
            Some(dir) => Ok(expand_home(dir)),
            None => dirs::config_dir()
                .map(|p| p.join("quorum").join("projects"))
                .ok_or_else(|| Error::Config("Could not determine rules directory".to_string())),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub automation: AutomationConfig,
    pub blame: BlameConfig,
    pub dispatch: DispatchConfig,
    pub rules: RulesConfig,

    /// Named destinations for the `destination` operator
    pub destinations: BTreeMap<String, Vec<String>>,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub rules_dir: Option<PathBuf>,
    pub dispatch_mode: Option<DispatchMode>,
    pub blame: Option<bool>,
    pub max_reviewers: Option<usize>,
    pub comment: Option<bool>,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/quorum/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("quorum").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - QUORUM_IGNORE_WIP, QUORUM_IGNORE_PRIVATE, QUORUM_SUGGEST_ONLY,
    ///   QUORUM_MERGE_FILTERS, QUORUM_COMMENT: booleans
    /// - QUORUM_BLAME: enable blame scoring
    /// - QUORUM_BLAME_MAX_REVIEWERS: number of blame reviewers
    /// - QUORUM_DISPATCH_MODE: `scheduled` or `direct`
    /// - QUORUM_WORKERS: worker count
    /// - QUORUM_TIMEOUT: remote call timeout (`30s`, `2m`)
    /// - QUORUM_RULES_DIR: rules directory
    pub fn with_env_overrides(self) -> Self {
        self.with_vars(|name| std::env::var(name).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |name: &str, target: &mut bool| {
            if let Some(value) = var(name) {
                match parse_bool(&value) {
                    Some(b) => *target = b,
                    None => warn!(variable = name, value = %value, "Ignoring invalid boolean"),
                }
            }
        };

        flag("QUORUM_IGNORE_WIP", &mut self.automation.ignore_wip);
        flag("QUORUM_IGNORE_PRIVATE", &mut self.automation.ignore_private);
        flag("QUORUM_SUGGEST_ONLY", &mut self.automation.suggest_only);
        flag("QUORUM_MERGE_FILTERS", &mut self.automation.merge_filters);
        flag("QUORUM_COMMENT", &mut self.automation.comment);
        flag("QUORUM_BLAME", &mut self.blame.enabled);

        if let Some(value) = var("QUORUM_BLAME_MAX_REVIEWERS") {
            match value.trim().parse() {
                Ok(n) => self.blame.max_reviewers = n,
                Err(_) => warn!(value = %value, "Ignoring invalid QUORUM_BLAME_MAX_REVIEWERS"),
            }
        }

        if let Some(value) = var("QUORUM_DISPATCH_MODE") {
            match value.trim().to_lowercase().as_str() {
                "scheduled" => self.dispatch.mode = DispatchMode::Scheduled,
                "direct" => self.dispatch.mode = DispatchMode::Direct,
                _ => warn!(value = %value, "Ignoring invalid QUORUM_DISPATCH_MODE"),
            }
        }

        if let Some(value) = var("QUORUM_WORKERS") {
            match value.trim().parse() {
                Ok(n) => self.dispatch.workers = n,
                Err(_) => warn!(value = %value, "Ignoring invalid QUORUM_WORKERS"),
            }
        }

        if let Some(value) = var("QUORUM_TIMEOUT") {
            match humantime::parse_duration(value.trim()) {
                Ok(d) => self.dispatch.timeout = d,
                Err(e) => warn!(value = %value, error = %e, "Ignoring invalid QUORUM_TIMEOUT"),
            }
        }

        if let Some(dir) = var("QUORUM_RULES_DIR") {
            self.rules.dir = Some(PathBuf::from(dir));
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, overrides: &CliOverrides) -> Self {
        if let Some(dir) = &overrides.rules_dir {
            self.rules.dir = Some(dir.clone());
        }

        if let Some(mode) = overrides.dispatch_mode {
            self.dispatch.mode = mode;
        }

        if let Some(enabled) = overrides.blame {
            self.blame.enabled = enabled;
        }

        if let Some(n) = overrides.max_reviewers {
            self.blame.max_reviewers = n;
        }

        if let Some(comment) = overrides.comment {
            self.automation.comment = comment;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(config_path: Option<&Path>, overrides: &CliOverrides) -> Result<Self> {
        let config = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load()?,
        };
        Ok(config.with_env_overrides().with_cli_overrides(overrides))
    }

    /// Match scope seeded with the configured destinations
    pub fn match_scope(&self) -> MatchScope {
        self.destinations
            .iter()
            .fold(MatchScope::new(), |scope, (name, refs)| {
                scope.with_destination(name.clone(), refs.iter().cloned())
            })
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
