//! Reviewer rules: per-project filters, their storage and the rule cache
//!
//! A project's rules live in a `reviewers.toml` file:
//!
//! ```toml
//! parent = "All-Projects"
//!
//! [[filter]]
//! match = "branch:main"
//! reviewers = ["alice", "bob@example.com"]
//! ccs = ["team-leads"]
//! exclude = ["^docs/.*"]
//! ```

mod cache;
mod edit;
mod source;

pub use cache::RuleCache;
pub use source::{FileRuleSource, MemoryRuleSource, RuleSource, RULES_FILE_NAME};

use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::query::{self, Predicate, QueryError};
use crate::{Error, Result};

/// Which list of a filter an identifier belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewerType {
    Reviewer,
    Cc,
}

impl std::fmt::Display for ReviewerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewerType::Reviewer => write!(f, "reviewer"),
            ReviewerType::Cc => write!(f, "cc"),
        }
    }
}

impl FromStr for ReviewerType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "reviewer" | "reviewers" => Ok(ReviewerType::Reviewer),
            "cc" | "ccs" => Ok(ReviewerType::Cc),
            other => Err(Error::Config(format!("Unknown reviewer type: {}", other))),
        }
    }
}

/// One `[[filter]]` entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    /// Match expression; empty or `*` matches every change
    #[serde(rename = "match", default)]
    pub match_expression: String,
    /// Identifiers added as reviewers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reviewers: Vec<String>,
    /// Identifiers added as CCs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ccs: Vec<String>,
    /// Regular expressions for paths this rule ignores
    #[serde(rename = "exclude", default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_paths: Vec<String>,
}

impl FilterRule {
    pub fn new(match_expression: impl Into<String>) -> Self {
        Self {
            match_expression: match_expression.into(),
            ..Self::default()
        }
    }

    /// Add a reviewer identifier
    pub fn with_reviewer(mut self, identifier: impl Into<String>) -> Self {
        self.add(ReviewerType::Reviewer, identifier.into());
        self
    }

    /// Add a CC identifier
    pub fn with_cc(mut self, identifier: impl Into<String>) -> Self {
        self.add(ReviewerType::Cc, identifier.into());
        self
    }

    /// Add an excluded-path pattern
    pub fn excluding(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        if !self.excluded_paths.contains(&pattern) {
            self.excluded_paths.push(pattern);
        }
        self
    }

    pub fn is_wildcard(&self) -> bool {
        query::is_wildcard(&self.match_expression)
    }

    /// Compile the match expression
    pub fn predicate(&self) -> std::result::Result<Predicate, QueryError> {
        query::compile(&self.match_expression)
    }

    /// Compile the excluded-path patterns (whole-path matches)
    pub fn excluded_patterns(&self) -> std::result::Result<Vec<Regex>, QueryError> {
        self.excluded_paths
            .iter()
            .map(|p| query::anchored_regex(p))
            .collect()
    }

    fn list_mut(&mut self, ty: ReviewerType) -> &mut Vec<String> {
        match ty {
            ReviewerType::Reviewer => &mut self.reviewers,
            ReviewerType::Cc => &mut self.ccs,
        }
    }

    /// Returns false if the identifier was already present
    fn add(&mut self, ty: ReviewerType, identifier: String) -> bool {
        let list = self.list_mut(ty);
        if list.contains(&identifier) {
            return false;
        }
        list.push(identifier);
        true
    }

    /// Returns false if the identifier was not present
    fn remove(&mut self, ty: ReviewerType, identifier: &str) -> bool {
        let list = self.list_mut(ty);
        let before = list.len();
        list.retain(|i| i != identifier);
        list.len() != before
    }

    /// Union another rule's lists into this one, keeping order
    fn absorb(&mut self, other: &FilterRule) {
        for r in &other.reviewers {
            self.add(ReviewerType::Reviewer, r.clone());
        }
        for c in &other.ccs {
            self.add(ReviewerType::Cc, c.clone());
        }
        for p in &other.excluded_paths {
            if !self.excluded_paths.contains(p) {
                self.excluded_paths.push(p.clone());
            }
        }
    }
}

impl std::fmt::Display for FilterRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_wildcard() {
            write!(f, "*")
        } else {
            write!(f, "{}", self.match_expression)
        }
    }
}

/// The rules file of a single project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRules {
    /// Project this one inherits rules from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(rename = "filter", default)]
    pub filters: Vec<FilterRule>,
}

impl ProjectRules {
    /// Parse a `reviewers.toml` document
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(format!("Failed to parse rules: {}", e)))
    }

    /// Render as a `reviewers.toml` document
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize rules: {}", e)))
    }

    pub fn filter(&self, match_expression: &str) -> Option<&FilterRule> {
        self.filters
            .iter()
            .find(|f| f.match_expression == match_expression)
    }

    /// Add an identifier to a filter, creating the filter if needed
    ///
    /// Returns false when nothing changed.
    pub fn add_reviewer(&mut self, match_expression: &str, identifier: &str, ty: ReviewerType) -> bool {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return false;
        }
        match self
            .filters
            .iter_mut()
            .find(|f| f.match_expression == match_expression)
        {
            Some(filter) => filter.add(ty, identifier.to_string()),
            None => {
                let mut filter = FilterRule::new(match_expression);
                filter.add(ty, identifier.to_string());
                self.filters.push(filter);
                true
            }
        }
    }

    /// Remove an identifier from a filter
    ///
    /// A filter left without reviewers and CCs is dropped. Returns false when
    /// nothing changed.
    pub fn remove_reviewer(&mut self, match_expression: &str, identifier: &str, ty: ReviewerType) -> bool {
        let Some(index) = self
            .filters
            .iter()
            .position(|f| f.match_expression == match_expression)
        else {
            return false;
        };

        let removed = self.filters[index].remove(ty, identifier.trim());
        let filter = &self.filters[index];
        if removed && filter.reviewers.is_empty() && filter.ccs.is_empty() {
            self.filters.remove(index);
        }
        removed
    }
}

/// A problem found while validating a rules document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Match expression of the offending filter
    pub filter: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "filter \"{}\": {}", self.filter, self.message)
    }
}

/// Check every filter of a rules document
///
/// Runs before each write and from the `validate` command.
pub fn validate_rules(rules: &ProjectRules) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for filter in &rules.filters {
        let mut report = |message: String| {
            errors.push(ValidationError {
                filter: filter.match_expression.clone(),
                message,
            })
        };

        if let Err(e) = filter.predicate() {
            report(e.to_string());
        }
        for pattern in &filter.excluded_paths {
            if let Err(e) = query::anchored_regex(pattern) {
                report(format!("exclude \"{}\": {}", pattern, e));
            }
        }
        if filter
            .reviewers
            .iter()
            .chain(filter.ccs.iter())
            .any(|i| i.trim().is_empty())
        {
            report("empty reviewer identifier".to_string());
        }
        if !seen.insert(filter.match_expression.as_str()) {
            report("duplicate filter".to_string());
        }
    }

    errors
}
