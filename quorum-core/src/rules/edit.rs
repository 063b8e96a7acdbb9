//! Write path: validated edits of a project's own rules

use tracing::info;

use super::{validate_rules, ProjectRules, ReviewerType, RuleCache};
use crate::{Error, Result};

impl RuleCache {
    /// Validate and persist a project's rules, then drop stale cache entries
    pub async fn save_rules(&self, project: &str, rules: &ProjectRules) -> Result<()> {
        let errors = validate_rules(rules);
        if !errors.is_empty() {
            return Err(Error::InvalidRules(errors));
        }
        self.source().save(project, rules).await?;
        self.invalidate(project);
        Ok(())
    }

    /// Add an identifier to a filter of the project's own rules
    ///
    /// Returns false when the identifier was already there.
    pub async fn add_reviewer(
        &self,
        project: &str,
        match_expression: &str,
        identifier: &str,
        ty: ReviewerType,
    ) -> Result<bool> {
        let mut rules = self.source().load(project).await?;
        if !rules.add_reviewer(match_expression, identifier, ty) {
            return Ok(false);
        }
        self.save_rules(project, &rules).await?;
        info!(project, filter = match_expression, identifier, %ty, "Added to reviewer rules");
        Ok(true)
    }

    /// Remove an identifier from a filter of the project's own rules
    ///
    /// Returns false when there was nothing to remove.
    pub async fn remove_reviewer(
        &self,
        project: &str,
        match_expression: &str,
        identifier: &str,
        ty: ReviewerType,
    ) -> Result<bool> {
        let mut rules = self.source().load(project).await?;
        if !rules.remove_reviewer(match_expression, identifier, ty) {
            return Ok(false);
        }
        self.save_rules(project, &rules).await?;
        info!(project, filter = match_expression, identifier, %ty, "Removed from reviewer rules");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{MemoryRuleSource, RuleSource};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_add_invalidates_cache() {
        let cache = RuleCache::new(Arc::new(MemoryRuleSource::new()), false);
        assert!(cache.rules_for("demo").await.is_empty());

        assert!(cache
            .add_reviewer("demo", "branch:main", "alice", ReviewerType::Reviewer)
            .await
            .unwrap());
        let rules = cache.rules_for("demo").await;
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].reviewers, vec!["alice"]);

        assert!(!cache
            .add_reviewer("demo", "branch:main", "alice", ReviewerType::Reviewer)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_invalid_filter_is_rejected_before_write() {
        let source = Arc::new(MemoryRuleSource::new());
        let cache = RuleCache::new(source.clone(), false);

        let err = cache
            .add_reviewer("demo", "message:foo", "alice", ReviewerType::Reviewer)
            .await
            .unwrap_err();
        match err {
            Error::InvalidRules(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].filter, "message:foo");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(source.load("demo").await.unwrap().filters.is_empty());
    }

    #[tokio::test]
    async fn test_remove_last_identifier_drops_filter() {
        let cache = RuleCache::new(Arc::new(MemoryRuleSource::new()), false);
        cache
            .add_reviewer("demo", "*", "bob", ReviewerType::Cc)
            .await
            .unwrap();
        assert!(cache
            .remove_reviewer("demo", "*", "bob", ReviewerType::Cc)
            .await
            .unwrap());
        assert!(cache.rules_for("demo").await.is_empty());
        assert!(!cache
            .remove_reviewer("demo", "*", "bob", ReviewerType::Cc)
            .await
            .unwrap());
    }
}
