//! Read-through cache of effective (inherited) rules per project

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use super::{FilterRule, RuleSource};
use crate::Result;

#[derive(Debug, Clone)]
struct Entry {
    rules: Arc<Vec<FilterRule>>,
    /// Projects whose files contributed, nearest first
    lineage: Vec<String>,
}

/// Effective rules per project, computed through the parent chain
///
/// With `merge_filters` the rules of every ancestor are unioned (nearest
/// project first; filters with the same match expression collapse into one).
/// Without it, the nearest project in the chain that defines any filter wins.
pub struct RuleCache {
    source: Arc<dyn RuleSource>,
    merge_filters: bool,
    entries: RwLock<HashMap<String, Entry>>,
    /// Bumped on every invalidation; loads that straddle one are not cached
    generation: AtomicU64,
}

impl RuleCache {
    pub fn new(source: Arc<dyn RuleSource>, merge_filters: bool) -> Self {
        Self {
            source,
            merge_filters,
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// The backing rule source
    pub fn source(&self) -> &Arc<dyn RuleSource> {
        &self.source
    }

    /// Effective rules for a project
    ///
    /// A load failure is logged and yields no rules; failures are not cached.
    pub async fn rules_for(&self, project: &str) -> Arc<Vec<FilterRule>> {
        if let Some(entry) = self.cached(project) {
            return entry.rules;
        }

        let generation = self.generation.load(Ordering::Acquire);
        match self.load_effective(project).await {
            Ok(entry) => {
                let rules = entry.rules.clone();
                if let Ok(mut entries) = self.entries.write() {
                    if self.generation.load(Ordering::Acquire) == generation {
                        entries.insert(project.to_string(), entry);
                    } else {
                        debug!(project, "Rules changed while loading, not caching");
                    }
                }
                rules
            }
            Err(e) => {
                warn!(project, error = %e, "Failed to load reviewer rules");
                Arc::new(Vec::new())
            }
        }
    }

    /// Drop the cached rules of a project and of every project inheriting from it
    pub fn invalidate(&self, project: &str) {
        if let Ok(mut entries) = self.entries.write() {
            self.generation.fetch_add(1, Ordering::AcqRel);
            entries.retain(|_, entry| !entry.lineage.iter().any(|p| p == project));
            debug!(project, "Invalidated cached rules");
        }
    }

    /// Drop every cached entry
    pub fn invalidate_all(&self) {
        if let Ok(mut entries) = self.entries.write() {
            self.generation.fetch_add(1, Ordering::AcqRel);
            entries.clear();
        }
    }

    fn cached(&self, project: &str) -> Option<Entry> {
        self.entries.read().ok()?.get(project).cloned()
    }

    async fn load_effective(&self, project: &str) -> Result<Entry> {
        let mut rules: Vec<FilterRule> = Vec::new();
        let mut lineage = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(project.to_string());

        while let Some(current) = next.take() {
            if !visited.insert(current.clone()) {
                warn!(project, cycle_at = %current, "Cycle in project parent chain");
                break;
            }

            let own = self.source.load(&current).await?;
            lineage.push(current);

            if self.merge_filters {
                for filter in own.filters {
                    match rules
                        .iter_mut()
                        .find(|f| f.match_expression == filter.match_expression)
                    {
                        Some(existing) => existing.absorb(&filter),
                        None => rules.push(filter),
                    }
                }
            } else if !own.filters.is_empty() {
                rules = own.filters;
                break;
            }

            next = own.parent;
        }

        debug!(project, rules = rules.len(), lineage = ?lineage, "Computed effective rules");
        Ok(Entry {
            rules: Arc::new(rules),
            lineage,
        })
    }
}

impl std::fmt::Debug for RuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleCache")
            .field("merge_filters", &self.merge_filters)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{MemoryRuleSource, ProjectRules, ReviewerType};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::Notify;

    fn project(parent: Option<&str>, filters: Vec<FilterRule>) -> ProjectRules {
        ProjectRules {
            parent: parent.map(str::to_string),
            filters,
        }
    }

    fn source() -> Arc<MemoryRuleSource> {
        Arc::new(
            MemoryRuleSource::new()
                .with_project(
                    "base",
                    project(None, vec![FilterRule::new("*").with_reviewer("root-admin")]),
                )
                .with_project(
                    "team",
                    project(
                        Some("base"),
                        vec![
                            FilterRule::new("branch:main").with_reviewer("lead"),
                            FilterRule::new("*").with_reviewer("team-admin"),
                        ],
                    ),
                )
                .with_project("app", project(Some("team"), vec![]))
                .with_project(
                    "lib",
                    project(Some("team"), vec![FilterRule::new("ext:rs").with_reviewer("rustacean")]),
                ),
        )
    }

    #[tokio::test]
    async fn test_nearest_defined_project_wins() {
        let cache = RuleCache::new(source(), false);

        let app = cache.rules_for("app").await;
        assert_eq!(app.len(), 2);
        assert_eq!(app[0].match_expression, "branch:main");

        let lib = cache.rules_for("lib").await;
        assert_eq!(lib.len(), 1);
        assert_eq!(lib[0].reviewers, vec!["rustacean"]);
    }

    #[tokio::test]
    async fn test_merge_unions_ancestry_nearest_first() {
        let cache = RuleCache::new(source(), true);

        let lib = cache.rules_for("lib").await;
        let exprs: Vec<&str> = lib.iter().map(|f| f.match_expression.as_str()).collect();
        assert_eq!(exprs, vec!["ext:rs", "branch:main", "*"]);

        // `*` from team and base collapse into one filter
        assert_eq!(lib[2].reviewers, vec!["team-admin", "root-admin"]);
    }

    #[tokio::test]
    async fn test_cycle_terminates() {
        let source = Arc::new(
            MemoryRuleSource::new()
                .with_project("a", project(Some("b"), vec![FilterRule::new("*").with_reviewer("x")]))
                .with_project("b", project(Some("a"), vec![FilterRule::new("*").with_reviewer("y")])),
        );
        let cache = RuleCache::new(source, true);
        let rules = cache.rules_for("a").await;
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].reviewers, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_invalidate_reaches_descendants() {
        let source = source();
        let cache = RuleCache::new(source.clone(), true);
        assert_eq!(cache.rules_for("app").await.len(), 2);

        let mut team = source.load("team").await.unwrap();
        team.add_reviewer("ext:md", "writer", ReviewerType::Reviewer);
        source.save("team", &team).await.unwrap();

        // Still served from cache
        assert_eq!(cache.rules_for("app").await.len(), 2);

        cache.invalidate("team");
        assert_eq!(cache.rules_for("app").await.len(), 3);
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let source = source();
        let cache = RuleCache::new(source.clone(), false);
        assert_eq!(cache.rules_for("base").await.len(), 1);

        source.save("base", &ProjectRules::default()).await.unwrap();
        cache.invalidate_all();
        assert!(cache.rules_for("base").await.is_empty());
    }

    /// Source whose first load reads the rules, then waits to be released
    struct GatedSource {
        inner: MemoryRuleSource,
        armed: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl RuleSource for GatedSource {
        async fn load(&self, project: &str) -> Result<ProjectRules> {
            let rules = self.inner.load(project).await?;
            if self.armed.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(rules)
        }

        async fn save(&self, project: &str, rules: &ProjectRules) -> Result<()> {
            self.inner.save(project, rules).await
        }
    }

    #[tokio::test]
    async fn test_edit_during_load_is_not_masked() {
        let source = Arc::new(GatedSource {
            inner: MemoryRuleSource::new()
                .with_project("demo", project(None, vec![FilterRule::new("*").with_reviewer("alice")])),
            armed: AtomicBool::new(true),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let cache = Arc::new(RuleCache::new(source.clone(), false));

        let reader = tokio::spawn({
            let cache = cache.clone();
            async move { cache.rules_for("demo").await }
        });
        source.entered.notified().await;

        cache
            .add_reviewer("demo", "*", "bob", ReviewerType::Reviewer)
            .await
            .unwrap();
        source.release.notify_one();

        // The in-flight read may return what it saw, but must not be cached
        let seen = reader.await.unwrap();
        assert_eq!(seen[0].reviewers, vec!["alice"]);
        assert_eq!(cache.rules_for("demo").await[0].reviewers, vec!["alice", "bob"]);
    }
}
