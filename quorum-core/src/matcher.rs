//! Rule matching: which filters apply to a change

use tracing::debug;

use crate::model::Change;
use crate::query::{ChangeView, MatchScope};
use crate::rules::FilterRule;
use crate::{Error, Result};

/// Rules whose match expression holds for the change, in rule order
///
/// Wildcard rules always match. A rule's excluded paths are hidden from that
/// rule only. An expression that fails to compile aborts matching, so callers
/// never act on a partial result.
pub fn matching<'r>(
    change: &Change,
    rules: &'r [FilterRule],
    scope: &MatchScope,
) -> Result<Vec<&'r FilterRule>> {
    let mut matched = Vec::new();

    for rule in rules {
        if rule.is_wildcard() {
            matched.push(rule);
            continue;
        }

        let invalid = |source| Error::InvalidFilter {
            filter: rule.match_expression.clone(),
            source,
        };
        let predicate = rule.predicate().map_err(invalid)?;

        let mut view = ChangeView::new(change);
        if !rule.excluded_paths.is_empty() {
            let excluded = rule.excluded_patterns().map_err(invalid)?;
            view.files
                .retain(|file| !excluded.iter().any(|re| re.is_match(&file.path)));
        }

        if predicate.matches(&view, scope) {
            debug!(change = change.number, filter = %rule, "Filter matched");
            matched.push(rule);
        }
    }

    Ok(matched)
}

/// Reviewer and CC identifiers gathered from matched rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates {
    pub reviewers: Vec<String>,
    pub ccs: Vec<String>,
}

impl Candidates {
    /// Union the identifier lists of the given rules, first occurrence wins
    ///
    /// A CC identifier that is textually also a reviewer is dropped.
    pub fn from_rules<'r>(rules: impl IntoIterator<Item = &'r FilterRule>) -> Self {
        let mut candidates = Self::default();
        for rule in rules {
            for reviewer in &rule.reviewers {
                push_unique(&mut candidates.reviewers, reviewer);
            }
            for cc in &rule.ccs {
                push_unique(&mut candidates.ccs, cc);
            }
        }
        let reviewers = &candidates.reviewers;
        candidates.ccs.retain(|cc| !reviewers.contains(cc));
        candidates
    }

    pub fn is_empty(&self) -> bool {
        self.reviewers.is_empty() && self.ccs.is_empty()
    }
}

fn push_unique(list: &mut Vec<String>, identifier: &str) {
    let identifier = identifier.trim();
    if !identifier.is_empty() && !list.iter().any(|i| i == identifier) {
        list.push(identifier.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Account, ChangeKind, FileChange};

    fn change_on(branch: &str) -> Change {
        Change::new(1, "demo", branch, Account::new(10, "carol"))
            .with_file(FileChange::new("docs/index.md", ChangeKind::Modified))
            .with_file(FileChange::new("src/main.rs", ChangeKind::Modified))
    }

    fn rules() -> Vec<FilterRule> {
        vec![
            FilterRule::new("*").with_reviewer("alice"),
            FilterRule::new("branch:main").with_reviewer("bob").with_cc("alice"),
            FilterRule::new("file:^docs/.*").with_reviewer("writer").excluding("docs/.*"),
            FilterRule::new("ext:rs").with_reviewer("bob").with_cc("dave"),
        ]
    }

    #[test]
    fn test_wildcard_and_branch() {
        let rules = rules();
        let scope = MatchScope::new();

        let on_main = matching(&change_on("main"), &rules, &scope).unwrap();
        let exprs: Vec<&str> = on_main.iter().map(|r| r.match_expression.as_str()).collect();
        assert_eq!(exprs, vec!["*", "branch:main", "ext:rs"]);

        let on_feature = matching(&change_on("feature"), &rules, &scope).unwrap();
        assert_eq!(on_feature.len(), 2);
        assert!(on_feature[0].is_wildcard());
    }

    #[test]
    fn test_excluded_paths_do_not_mutate_change() {
        let change = change_on("main");
        let rules = rules();
        let _ = matching(&change, &rules, &MatchScope::new()).unwrap();
        assert_eq!(change.files.len(), 2);

        // Without the exclusion, the docs rule matches
        let unexcluded = vec![FilterRule::new("file:^docs/.*").with_reviewer("writer")];
        assert_eq!(matching(&change, &unexcluded, &MatchScope::new()).unwrap().len(), 1);
    }

    #[test]
    fn test_wildcard_ignores_exclusions() {
        let change = change_on("main");
        let rules = vec![FilterRule::new("*").with_reviewer("a").excluding(".*")];
        assert_eq!(matching(&change, &rules, &MatchScope::new()).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_rule_aborts() {
        let rules = vec![
            FilterRule::new("*").with_reviewer("alice"),
            FilterRule::new("message:hi").with_reviewer("bob"),
        ];
        let err = matching(&change_on("main"), &rules, &MatchScope::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidFilter { .. }));
    }

    #[test]
    fn test_candidates_union_and_precedence() {
        let rules = rules();
        let matched = matching(&change_on("main"), &rules, &MatchScope::new()).unwrap();
        let candidates = Candidates::from_rules(matched);
        assert_eq!(candidates.reviewers, vec!["alice", "bob"]);
        assert_eq!(candidates.ccs, vec!["dave"]);
    }
}
