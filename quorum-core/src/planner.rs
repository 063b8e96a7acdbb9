//! Deduplication of candidates against a change's recorded participants

use std::collections::BTreeSet;

use serde::Serialize;

use crate::model::Account;

/// Reviewers and CCs to add to one change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub reviewers: BTreeSet<Account>,
    pub ccs: BTreeSet<Account>,
}

impl Assignment {
    pub fn is_empty(&self) -> bool {
        self.reviewers.is_empty() && self.ccs.is_empty()
    }
}

/// Plan an assignment
///
/// Candidates already recorded as reviewer or CC are dropped, and an account
/// that is both a reviewer and a CC candidate becomes a reviewer only.
pub fn plan(
    candidate_reviewers: &BTreeSet<Account>,
    candidate_ccs: &BTreeSet<Account>,
    already_reviewers: &[Account],
    already_ccs: &[Account],
) -> Assignment {
    let present = |account: &Account| {
        already_reviewers
            .iter()
            .chain(already_ccs.iter())
            .any(|a| a.id == account.id)
    };

    let reviewers: BTreeSet<Account> = candidate_reviewers
        .iter()
        .filter(|a| !present(*a))
        .cloned()
        .collect();
    let ccs = candidate_ccs
        .iter()
        .filter(|a| !present(*a) && !candidate_reviewers.contains(*a))
        .cloned()
        .collect();

    Assignment { reviewers, ccs }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[u64]) -> BTreeSet<Account> {
        ids.iter().map(|id| Account::new(*id, format!("u{}", id))).collect()
    }

    fn ids(accounts: &BTreeSet<Account>) -> Vec<u64> {
        accounts.iter().map(|a| a.id.0).collect()
    }

    #[test]
    fn test_reviewer_dominates_cc() {
        let assignment = plan(&set(&[1, 2]), &set(&[2, 3]), &[], &[]);
        assert_eq!(ids(&assignment.reviewers), vec![1, 2]);
        assert_eq!(ids(&assignment.ccs), vec![3]);
    }

    #[test]
    fn test_existing_participants_are_dropped() {
        let already_reviewers = vec![Account::new(1, "u1")];
        let already_ccs = vec![Account::new(3, "u3")];
        let assignment = plan(&set(&[1, 2, 3]), &set(&[3, 4, 1]), &already_reviewers, &already_ccs);
        assert_eq!(ids(&assignment.reviewers), vec![2]);
        assert_eq!(ids(&assignment.ccs), vec![4]);
    }

    #[test]
    fn test_already_reviewer_candidate_still_blocks_cc() {
        // 1 is a reviewer candidate but already a reviewer: not re-added as CC
        let already = vec![Account::new(1, "u1")];
        let assignment = plan(&set(&[1]), &set(&[1]), &already, &[]);
        assert!(assignment.is_empty());
    }

    #[test]
    fn test_second_pass_is_noop() {
        let first = plan(&set(&[1, 2]), &set(&[3]), &[], &[]);
        let reviewers: Vec<Account> = first.reviewers.iter().cloned().collect();
        let ccs: Vec<Account> = first.ccs.iter().cloned().collect();
        assert!(plan(&set(&[1, 2]), &set(&[3]), &reviewers, &ccs).is_empty());
    }
}
