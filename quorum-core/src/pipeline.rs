//! Event handling: from a change event to an applied assignment
//!
//! Each event walks the stages `Triggered -> RulesMatched -> Scored ->
//! Resolved -> Planned -> (Dispatched | NoOp) -> Applied | Failed`. Only the
//! final tracker call leaves the caller's task; everything before it runs
//! inline and sequentially.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::blame::{BlameProvider, BlameScorer};
use crate::config::{AutomationConfig, Config};
use crate::dispatch::{AssignmentTask, ChangeTracker, DispatchHandle, DispatchMode, Dispatched, Dispatcher, TaskOutcome};
use crate::matcher::{matching, Candidates};
use crate::model::{Account, Change, ChangeEvent};
use crate::planner::{plan, Assignment};
use crate::query::MatchScope;
use crate::resolver::{AccountDirectory, Resolver};
use crate::rules::{FileRuleSource, FilterRule, RuleCache, RuleSource};
use crate::Result;

/// Header of the matched-rules message
pub const MATCHED_RULES_HEADER: &str = "Matched automatic invitation rules:";

/// Stages an event passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Triggered,
    RulesMatched,
    Scored,
    Resolved,
    Planned,
    Dispatched,
    NoOp,
    Applied,
    Failed,
}

/// Why an event ended without a tracker call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    Private,
    WorkInProgress,
    Closed,
    SuggestOnly,
    /// No rule or blame candidate
    NoCandidates,
    /// Every candidate is already a reviewer or CC
    AlreadyAssigned,
    /// A rule could not be evaluated; nothing is applied
    Abandoned,
}

/// Where an event ended up
#[derive(Debug)]
pub enum Outcome {
    NoOp(NoOpReason),
    /// Handed to the worker pool
    Dispatched {
        assignment: Assignment,
        handle: DispatchHandle,
    },
    Applied(Assignment),
    Failed(Assignment),
}

impl Outcome {
    pub fn stage(&self) -> Stage {
        match self {
            Outcome::NoOp(_) => Stage::NoOp,
            Outcome::Dispatched { .. } => Stage::Dispatched,
            Outcome::Applied(_) => Stage::Applied,
            Outcome::Failed(_) => Stage::Failed,
        }
    }

    /// The planned assignment, if the event got that far
    pub fn assignment(&self) -> Option<&Assignment> {
        match self {
            Outcome::NoOp(_) => None,
            Outcome::Dispatched { assignment, .. }
            | Outcome::Applied(assignment)
            | Outcome::Failed(assignment) => Some(assignment),
        }
    }

    /// Wait for a queued task; other outcomes are returned unchanged
    pub async fn settle(self) -> Outcome {
        match self {
            Outcome::Dispatched { assignment, handle } => match handle.wait().await {
                TaskOutcome::Applied => Outcome::Applied(assignment),
                TaskOutcome::Failed => Outcome::Failed(assignment),
            },
            other => other,
        }
    }
}

/// Dry-run view of what an event would do
#[derive(Debug, Clone, Default, Serialize)]
pub struct Preview {
    /// Match expressions of the matched rules
    pub matched: Vec<String>,
    pub candidates: PreviewCandidates,
    pub blame: Vec<Account>,
    pub assignment: Assignment,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PreviewCandidates {
    pub reviewers: Vec<String>,
    pub ccs: Vec<String>,
}

/// Automatic reviewer assignment for change events
pub struct Pipeline {
    automation: AutomationConfig,
    rules: Arc<RuleCache>,
    resolver: Resolver,
    blame: Option<BlameScorer>,
    dispatcher: Dispatcher,
    scope: MatchScope,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("automation", &self.automation)
            .field("blame", &self.blame)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(rules: Arc<RuleCache>, resolver: Resolver, dispatcher: Dispatcher) -> Self {
        Self {
            automation: AutomationConfig::default(),
            rules,
            resolver,
            blame: None,
            dispatcher,
            scope: MatchScope::new(),
        }
    }

    /// Build from configuration with file-backed rules
    ///
    /// Blame scoring is enabled when configured and a provider is given.
    /// Must be called from within a tokio runtime in scheduled mode.
    pub fn from_config(
        config: &Config,
        directory: Arc<dyn AccountDirectory>,
        tracker: Arc<dyn ChangeTracker>,
        blame_provider: Option<Arc<dyn BlameProvider>>,
    ) -> Result<Self> {
        let source: Arc<dyn RuleSource> = Arc::new(FileRuleSource::new(config.rules.dir()?));
        let rules = Arc::new(RuleCache::new(source, config.automation.merge_filters));

        let dispatch = &config.dispatch;
        let dispatcher = match dispatch.mode {
            DispatchMode::Direct => Dispatcher::direct(tracker, dispatch.timeout),
            DispatchMode::Scheduled => {
                Dispatcher::scheduled(tracker, dispatch.workers, dispatch.queue_capacity, dispatch.timeout)
            }
        };

        let mut pipeline = Self::new(rules, Resolver::new(directory.clone()), dispatcher)
            .with_automation(config.automation.clone())
            .with_scope(config.match_scope());

        if config.blame.enabled {
            match blame_provider {
                Some(provider) => {
                    let scorer = BlameScorer::new(provider, directory)
                        .with_max_reviewers(config.blame.max_reviewers)
                        .with_ignore_pattern(&config.blame.ignore_file_pattern)?;
                    pipeline = pipeline.with_blame(scorer);
                }
                None => warn!("Blame scoring enabled but no repository is available"),
            }
        }

        Ok(pipeline)
    }

    pub fn with_automation(mut self, automation: AutomationConfig) -> Self {
        self.automation = automation;
        self
    }

    pub fn with_blame(mut self, scorer: BlameScorer) -> Self {
        self.blame = Some(scorer);
        self
    }

    /// Base scope for matching; groups are filled in per event
    pub fn with_scope(mut self, scope: MatchScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn rules(&self) -> &Arc<RuleCache> {
        &self.rules
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle one change event
    pub async fn handle(&self, event: &ChangeEvent) -> Outcome {
        let change = &event.change;
        let number = change.number;
        debug!(change = number, project = %change.project, event = %event.kind, stage = ?Stage::Triggered, "Change event");

        if let Some(reason) = self.gate(change) {
            debug!(change = number, ?reason, stage = ?Stage::NoOp, "Event ignored");
            return Outcome::NoOp(reason);
        }

        let rules = self.rules.rules_for(&change.project).await;
        let scope = self.scope_for(change, &rules).await;
        let matched = match matching(change, &rules, &scope) {
            Ok(matched) => matched,
            Err(e) => {
                warn!(
                    change = number,
                    project = %change.project,
                    error = %e,
                    "Could not add default reviewers, filter is invalid"
                );
                return Outcome::NoOp(NoOpReason::Abandoned);
            }
        };
        let candidates = Candidates::from_rules(matched.iter().copied());
        debug!(change = number, matched = matched.len(), stage = ?Stage::RulesMatched, "Rules matched");

        let blamed = match &self.blame {
            Some(scorer) => scorer.reviewers(change).await,
            None => Vec::new(),
        };
        debug!(change = number, blamed = blamed.len(), stage = ?Stage::Scored, "Blame scored");

        if candidates.is_empty() && blamed.is_empty() {
            debug!(change = number, stage = ?Stage::NoOp, "No candidates");
            return Outcome::NoOp(NoOpReason::NoCandidates);
        }

        // Rules come from trusted project configuration, so visibility is not checked.
        let uploader = Some(event.actor.id);
        let mut reviewers = self
            .resolver
            .resolve(&candidates.reviewers, change, uploader, true)
            .await;
        reviewers.extend(blamed.into_iter().filter(|a| Some(a.id) != uploader));
        let ccs = self
            .resolver
            .resolve(&candidates.ccs, change, uploader, true)
            .await;
        debug!(
            change = number,
            reviewers = reviewers.len(),
            ccs = ccs.len(),
            stage = ?Stage::Resolved,
            "Candidates resolved"
        );

        let assignment = plan(&reviewers, &ccs, &change.reviewers, &change.ccs);
        debug!(
            change = number,
            reviewers = assignment.reviewers.len(),
            ccs = assignment.ccs.len(),
            stage = ?Stage::Planned,
            "Assignment planned"
        );
        if assignment.is_empty() {
            debug!(change = number, stage = ?Stage::NoOp, "Nothing new to add");
            return Outcome::NoOp(NoOpReason::AlreadyAssigned);
        }

        let mut task = AssignmentTask::new(change.clone(), assignment.clone());
        if self.automation.comment && !matched.is_empty() {
            task = task.with_message(matched_rules_message(&matched));
        }

        match self.dispatcher.dispatch(task).await {
            Ok(Dispatched::Completed(TaskOutcome::Applied)) => {
                debug!(change = number, stage = ?Stage::Applied, "Assignment applied");
                Outcome::Applied(assignment)
            }
            Ok(Dispatched::Completed(TaskOutcome::Failed)) => {
                debug!(change = number, stage = ?Stage::Failed, "Assignment failed");
                Outcome::Failed(assignment)
            }
            Ok(Dispatched::Queued(handle)) => {
                debug!(change = number, stage = ?Stage::Dispatched, "Assignment queued");
                Outcome::Dispatched { assignment, handle }
            }
            Err(e) => {
                error!(change = number, error = %e, "Could not dispatch assignment");
                Outcome::Failed(assignment)
            }
        }
    }

    /// Reviewers suggested for a change from the matching rules
    ///
    /// Visibility is respected and every suggestion scores 1.
    pub async fn suggest(&self, project: &str, change: &Change) -> Vec<(Account, u32)> {
        let rules = self.rules.rules_for(project).await;
        if rules.is_empty() {
            return Vec::new();
        }

        let scope = self.scope_for(change, &rules).await;
        let matched = match matching(change, &rules, &scope) {
            Ok(matched) => matched,
            Err(e) => {
                error!(change = change.number, project, error = %e, "Could not suggest reviewers");
                return Vec::new();
            }
        };

        let candidates = Candidates::from_rules(matched.iter().copied());
        if candidates.reviewers.is_empty() {
            return Vec::new();
        }

        self.resolver
            .resolve(&candidates.reviewers, change, None, false)
            .await
            .into_iter()
            .map(|account| (account, 1))
            .collect()
    }

    /// What [`Pipeline::handle`] would do, without gating or dispatch
    pub async fn preview(&self, change: &Change, uploader: &Account) -> Result<Preview> {
        let rules = self.rules.rules_for(&change.project).await;
        let scope = self.scope_for(change, &rules).await;
        let matched = matching(change, &rules, &scope)?;
        let candidates = Candidates::from_rules(matched.iter().copied());

        let blamed = match &self.blame {
            Some(scorer) => scorer.reviewers(change).await,
            None => Vec::new(),
        };

        let uploader = Some(uploader.id);
        let mut reviewers = self
            .resolver
            .resolve(&candidates.reviewers, change, uploader, true)
            .await;
        reviewers.extend(blamed.iter().filter(|a| Some(a.id) != uploader).cloned());
        let ccs = self
            .resolver
            .resolve(&candidates.ccs, change, uploader, true)
            .await;

        Ok(Preview {
            matched: matched.iter().map(|r| r.to_string()).collect(),
            assignment: plan(&reviewers, &ccs, &change.reviewers, &change.ccs),
            candidates: PreviewCandidates {
                reviewers: candidates.reviewers,
                ccs: candidates.ccs,
            },
            blame: blamed,
        })
    }

    /// Stop accepting work and drain queued tasks
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
    }

    fn gate(&self, change: &Change) -> Option<NoOpReason> {
        if !change.status.is_open() {
            return Some(NoOpReason::Closed);
        }
        if self.automation.ignore_private && change.private {
            return Some(NoOpReason::Private);
        }
        if self.automation.ignore_wip && change.work_in_progress {
            return Some(NoOpReason::WorkInProgress);
        }
        if self.automation.suggest_only {
            return Some(NoOpReason::SuggestOnly);
        }
        None
    }

    /// Base scope plus the members of every group the rules refer to
    async fn scope_for(&self, change: &Change, rules: &[FilterRule]) -> MatchScope {
        let groups: BTreeSet<String> = rules
            .iter()
            .filter(|r| !r.is_wildcard())
            .filter_map(|r| r.predicate().ok())
            .flat_map(|p| p.referenced_groups())
            .collect();

        let mut scope = self.scope.clone();
        let directory = self.resolver.directory();
        for group in groups {
            match directory.group_members(&group, &change.project).await {
                Ok(Some(members)) => {
                    scope = scope.with_group(group, members.into_iter().map(|a| a.id));
                }
                Ok(None) => {
                    debug!(change = change.number, group = %group, "Group in filter does not exist");
                }
                Err(e) => {
                    warn!(change = change.number, group = %group, error = %e, "Failed to load group members");
                }
            }
        }
        scope
    }
}

/// Message listing matched rules and their reviewers
pub fn matched_rules_message(matched: &[&FilterRule]) -> String {
    let mut message = format!("{} \n\n", MATCHED_RULES_HEADER);
    for rule in matched {
        message.push_str(&rule.to_string());
        message.push('\n');
        message.push('\t');
        message.push_str(&rule.reviewers.join(", "));
        message.push('\n');
    }
    message
}
