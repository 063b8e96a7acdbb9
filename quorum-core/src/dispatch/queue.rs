//! Work queue running assignment tasks

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::{ChangeTracker, IdentityContext};
use crate::model::{Account, Change};
use crate::planner::Assignment;
use crate::{Error, Result};

/// How tasks are executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Bounded worker pool
    #[default]
    Scheduled,
    /// Inline on the caller's task
    Direct,
}

/// Final state of a dispatched task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    Applied,
    Failed,
}

/// One batched assignment for one change
#[derive(Debug, Clone)]
pub struct AssignmentTask {
    pub change: Change,
    pub assignment: Assignment,
    pub identity: IdentityContext,
    /// Posted on the change before reviewers are added
    pub message: Option<String>,
}

impl AssignmentTask {
    /// Task acting as the change owner
    pub fn new(change: Change, assignment: Assignment) -> Self {
        let identity = IdentityContext::for_owner(&change);
        Self {
            change,
            assignment,
            identity,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Execute against the tracker; failures are logged, never retried
    pub async fn run(self, tracker: &dyn ChangeTracker, timeout: Duration) -> TaskOutcome {
        let number = self.change.number;

        if let Some(message) = &self.message {
            match tokio::time::timeout(timeout, tracker.post_message(&self.change, message, &self.identity)).await {
                Ok(Ok(())) => debug!(change = number, "Posted matched rules message"),
                Ok(Err(e)) => warn!(change = number, error = %e, "Failed to post message"),
                Err(_) => warn!(change = number, ?timeout, "Posting message timed out"),
            }
        }

        let reviewers: Vec<Account> = self.assignment.reviewers.iter().cloned().collect();
        let ccs: Vec<Account> = self.assignment.ccs.iter().cloned().collect();
        let call = tracker.add_reviewers_and_ccs(&self.change, &reviewers, &ccs, &self.identity);

        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(())) => {
                info!(
                    change = number,
                    project = %self.change.project,
                    reviewers = reviewers.len(),
                    ccs = ccs.len(),
                    identity = %self.identity,
                    "Added reviewers"
                );
                TaskOutcome::Applied
            }
            Ok(Err(e)) => {
                error!(change = number, project = %self.change.project, error = %e, "Failed to add reviewers");
                TaskOutcome::Failed
            }
            Err(_) => {
                error!(change = number, project = %self.change.project, ?timeout, "Adding reviewers timed out");
                TaskOutcome::Failed
            }
        }
    }
}

/// Result of handing a task to the dispatcher
#[derive(Debug)]
pub enum Dispatched {
    /// Ran inline
    Completed(TaskOutcome),
    /// Waiting in the worker pool
    Queued(DispatchHandle),
}

/// Completion handle of a queued task
#[derive(Debug)]
pub struct DispatchHandle(oneshot::Receiver<TaskOutcome>);

impl DispatchHandle {
    /// Wait for the task to finish
    pub async fn wait(self) -> TaskOutcome {
        self.0.await.unwrap_or(TaskOutcome::Failed)
    }
}

struct Job {
    task: AssignmentTask,
    done: oneshot::Sender<TaskOutcome>,
}

enum Mode {
    Direct,
    Scheduled {
        sender: std::sync::Mutex<Option<mpsc::Sender<Job>>>,
        workers: Mutex<Option<JoinSet<()>>>,
    },
}

/// Hands assignment tasks to the change tracker
pub struct Dispatcher {
    mode: Mode,
    tracker: Arc<dyn ChangeTracker>,
    timeout: Duration,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.mode {
            Mode::Direct => DispatchMode::Direct,
            Mode::Scheduled { .. } => DispatchMode::Scheduled,
        };
        f.debug_struct("Dispatcher")
            .field("mode", &mode)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Run tasks inline
    pub fn direct(tracker: Arc<dyn ChangeTracker>, timeout: Duration) -> Self {
        Self {
            mode: Mode::Direct,
            tracker,
            timeout,
        }
    }

    /// Start a pool of `workers` tasks fed by a queue of `capacity` entries
    ///
    /// Must be called from within a tokio runtime.
    pub fn scheduled(
        tracker: Arc<dyn ChangeTracker>,
        workers: usize,
        capacity: usize,
        timeout: Duration,
    ) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let mut pool = JoinSet::new();
        for worker in 0..workers.max(1) {
            let receiver = Arc::clone(&receiver);
            let tracker = Arc::clone(&tracker);
            pool.spawn(async move {
                loop {
                    let job = receiver.lock().await.recv().await;
                    let Some(job) = job else {
                        break;
                    };
                    debug!(worker, change = job.task.change.number, "Running assignment task");
                    let outcome = job.task.run(tracker.as_ref(), timeout).await;
                    let _ = job.done.send(outcome);
                }
                debug!(worker, "Worker stopped");
            });
        }

        Self {
            mode: Mode::Scheduled {
                sender: std::sync::Mutex::new(Some(sender)),
                workers: Mutex::new(Some(pool)),
            },
            tracker,
            timeout,
        }
    }

    /// Submit a task
    pub async fn dispatch(&self, task: AssignmentTask) -> Result<Dispatched> {
        match &self.mode {
            Mode::Direct => Ok(Dispatched::Completed(
                task.run(self.tracker.as_ref(), self.timeout).await,
            )),
            Mode::Scheduled { sender, .. } => {
                let sender = sender
                    .lock()
                    .ok()
                    .and_then(|s| s.clone())
                    .ok_or(Error::QueueClosed)?;
                let (done, handle) = oneshot::channel();
                sender
                    .send(Job { task, done })
                    .await
                    .map_err(|_| Error::QueueClosed)?;
                Ok(Dispatched::Queued(DispatchHandle(handle)))
            }
        }
    }

    /// Stop accepting tasks and wait for queued ones to finish
    pub async fn shutdown(&self) {
        if let Mode::Scheduled { sender, workers } = &self.mode {
            if let Ok(mut sender) = sender.lock() {
                sender.take();
            }
            if let Some(mut pool) = workers.lock().await.take() {
                while let Some(joined) = pool.join_next().await {
                    if let Err(e) = joined {
                        error!(error = %e, "Dispatch worker failed");
                    }
                }
            }
            info!("Dispatcher drained");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{MemoryTracker, TrackerCall};
    use std::collections::BTreeSet;

    fn task(number: u64) -> AssignmentTask {
        let change = Change::new(number, "demo", "main", Account::new(1, "carol"));
        let assignment = Assignment {
            reviewers: BTreeSet::from([Account::new(2, "alice")]),
            ccs: BTreeSet::from([Account::new(3, "bob")]),
        };
        AssignmentTask::new(change, assignment)
    }

    #[tokio::test]
    async fn test_direct_mode_runs_inline() {
        let tracker = Arc::new(MemoryTracker::new());
        let dispatcher = Dispatcher::direct(tracker.clone(), Duration::from_secs(5));

        let dispatched = dispatcher.dispatch(task(1)).await.unwrap();
        assert!(matches!(dispatched, Dispatched::Completed(TaskOutcome::Applied)));

        let calls = tracker.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            TrackerCall::AddReviewers {
                change,
                reviewers,
                ccs,
                identity,
            } => {
                assert_eq!(*change, 1);
                assert_eq!(reviewers.len(), 1);
                assert_eq!(ccs.len(), 1);
                assert_eq!(identity.username, "carol");
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_message_is_posted_first() {
        let tracker = Arc::new(MemoryTracker::new());
        let dispatcher = Dispatcher::direct(tracker.clone(), Duration::from_secs(5));
        dispatcher
            .dispatch(task(1).with_message("Matched automatic invitation rules:"))
            .await
            .unwrap();

        let calls = tracker.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], TrackerCall::PostMessage { .. }));
        assert!(matches!(calls[1], TrackerCall::AddReviewers { .. }));
    }

    #[tokio::test]
    async fn test_failure_is_not_retried() {
        let tracker = Arc::new(MemoryTracker::failing("boom"));
        let dispatcher = Dispatcher::direct(tracker.clone(), Duration::from_secs(5));
        let dispatched = dispatcher.dispatch(task(1)).await.unwrap();
        assert!(matches!(dispatched, Dispatched::Completed(TaskOutcome::Failed)));
        assert!(tracker.calls().is_empty());
    }

    #[tokio::test]
    async fn test_scheduled_mode_drains_on_shutdown() {
        let tracker = Arc::new(MemoryTracker::new());
        let dispatcher = Dispatcher::scheduled(tracker.clone(), 2, 8, Duration::from_secs(5));

        let mut handles = Vec::new();
        for n in 1..=5 {
            match dispatcher.dispatch(task(n)).await.unwrap() {
                Dispatched::Queued(handle) => handles.push(handle),
                Dispatched::Completed(_) => panic!("scheduled mode should queue"),
            }
        }
        dispatcher.shutdown().await;

        for handle in handles {
            assert_eq!(handle.wait().await, TaskOutcome::Applied);
        }
        assert_eq!(tracker.calls().len(), 5);
        assert!(matches!(dispatcher.dispatch(task(6)).await, Err(Error::QueueClosed)));
    }

    struct SlowTracker;

    #[async_trait::async_trait]
    impl ChangeTracker for SlowTracker {
        async fn add_reviewers_and_ccs(
            &self,
            _: &Change,
            _: &[Account],
            _: &[Account],
            _: &IdentityContext,
        ) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        async fn post_message(&self, _: &Change, _: &str, _: &IdentityContext) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_timeout_fails_task() {
        let dispatcher = Dispatcher::direct(Arc::new(SlowTracker), Duration::from_millis(50));
        let dispatched = dispatcher.dispatch(task(1)).await.unwrap();
        assert!(matches!(dispatched, Dispatched::Completed(TaskOutcome::Failed)));
    }
}
