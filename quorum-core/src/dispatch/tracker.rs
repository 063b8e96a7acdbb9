//! Change tracking backend interface

use std::sync::Mutex;

use async_trait::async_trait;

use super::IdentityContext;
use crate::model::{Account, Change};
use crate::{Error, Result};

/// The remote system that records reviewers on changes
#[async_trait]
pub trait ChangeTracker: Send + Sync {
    /// Add reviewers and CCs in one batched call
    async fn add_reviewers_and_ccs(
        &self,
        change: &Change,
        reviewers: &[Account],
        ccs: &[Account],
        identity: &IdentityContext,
    ) -> Result<()>;

    /// Post a message on the change
    async fn post_message(&self, change: &Change, message: &str, identity: &IdentityContext) -> Result<()>;
}

/// A call recorded by [`MemoryTracker`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerCall {
    AddReviewers {
        change: u64,
        reviewers: Vec<Account>,
        ccs: Vec<Account>,
        identity: IdentityContext,
    },
    PostMessage {
        change: u64,
        message: String,
        identity: IdentityContext,
    },
}

/// Tracker that records calls in memory
#[derive(Debug, Default)]
pub struct MemoryTracker {
    calls: Mutex<Vec<TrackerCall>>,
    fail_with: Option<String>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracker whose every call fails
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_with: Some(reason.into()),
        }
    }

    /// Calls received so far
    pub fn calls(&self) -> Vec<TrackerCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: TrackerCall) -> Result<()> {
        if let Some(reason) = &self.fail_with {
            return Err(Error::Tracker(reason.clone()));
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        Ok(())
    }
}

#[async_trait]
impl ChangeTracker for MemoryTracker {
    async fn add_reviewers_and_ccs(
        &self,
        change: &Change,
        reviewers: &[Account],
        ccs: &[Account],
        identity: &IdentityContext,
    ) -> Result<()> {
        self.record(TrackerCall::AddReviewers {
            change: change.number,
            reviewers: reviewers.to_vec(),
            ccs: ccs.to_vec(),
            identity: identity.clone(),
        })
    }

    async fn post_message(&self, change: &Change, message: &str, identity: &IdentityContext) -> Result<()> {
        self.record(TrackerCall::PostMessage {
            change: change.number,
            message: message.to_string(),
            identity: identity.clone(),
        })
    }
}
