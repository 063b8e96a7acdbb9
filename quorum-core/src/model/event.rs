//! Change lifecycle events

use serde::{Deserialize, Serialize};

use super::account::Account;
use super::change::Change;

/// What happened to a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeEventKind {
    /// A new revision (patch set) was uploaded
    RevisionCreated,
    /// The private flag was toggled
    PrivacyChanged,
    /// The work-in-progress flag was toggled
    WorkInProgressChanged,
}

impl std::fmt::Display for ChangeEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeEventKind::RevisionCreated => "revision-created",
            ChangeEventKind::PrivacyChanged => "privacy-changed",
            ChangeEventKind::WorkInProgressChanged => "wip-changed",
        };
        write!(f, "{}", s)
    }
}

/// An event delivered by the event source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeEventKind,
    /// Snapshot of the change after the event
    pub change: Change,
    /// Account that triggered the event (the uploader for new revisions)
    pub actor: Account,
}

impl ChangeEvent {
    pub fn new(kind: ChangeEventKind, change: Change, actor: Account) -> Self {
        Self {
            kind,
            change,
            actor,
        }
    }

    /// A new revision uploaded by `actor`
    pub fn revision_created(change: Change, actor: Account) -> Self {
        Self::new(ChangeEventKind::RevisionCreated, change, actor)
    }
}
