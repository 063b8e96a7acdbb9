//! Domain model: accounts, change snapshots and lifecycle events

mod account;
mod change;
mod event;

pub use account::{Account, AccountId, Person};
pub use change::{Change, ChangeKind, ChangeStatus, FileChange, LabelVote};
pub use event::{ChangeEvent, ChangeEventKind};
