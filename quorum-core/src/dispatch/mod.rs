//! Dispatch of finished assignments to the change tracking backend
//!
//! Matching, scoring and resolution happen on the event-handling task; only
//! the remote call is handed to the [`Dispatcher`]. Each task carries the
//! identity it acts as.

mod identity;
mod queue;
mod tracker;

pub use identity::IdentityContext;
pub use queue::{AssignmentTask, DispatchHandle, DispatchMode, Dispatched, Dispatcher, TaskOutcome};
pub use tracker::{ChangeTracker, MemoryTracker, TrackerCall};
