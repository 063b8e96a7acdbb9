//! Quorum Core - automatic reviewer assignment for code changes
//!
//! Project owners describe, per project, which reviewers and CCs a change
//! should get using search-style match expressions. When a change event
//! arrives, the [`Pipeline`] matches the project's rules against the change,
//! optionally scores line authors with blame, resolves identifiers to
//! accounts, drops anyone already involved and hands one batched assignment
//! to a [`ChangeTracker`].

pub mod blame;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod matcher;
pub mod model;
pub mod pipeline;
pub mod planner;
pub mod query;
pub mod resolver;
pub mod rules;
pub mod secrets;

pub use config::{CliOverrides, Config};
pub use dispatch::{ChangeTracker, DispatchMode, Dispatcher, IdentityContext};
pub use error::{Error, Result};
pub use model::{Account, AccountId, Change, ChangeEvent, ChangeEventKind};
pub use pipeline::{NoOpReason, Outcome, Pipeline, Preview, Stage};
pub use planner::Assignment;
pub use resolver::{AccountDirectory, Resolver};
pub use rules::{FilterRule, ProjectRules, ReviewerType, RuleCache, RuleSource};
pub use secrets::Secrets;
