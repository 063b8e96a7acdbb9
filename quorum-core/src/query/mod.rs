//! Filter expression language
//!
//! Rules select changes with a small query language modelled on code-review
//! search syntax (`branch:main -file:^docs/.* OR label:Verified-1`). Only an
//! allow-listed set of operators is accepted; anything else is rejected when
//! the rule is written, never when it is evaluated.

mod lexer;
mod parser;
mod predicate;
mod validator;

pub use parser::{parse, Query};
pub use predicate::{
    ChangeView, CmpOp, Comparison, LabelFilter, Leaf, MatchScope, Pattern, Predicate,
    StatusFilter,
};
pub use validator::{compile, validate, ALLOWED_OPERATORS};

pub(crate) use predicate::anchored_regex;

use thiserror::Error;

/// Reasons a filter expression is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Specific search operator required: {0}")]
    MissingOperator(String),

    #[error("Malformed filter: {0}")]
    Malformed(String),
}

/// Whether an expression matches every change
pub fn is_wildcard(expression: &str) -> bool {
    let trimmed = expression.trim();
    trimmed.is_empty() || trimmed == "*"
}
