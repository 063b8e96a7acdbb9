//! Operator allow-list and compilation of expressions into predicates

use super::parser::{parse, Query};
use super::predicate::{Leaf, Predicate};
use super::{is_wildcard, QueryError};

/// Operators a filter expression may use
pub const ALLOWED_OPERATORS: &[&str] = &[
    "added",
    "after",
    "age",
    "assignee",
    "author",
    "before",
    "branch",
    "committer",
    "deleted",
    "delta",
    "destination",
    "dir",
    "directory",
    "ext",
    "extension",
    "f",
    "file",
    "footer",
    "hashtag",
    "intopic",
    "label",
    "onlyextensions",
    "onlyexts",
    "ownerin",
    "path",
    "r",
    "ref",
    "reviewer",
    "reviewerin",
    "size",
    "status",
    "submittable",
    "topic",
    "unresolved",
    "wip",
];

/// Check that an expression only uses allowed operators with valid values
pub fn validate(expression: &str) -> Result<(), QueryError> {
    compile(expression).map(|_| ())
}

/// Parse, check and compile an expression
///
/// The wildcard (`*` or empty) compiles to [`Predicate::Always`].
pub fn compile(expression: &str) -> Result<Predicate, QueryError> {
    if is_wildcard(expression) {
        return Ok(Predicate::Always);
    }
    let query = parse(expression.trim())?;
    lower(&query)
}

fn lower(query: &Query) -> Result<Predicate, QueryError> {
    match query {
        Query::And(children) => Ok(Predicate::And(
            children.iter().map(lower).collect::<Result<_, _>>()?,
        )),
        Query::Or(children) => Ok(Predicate::Or(
            children.iter().map(lower).collect::<Result<_, _>>()?,
        )),
        Query::Not(inner) => Ok(Predicate::Not(Box::new(lower(inner)?))),
        Query::Text(text) => Err(QueryError::MissingOperator(text.clone())),
        Query::Field { name, value } => {
            let operator = name.to_ascii_lowercase();
            if !ALLOWED_OPERATORS.contains(&operator.as_str()) {
                return Err(QueryError::UnsupportedOperator(name.clone()));
            }
            Ok(Predicate::Leaf(Leaf::parse(&operator, value)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards_are_valid() {
        assert!(validate("*").is_ok());
        assert!(validate("").is_ok());
        assert!(validate("   ").is_ok());
        assert!(matches!(compile("*").unwrap(), Predicate::Always));
    }

    #[test]
    fn test_allowed_operator() {
        assert!(validate("branch:main").is_ok());
        assert!(validate("BRANCH:main").is_ok());
        assert!(validate("branch:main AND (file:a.txt OR -ext:md)").is_ok());
    }

    #[test]
    fn test_unsupported_operator() {
        assert_eq!(
            validate("message:foo"),
            Err(QueryError::UnsupportedOperator("message".to_string()))
        );
        assert_eq!(
            validate("branch:main OR is:open"),
            Err(QueryError::UnsupportedOperator("is".to_string()))
        );
    }

    #[test]
    fn test_default_field_rejected() {
        assert_eq!(
            validate("foo"),
            Err(QueryError::MissingOperator("foo".to_string()))
        );
        assert_eq!(
            validate(r#"branch:main "some text""#),
            Err(QueryError::MissingOperator("some text".to_string()))
        );
    }

    #[test]
    fn test_value_errors_are_malformed() {
        assert!(matches!(validate("file:^(unclosed"), Err(QueryError::Malformed(_))));
        assert!(matches!(validate("status:sleeping"), Err(QueryError::Malformed(_))));
        assert!(matches!(validate("wip:maybe"), Err(QueryError::Malformed(_))));
        assert!(matches!(validate("(branch:main"), Err(QueryError::Malformed(_))));
    }

    #[test]
    fn test_allow_list_is_sorted_and_unique() {
        let mut sorted = ALLOWED_OPERATORS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted, ALLOWED_OPERATORS);
    }
}
