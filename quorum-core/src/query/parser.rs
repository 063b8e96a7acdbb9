//! Recursive-descent parser producing the boolean query tree
//!
//! Grammar (AND binds tighter than OR; juxtaposition is an implicit AND):
//!
//! ```text
//! or    := and ( "OR" and )*
//! and   := unary ( ["AND"] unary )*
//! unary := ("NOT" | "-") unary | primary
//! primary := "(" or ")" | field ":" value | text
//! ```

use super::lexer::{tokenize, Token};
use super::QueryError;

/// Parsed filter expression, before operator validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    And(Vec<Query>),
    Or(Vec<Query>),
    Not(Box<Query>),
    /// A `name:value` leaf
    Field { name: String, value: String },
    /// A leaf without an operator
    Text(String),
}

impl Query {
    /// Visit every leaf in the tree
    pub fn for_each_leaf<'a>(&'a self, f: &mut impl FnMut(&'a Query)) {
        match self {
            Query::And(children) | Query::Or(children) => {
                for child in children {
                    child.for_each_leaf(f);
                }
            }
            Query::Not(inner) => inner.for_each_leaf(f),
            leaf => f(leaf),
        }
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Query::And(children) => write_joined(f, children, " AND "),
            Query::Or(children) => write_joined(f, children, " OR "),
            Query::Not(inner) => write!(f, "NOT {}", inner),
            Query::Field { name, value } => write!(f, "{}:{}", name, value),
            Query::Text(text) => write!(f, "{}", text),
        }
    }
}

fn write_joined(f: &mut std::fmt::Formatter<'_>, children: &[Query], sep: &str) -> std::fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", child)?;
    }
    write!(f, ")")
}

/// Parse an expression into a [`Query`] tree
pub fn parse(input: &str) -> Result<Query, QueryError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(QueryError::Malformed("empty query".to_string()));
    }

    let mut parser = Parser { tokens, pos: 0 };
    let query = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(QueryError::Malformed(format!("unexpected {:?}", token)));
    }
    Ok(query)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<Query, QueryError> {
        let mut children = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            children.push(self.parse_and()?);
        }
        Ok(collapse(children, Query::Or))
    }

    fn parse_and(&mut self) -> Result<Query, QueryError> {
        let mut children = vec![self.parse_unary()?];
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.pos += 1;
                    children.push(self.parse_unary()?);
                }
                Some(token) if token.starts_operand() => {
                    children.push(self.parse_unary()?);
                }
                _ => break,
            }
        }
        Ok(collapse(children, Query::And))
    }

    fn parse_unary(&mut self) -> Result<Query, QueryError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(Query::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Query, QueryError> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(QueryError::Malformed("missing closing parenthesis".to_string())),
                }
            }
            Some(Token::Field { name, value }) => Ok(Query::Field { name, value }),
            Some(Token::Text(text)) => Ok(Query::Text(text)),
            Some(token) => Err(QueryError::Malformed(format!("unexpected {:?}", token))),
            None => Err(QueryError::Malformed("unexpected end of query".to_string())),
        }
    }
}

fn collapse(mut children: Vec<Query>, wrap: fn(Vec<Query>) -> Query) -> Query {
    if children.len() == 1 {
        children.remove(0)
    } else {
        wrap(children)
    }
}
