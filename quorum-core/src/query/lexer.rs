//! Tokenizer for filter expressions

use super::QueryError;

/// A lexical token of a filter expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    LParen,
    RParen,
    And,
    Or,
    Not,
    /// `name:value`
    Field { name: String, value: String },
    /// A term without an operator (bare word or quoted phrase)
    Text(String),
}

impl Token {
    /// Whether this token can start an operand
    pub(crate) fn starts_operand(&self) -> bool {
        matches!(
            self,
            Token::LParen | Token::Not | Token::Field { .. } | Token::Text(_)
        )
    }
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, QueryError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        if c.is_whitespace() {
            pos += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                pos += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                pos += 1;
            }
            '-' if chars.get(pos + 1).is_some_and(|n| !n.is_whitespace()) => {
                tokens.push(Token::Not);
                pos += 1;
            }
            '"' => {
                let (text, next) = read_quoted(&chars, pos)?;
                tokens.push(Token::Text(text));
                pos = next;
            }
            _ => {
                let start = pos;
                while pos < chars.len() && !is_word_break(chars[pos]) {
                    pos += 1;
                }
                let word: String = chars[start..pos].iter().collect();

                if chars.get(pos) == Some(&':') && is_field_name(&word) {
                    let (value, next) = read_value(&chars, pos + 1)?;
                    if value.is_empty() {
                        return Err(QueryError::Malformed(format!(
                            "operator \"{}\" requires a value",
                            word
                        )));
                    }
                    tokens.push(Token::Field { name: word, value });
                    pos = next;
                    continue;
                }

                if word.is_empty() {
                    // A stray ':' or '"' glued to nothing useful
                    return Err(QueryError::Malformed(format!(
                        "unexpected character '{}' at position {}",
                        c, pos
                    )));
                }

                tokens.push(match word.as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    _ => Token::Text(word),
                });
            }
        }
    }

    Ok(tokens)
}

fn is_word_break(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | ':' | '"')
}

fn is_field_name(word: &str) -> bool {
    !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Read a field value starting at `pos` (just after the colon)
fn read_value(chars: &[char], pos: usize) -> Result<(String, usize), QueryError> {
    match chars.get(pos) {
        Some('"') => read_quoted(chars, pos),
        Some('{') => read_braced(chars, pos),
        _ => {
            // Bare values may contain balanced parentheses, e.g. `file:^(a|b)\.rs`
            let mut depth = 0usize;
            let mut end = pos;
            while end < chars.len() {
                let c = chars[end];
                if c.is_whitespace() {
                    break;
                }
                if c == '(' {
                    depth += 1;
                } else if c == ')' {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                end += 1;
            }
            Ok((chars[pos..end].iter().collect(), end))
        }
    }
}

fn read_quoted(chars: &[char], pos: usize) -> Result<(String, usize), QueryError> {
    let mut out = String::new();
    let mut i = pos + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                out.push(chars[i + 1]);
                i += 2;
            }
            '"' => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(QueryError::Malformed("unterminated quoted string".to_string()))
}

fn read_braced(chars: &[char], pos: usize) -> Result<(String, usize), QueryError> {
    let mut i = pos + 1;
    while i < chars.len() {
        if chars[i] == '}' {
            return Ok((chars[pos + 1..i].iter().collect(), i + 1));
        }
        i += 1;
    }
    Err(QueryError::Malformed("unterminated braced value".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, value: &str) -> Token {
        Token::Field {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_simple_field() {
        assert_eq!(tokenize("branch:main").unwrap(), vec![field("branch", "main")]);
    }

    #[test]
    fn test_operators_and_parens() {
        let tokens = tokenize("(branch:main OR branch:dev) AND NOT file:x -topic:y").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::LParen,
                field("branch", "main"),
                Token::Or,
                field("branch", "dev"),
                Token::RParen,
                Token::And,
                Token::Not,
                field("file", "x"),
                Token::Not,
                field("topic", "y"),
            ]
        );
    }

    #[test]
    fn test_quoted_and_braced_values() {
        let tokens = tokenize(r#"topic:"my topic" path:{a b/c.txt}"#).unwrap();
        assert_eq!(
            tokens,
            vec![field("topic", "my topic"), field("path", "a b/c.txt")]
        );
    }

    #[test]
    fn test_regex_value_with_parens() {
        let tokens = tokenize(r"(file:^(src|lib)/.*\.rs)").unwrap();
        assert_eq!(
            tokens,
            vec![Token::LParen, field("file", r"^(src|lib)/.*\.rs"), Token::RParen]
        );
    }

    #[test]
    fn test_bare_words_are_text() {
        assert_eq!(
            tokenize(r#"foo "bar baz""#).unwrap(),
            vec![Token::Text("foo".into()), Token::Text("bar baz".into())]
        );
    }

    #[test]
    fn test_empty_value_is_malformed() {
        assert!(matches!(tokenize("branch:"), Err(QueryError::Malformed(_))));
        assert!(matches!(tokenize("branch: main"), Err(QueryError::Malformed(_))));
    }

    #[test]
    fn test_unterminated_quote() {
        assert!(matches!(tokenize(r#"topic:"abc"#), Err(QueryError::Malformed(_))));
    }

    #[test]
    fn test_label_value_keeps_signs() {
        assert_eq!(
            tokenize("label:Code-Review+2").unwrap(),
            vec![field("label", "Code-Review+2")]
        );
    }
}
