//! Tokenizer and recursive-descent parser for source selectors.

use super::QueryError;

/// Parsed source selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    All,
    /// Folder prefix (vault-relative, no trailing slash).
    Folder(String),
    /// Normalized tag; also matches nested children.
    Tag(String),
    /// Notes linking to the target; `None` means the context note.
    LinksTo(Option<String>),
    Not(Box<Query>),
    And(Vec<Query>),
    Or(Vec<Query>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Folder(String),
    Tag(String),
    Link(String),
    Star,
    And,
    Or,
    Minus,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Folder(f) => format!("\"{f}\""),
            Token::Tag(t) => format!("#{t}"),
            Token::Link(l) => format!("[[{l}]]"),
            Token::Star => "*".into(),
            Token::And => "and".into(),
            Token::Or => "or".into(),
            Token::Minus => "-".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
        }
    }
}

/// Parse a selector. An empty or whitespace-only selector selects every note.
pub fn parse(input: &str) -> Result<Query, QueryError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Ok(Query::All);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let query = parser.parse_or()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(query),
        Some((tok, position)) => {
            Err(QueryError::UnexpectedToken { token: tok.describe(), position: *position })
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, QueryError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push((Token::LParen, pos));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, pos));
                i += 1;
            }
            '*' => {
                tokens.push((Token::Star, pos));
                i += 1;
            }
            '-' | '!' => {
                tokens.push((Token::Minus, pos));
                i += 1;
            }
            '"' => {
                let start = i + 1;
                let end = (start..chars.len())
                    .find(|&j| chars[j].1 == '"')
                    .ok_or(QueryError::Unterminated("folder", pos))?;
                let folder: String = chars[start..end].iter().map(|(_, c)| c).collect();
                tokens.push((Token::Folder(folder.trim_matches('/').to_string()), pos));
                i = end + 1;
            }
            '#' => {
                let start = i + 1;
                let end = (start..chars.len())
                    .find(|&j| chars[j].1.is_whitespace() || matches!(chars[j].1, '(' | ')'))
                    .unwrap_or(chars.len());
                let tag: String = chars[start..end].iter().map(|(_, c)| c).collect();
                if tag.is_empty() {
                    return Err(QueryError::UnexpectedToken { token: "#".into(), position: pos });
                }
                tokens.push((Token::Tag(crate::store::normalize_tag(&tag)), pos));
                i = end;
            }
            '[' if chars.get(i + 1).is_some_and(|(_, c)| *c == '[') => {
                let start = i + 2;
                let end = (start..chars.len().saturating_sub(1))
                    .find(|&j| chars[j].1 == ']' && chars[j + 1].1 == ']')
                    .ok_or(QueryError::Unterminated("link", pos))?;
                let link: String = chars[start..end].iter().map(|(_, c)| c).collect();
                tokens.push((Token::Link(link.trim().to_string()), pos));
                i = end + 2;
            }
            _ => {
                let start = i;
                let end = (start..chars.len())
                    .find(|&j| chars[j].1.is_whitespace() || matches!(chars[j].1, '(' | ')'))
                    .unwrap_or(chars.len());
                let word: String = chars[start..end].iter().map(|(_, c)| c).collect();
                let token = match word.to_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    _ => {
                        return Err(QueryError::UnexpectedToken { token: word, position: pos });
                    }
                };
                tokens.push((token, pos));
                i = end;
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Result<(Token, usize), QueryError> {
        let tok = self.tokens.get(self.pos).cloned().ok_or(QueryError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(tok)
    }

    fn parse_or(&mut self) -> Result<Query, QueryError> {
        let mut terms = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            terms.push(self.parse_and()?);
        }
        Ok(if terms.len() == 1 { terms.remove(0) } else { Query::Or(terms) })
    }

    fn parse_and(&mut self) -> Result<Query, QueryError> {
        let mut terms = vec![self.parse_unary()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            terms.push(self.parse_unary()?);
        }
        Ok(if terms.len() == 1 { terms.remove(0) } else { Query::And(terms) })
    }

    fn parse_unary(&mut self) -> Result<Query, QueryError> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            return Ok(Query::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Query, QueryError> {
        let (tok, position) = self.next()?;
        match tok {
            Token::Star => Ok(Query::All),
            Token::Folder(f) if f.is_empty() => Ok(Query::All),
            Token::Folder(f) => Ok(Query::Folder(f)),
            Token::Tag(t) => Ok(Query::Tag(t)),
            Token::Link(l) if l.is_empty() => Ok(Query::LinksTo(None)),
            Token::Link(l) => Ok(Query::LinksTo(Some(l))),
            Token::LParen => {
                let inner = self.parse_or()?;
                match self.next()? {
                    (Token::RParen, _) => Ok(inner),
                    (other, position) => Err(QueryError::UnexpectedToken {
                        token: other.describe(),
                        position,
                    }),
                }
            }
            other => Err(QueryError::UnexpectedToken { token: other.describe(), position }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", Query::All)]
    #[case("   ", Query::All)]
    #[case("\"\"", Query::All)]
    #[case("*", Query::All)]
    #[case("\"Books/\"", Query::Folder("Books".into()))]
    #[case("#Novel", Query::Tag("novel".into()))]
    #[case("[[Projects/Alpha]]", Query::LinksTo(Some("Projects/Alpha".into())))]
    #[case("[[]]", Query::LinksTo(None))]
    fn parses_single_terms(#[case] input: &str, #[case] expected: Query) {
        assert_eq!(parse(input).unwrap(), expected);
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let q = parse("#a or #b and #c").unwrap();
        assert_eq!(
            q,
            Query::Or(vec![
                Query::Tag("a".into()),
                Query::And(vec![Query::Tag("b".into()), Query::Tag("c".into())]),
            ])
        );
    }

    #[test]
    fn negation_and_parentheses() {
        let q = parse("\"Books\" and -(#draft or #archived)").unwrap();
        assert_eq!(
            q,
            Query::And(vec![
                Query::Folder("Books".into()),
                Query::Not(Box::new(Query::Or(vec![
                    Query::Tag("draft".into()),
                    Query::Tag("archived".into()),
                ]))),
            ])
        );
    }

    #[rstest]
    #[case("\"Books")]
    #[case("#a and")]
    #[case("(#a")]
    #[case("#a #b")]
    #[case("books")]
    #[case("[[open")]
    fn rejects_malformed(#[case] input: &str) {
        assert!(parse(input).is_err(), "expected error for {input:?}");
    }
}
