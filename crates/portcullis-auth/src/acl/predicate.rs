//! ACL predicate grammar: lexer, recursive-descent parser and tree-walking
//! evaluator.
//!
//! The grammar is the stable textual surface ACL rules are persisted in:
//!
//! ```text
//! predicate := or
//! or        := and ('or' and)*
//! and       := unary ('and' unary)*
//! unary     := 'not' unary | '(' predicate ')' | call
//! call      := 'path-template' '(' string ')'
//!            | 'equals' '(' value ',' value ')'
//! value     := string | '${' name '}'
//! string    := '\'' ... '\'' | '"' ... '"'   (with \\ escapes)
//! ```
//!
//! `path-template` matches the request path structurally and, on success,
//! binds its `{name}` variables for later terms of the same evaluation.
//! `${name}` references such a binding (or one attached by the pipeline's own
//! path match). Anything else — unknown function names in particular — is a
//! parse-time error, never a default verdict at request time.

use indexmap::IndexMap;
use thiserror::Error;

use portcullis_core::{CoreError, PathTemplate, RequestContext};

// =============================================================================
// Syntax Errors
// =============================================================================

/// Errors raised while parsing a predicate.
#[derive(Debug, Error)]
pub enum PredicateSyntaxError {
    /// A character outside the grammar.
    #[error("unexpected character '{found}' at byte {at}")]
    UnexpectedChar {
        /// The offending character.
        found: char,
        /// Byte offset in the predicate source.
        at: usize,
    },

    /// A string literal without a closing quote.
    #[error("unterminated string literal starting at byte {at}")]
    UnterminatedString {
        /// Byte offset where the literal opened.
        at: usize,
    },

    /// A `${` reference without a closing brace.
    #[error("unterminated variable reference starting at byte {at}")]
    UnterminatedReference {
        /// Byte offset where the reference opened.
        at: usize,
    },

    /// A function name outside the grammar.
    #[error("unknown predicate function '{name}'")]
    UnknownFunction {
        /// The unrecognized name.
        name: String,
    },

    /// The predicate ended where a token was required.
    #[error("unexpected end of predicate")]
    UnexpectedEnd,

    /// A well-formed token in the wrong position.
    #[error("unexpected {found}, expected {expected}")]
    UnexpectedToken {
        /// Description of what was found.
        found: String,
        /// Description of what the grammar required.
        expected: &'static str,
    },

    /// The argument of `path-template` is not a valid template.
    #[error(transparent)]
    InvalidTemplate(#[from] CoreError),
}

// =============================================================================
// Lexer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Reference(String),
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("'{name}'"),
            Self::Str(_) => "string literal".to_string(),
            Self::Reference(name) => format!("reference '${{{name}}}'"),
            Self::LParen => "'('".to_string(),
            Self::RParen => "')'".to_string(),
            Self::Comma => "','".to_string(),
        }
    }
}

fn lex(input: &str) -> Result<Vec<Token>, PredicateSyntaxError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0usize;

    while pos < bytes.len() {
        let c = input[pos..]
            .chars()
            .next()
            .ok_or(PredicateSyntaxError::UnexpectedEnd)?;

        match c {
            ' ' | '\t' | '\r' | '\n' => pos += 1,
            '(' => {
                tokens.push(Token::LParen);
                pos += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                pos += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                pos += 1;
            }
            '\'' | '"' => {
                let (literal, consumed) = lex_string(&input[pos..], c)
                    .ok_or(PredicateSyntaxError::UnterminatedString { at: pos })?;
                tokens.push(Token::Str(literal));
                pos += consumed;
            }
            '$' => {
                let (name, consumed) = lex_reference(&input[pos..])
                    .ok_or(PredicateSyntaxError::UnterminatedReference { at: pos })?;
                tokens.push(Token::Reference(name));
                pos += consumed;
            }
            c if c.is_ascii_alphabetic() => {
                let end = input[pos..]
                    .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'))
                    .map_or(input.len(), |offset| pos + offset);
                tokens.push(Token::Ident(input[pos..end].to_string()));
                pos = end;
            }
            other => {
                return Err(PredicateSyntaxError::UnexpectedChar {
                    found: other,
                    at: pos,
                });
            }
        }
    }

    Ok(tokens)
}

/// Lex a quoted string starting at `input[0]`; returns the unescaped content
/// and the number of bytes consumed (including both quotes).
fn lex_string(input: &str, quote: char) -> Option<(String, usize)> {
    let mut value = String::new();
    let mut chars = input.char_indices().skip(1);

    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, escaped) = chars.next()?;
                value.push(escaped);
            }
            c if c == quote => return Some((value, idx + c.len_utf8())),
            c => value.push(c),
        }
    }

    None
}

/// Lex a `${name}` reference starting at `input[0] == '$'`.
fn lex_reference(input: &str) -> Option<(String, usize)> {
    let after = input.strip_prefix("${")?;
    let close = after.find('}')?;
    let name = &after[..close];
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), 2 + close + 1))
}

// =============================================================================
// Predicate Tree
// =============================================================================

/// One side of an `equals` comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueRef {
    /// A quoted string literal.
    Literal(String),
    /// A `${name}` reference to a bound template variable.
    Binding(String),
}

impl ValueRef {
    fn resolve<'a>(&'a self, bindings: &'a IndexMap<String, String>) -> Option<&'a str> {
        match self {
            Self::Literal(value) => Some(value),
            Self::Binding(name) => bindings.get(name).map(String::as_str),
        }
    }
}

/// A parsed, executable boolean predicate over a request snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Structural path match that binds its template variables.
    PathTemplate(PathTemplate),
    /// Exact string equality of two resolved values.
    Equals(ValueRef, ValueRef),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Parse a predicate, failing fast on anything outside the grammar.
    pub fn parse(input: &str) -> Result<Self, PredicateSyntaxError> {
        let tokens = lex(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let predicate = parser.parse_or()?;

        if let Some(extra) = parser.peek() {
            return Err(PredicateSyntaxError::UnexpectedToken {
                found: extra.describe(),
                expected: "end of predicate",
            });
        }

        Ok(predicate)
    }

    /// Evaluate against a request snapshot.
    ///
    /// Evaluation is pure and deterministic for a given snapshot: terms run
    /// left to right, `and`/`or` short-circuit, and `path-template` bindings
    /// become visible to the terms after it. The bindings start out seeded
    /// from the pipeline's own path match, when one is attached.
    pub fn evaluate(&self, request: &RequestContext) -> bool {
        let mut bindings: IndexMap<String, String> = IndexMap::new();
        if let Some(path_match) = request.match_result() {
            for (name, value) in path_match.iter() {
                bindings.insert(name.to_string(), value.to_string());
            }
        }
        self.eval(request, &mut bindings)
    }

    fn eval(&self, request: &RequestContext, bindings: &mut IndexMap<String, String>) -> bool {
        match self {
            Self::PathTemplate(template) => match template.matches(request.path()) {
                Some(path_match) => {
                    for (name, value) in path_match.iter() {
                        bindings.insert(name.to_string(), value.to_string());
                    }
                    true
                }
                None => false,
            },
            Self::Equals(left, right) => {
                match (left.resolve(bindings), right.resolve(bindings)) {
                    (Some(a), Some(b)) => a == b,
                    // An unresolved reference never compares equal.
                    _ => false,
                }
            }
            Self::And(a, b) => a.eval(request, bindings) && b.eval(request, bindings),
            Self::Or(a, b) => a.eval(request, bindings) || b.eval(request, bindings),
            Self::Not(inner) => !inner.eval(request, bindings),
        }
    }
}

// =============================================================================
// Parser
// =============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, PredicateSyntaxError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(PredicateSyntaxError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: &Token, what: &'static str) -> Result<(), PredicateSyntaxError> {
        let token = self.next()?;
        if &token != expected {
            return Err(PredicateSyntaxError::UnexpectedToken {
                found: token.describe(),
                expected: what,
            });
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Predicate, PredicateSyntaxError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Ident(name)) if name == "or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Predicate::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Predicate, PredicateSyntaxError> {
        let mut left = self.parse_unary()?;
        while matches!(self.peek(), Some(Token::Ident(name)) if name == "and") {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Predicate::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Predicate, PredicateSyntaxError> {
        match self.peek() {
            Some(Token::Ident(name)) if name == "not" => {
                self.pos += 1;
                Ok(Predicate::Not(Box::new(self.parse_unary()?)))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            _ => self.parse_call(),
        }
    }

    fn parse_call(&mut self) -> Result<Predicate, PredicateSyntaxError> {
        let token = self.next()?;
        let name = match token {
            Token::Ident(name) => name,
            other => {
                return Err(PredicateSyntaxError::UnexpectedToken {
                    found: other.describe(),
                    expected: "a predicate function",
                });
            }
        };

        match name.as_str() {
            "path-template" => {
                self.expect(&Token::LParen, "'('")?;
                let pattern = match self.next()? {
                    Token::Str(pattern) => pattern,
                    other => {
                        return Err(PredicateSyntaxError::UnexpectedToken {
                            found: other.describe(),
                            expected: "a quoted path template",
                        });
                    }
                };
                self.expect(&Token::RParen, "')'")?;
                let template = PathTemplate::parse(&pattern)?;
                Ok(Predicate::PathTemplate(template))
            }
            "equals" => {
                self.expect(&Token::LParen, "'('")?;
                let left = self.parse_value()?;
                self.expect(&Token::Comma, "','")?;
                let right = self.parse_value()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(Predicate::Equals(left, right))
            }
            // Misconfigured rules must fail at load time, not silently pick a
            // verdict at request time.
            other => Err(PredicateSyntaxError::UnknownFunction {
                name: other.to_string(),
            }),
        }
    }

    fn parse_value(&mut self) -> Result<ValueRef, PredicateSyntaxError> {
        match self.next()? {
            Token::Str(value) => Ok(ValueRef::Literal(value)),
            Token::Reference(name) => Ok(ValueRef::Binding(name)),
            other => Err(PredicateSyntaxError::UnexpectedToken {
                found: other.describe(),
                expected: "a string literal or ${reference}",
            }),
        }
    }
}
