//! Condition expression trees and their parser.
//!
//! # Syntax
//!
//! - `always()`, `succeeded()`, `failed()`, `canceled()`, `succeededOrFailed()`
//! - `and(a, b, ...)`, `or(a, b, ...)`, `not(a)`
//! - `eq(a, b)`, `ne(a, b)`, `contains(haystack, needle)`
//! - `'text'` string literals (`''` is an escaped quote), `true`, `false`
//! - `variables['name']` or `variables.name`
//!
//! Function names are case-insensitive.

use std::fmt;

use super::ConditionError;

/// A node of a parsed condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Function call, name stored lower-cased.
    Call { name: String, args: Vec<Expr> },
    /// String literal.
    Literal(String),
    /// Boolean literal.
    Bool(bool),
    /// Variable lookup.
    Variable(String),
}

/// Functions known to the parser with their arity bounds.
const FUNCTIONS: &[(&str, usize, Option<usize>)] = &[
    ("always", 0, Some(0)),
    ("succeeded", 0, Some(0)),
    ("failed", 0, Some(0)),
    ("canceled", 0, Some(0)),
    ("succeededorfailed", 0, Some(0)),
    ("and", 2, None),
    ("or", 2, None),
    ("not", 1, Some(1)),
    ("eq", 2, Some(2)),
    ("ne", 2, Some(2)),
    ("contains", 2, Some(2)),
];

/// A parsed step condition.
///
/// ```
/// use stepworker::condition::Condition;
///
/// let condition = Condition::parse("and(succeeded(), eq(variables['Build.Reason'], 'Manual'))").unwrap();
/// assert_eq!(condition.to_string(), "and(succeeded(), eq(variables['Build.Reason'], 'Manual'))");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    source: String,
    root: Expr,
}

impl Condition {
    /// Parse an expression.
    pub fn parse(source: &str) -> Result<Self, ConditionError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            source,
        };
        let root = parser.expr()?;
        if parser.pos != tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(Self {
            source: source.trim().to_string(),
            root,
        })
    }

    /// The condition steps get when none is configured: `succeeded()`.
    pub fn succeeded() -> Self {
        Self::call("succeeded()", "succeeded")
    }

    /// `always()`.
    pub fn always() -> Self {
        Self::call("always()", "always")
    }

    /// `failed()`.
    pub fn failed() -> Self {
        Self::call("failed()", "failed")
    }

    /// `canceled()`.
    pub fn canceled() -> Self {
        Self::call("canceled()", "canceled")
    }

    /// `succeededOrFailed()`.
    pub fn succeeded_or_failed() -> Self {
        Self::call("succeededOrFailed()", "succeededorfailed")
    }

    fn call(source: &str, name: &str) -> Self {
        Self {
            source: source.to_string(),
            root: Expr::Call {
                name: name.to_string(),
                args: Vec::new(),
            },
        }
    }

    /// Root of the expression tree.
    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// The expression as written.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::succeeded()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::str::FromStr for Condition {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Condition::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ConditionError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            '[' => tokens.push(Token::LBracket),
            ']' => tokens.push(Token::RBracket),
            ',' => tokens.push(Token::Comma),
            '\'' => {
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some((_, '\'')) => {
                            if matches!(chars.peek(), Some((_, '\''))) {
                                chars.next();
                                text.push('\'');
                            } else {
                                break;
                            }
                        }
                        Some((_, c)) => text.push(c),
                        None => {
                            return Err(ConditionError::Parse {
                                expression: source.to_string(),
                                message: format!("unterminated string starting at {}", offset),
                            })
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut ident = String::from(c);
                while let Some(&(_, next)) = chars.peek() {
                    if next.is_alphanumeric() || matches!(next, '_' | '.' | '-') {
                        ident.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => {
                return Err(ConditionError::Parse {
                    expression: source.to_string(),
                    message: format!("unexpected character '{}' at {}", other, offset),
                })
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    source: &'a str,
}

impl<'a> Parser<'a> {
    fn error(&self, message: &str) -> ConditionError {
        ConditionError::Parse {
            expression: self.source.to_string(),
            message: message.to_string(),
        }
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ConditionError> {
        match self.next() {
            Some(token) if *token == expected => Ok(()),
            _ => Err(self.error(&format!("expected {}", what))),
        }
    }

    fn expr(&mut self) -> Result<Expr, ConditionError> {
        match self.next().cloned() {
            Some(Token::Str(text)) => Ok(Expr::Literal(text)),
            Some(Token::Ident(ident)) => self.ident(ident),
            _ => Err(self.error("expected an expression")),
        }
    }

    fn ident(&mut self, ident: String) -> Result<Expr, ConditionError> {
        let lower = ident.to_ascii_lowercase();

        if lower == "variables" && self.peek() == Some(&Token::LBracket) {
            self.pos += 1;
            let name = match self.next() {
                Some(Token::Str(name)) => name.clone(),
                _ => return Err(self.error("expected a quoted variable name")),
            };
            self.expect(Token::RBracket, "']'")?;
            return Ok(Expr::Variable(name));
        }
        if let Some(name) = ident
            .get(..10)
            .filter(|p| p.eq_ignore_ascii_case("variables."))
            .map(|_| &ident[10..])
        {
            if name.is_empty() {
                return Err(self.error("expected a variable name after 'variables.'"));
            }
            return Ok(Expr::Variable(name.to_string()));
        }

        if self.peek() != Some(&Token::LParen) {
            return match lower.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                _ => Err(self.error(&format!("unrecognized value '{}'", ident))),
            };
        }
        self.pos += 1;

        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
        } else {
            loop {
                args.push(self.expr()?);
                match self.next() {
                    Some(Token::Comma) => continue,
                    Some(Token::RParen) => break,
                    _ => return Err(self.error("expected ',' or ')'")),
                }
            }
        }

        let Some(&(_, min, max)) = FUNCTIONS.iter().find(|(name, _, _)| *name == lower) else {
            return Err(self.error(&format!("unrecognized function '{}'", ident)));
        };
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            return Err(self.error(&format!(
                "wrong number of arguments to '{}': {}",
                ident,
                args.len()
            )));
        }

        Ok(Expr::Call { name: lower, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            name: name.to_string(),
            args,
        }
    }

    #[test]
    fn parses_status_functions_case_insensitively() {
        let condition = Condition::parse("SucceededOrFailed()").unwrap();
        assert_eq!(condition.root(), &call("succeededorfailed", vec![]));
    }

    #[test]
    fn parses_nested_calls_and_lookups() {
        let condition =
            Condition::parse("and(succeeded(), ne(variables['a.b'], 'it''s'), variables.c)")
                .unwrap();
        assert_eq!(
            condition.root(),
            &call(
                "and",
                vec![
                    call("succeeded", vec![]),
                    call(
                        "ne",
                        vec![Expr::Variable("a.b".into()), Expr::Literal("it's".into())]
                    ),
                    Expr::Variable("c".into()),
                ]
            )
        );
    }

    #[test]
    fn parses_boolean_literals() {
        let condition = Condition::parse("or(false, TRUE)").unwrap();
        assert_eq!(
            condition.root(),
            &call("or", vec![Expr::Bool(false), Expr::Bool(true)])
        );
    }

    #[test]
    fn rejects_unknown_function() {
        let err = Condition::parse("sometimes()").unwrap_err();
        assert!(err.to_string().contains("sometimes"));
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(Condition::parse("not()").is_err());
        assert!(Condition::parse("and(true)").is_err());
        assert!(Condition::parse("always(true)").is_err());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(Condition::parse("").is_err());
        assert!(Condition::parse("eq('a', 'b'").is_err());
        assert!(Condition::parse("'unterminated").is_err());
        assert!(Condition::parse("always() always()").is_err());
        assert!(Condition::parse("eq(1 == 2)").is_err());
    }

    #[test]
    fn default_is_succeeded() {
        assert_eq!(Condition::default(), Condition::succeeded());
        assert_eq!(Condition::default().to_string(), "succeeded()");
    }
}
