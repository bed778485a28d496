//! Query parser: token stream to predicate tree.

use super::token::{Token, TokenKind};
use super::InvalidQuery;
use crate::path::PropertyPath;
use crate::predicate::{CompareOp, Predicate};

/// Parse a token stream into a predicate.
///
/// An empty stream yields `Ok(None)`. Logical operators fold left to right
/// with no precedence between `&` and `|`.
pub fn parse(tokens: &[Token]) -> Result<Option<Predicate>, InvalidQuery> {
    if tokens.is_empty() {
        return Ok(None);
    }

    let mut parser = Parser { tokens, pos: 0 };
    let predicate = parser.expression()?;

    match parser.peek() {
        None => Ok(Some(predicate)),
        Some(token) if token.kind == TokenKind::BracketClose => Err(InvalidQuery::parse(
            format!("unmatched ')' at token {}", parser.pos),
        )),
        Some(token) => Err(InvalidQuery::parse(format!(
            "unexpected token '{}' at token {}; expected a logical operator",
            token.text, parser.pos
        ))),
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expression(&mut self) -> Result<Predicate, InvalidQuery> {
        let mut acc = self.term()?;

        while let Some(token) = self.peek() {
            if token.kind != TokenKind::LogicalOp {
                break;
            }
            self.pos += 1;
            let next = self.term()?;
            acc = match token.text.as_str() {
                "&" => Predicate::and(acc, next),
                "|" => Predicate::or(acc, next),
                other => {
                    return Err(InvalidQuery::parse(format!(
                        "unknown logical operator '{}'",
                        other
                    )))
                }
            };
        }

        Ok(acc)
    }

    fn term(&mut self) -> Result<Predicate, InvalidQuery> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::LogicalUnaryOp => {
                self.pos += 1;
                Ok(Predicate::not(self.operand()?))
            }
            _ => self.operand(),
        }
    }

    fn operand(&mut self) -> Result<Predicate, InvalidQuery> {
        let token = self
            .next()
            .ok_or_else(|| InvalidQuery::parse("query ends where an expression was expected"))?;

        match token.kind {
            TokenKind::BracketOpen => {
                let inner = self.expression()?;
                match self.next() {
                    Some(close) if close.kind == TokenKind::BracketClose => Ok(inner),
                    Some(other) => Err(InvalidQuery::parse(format!(
                        "unexpected token '{}'; expected ')'",
                        other.text
                    ))),
                    None => Err(InvalidQuery::parse("missing closing bracket")),
                }
            }
            TokenKind::RelationalOp => self.comparison(&token.text),
            TokenKind::RelationalOpFunc => self.function(&token.text),
            _ => Err(InvalidQuery::parse(format!(
                "unexpected token '{}' at token {}; expected a comparison or '('",
                token.text,
                self.pos - 1
            ))),
        }
    }

    fn comparison(&mut self, op: &str) -> Result<Predicate, InvalidQuery> {
        let path = self.property(op)?;
        let value = match self.next() {
            Some(token) if token.kind == TokenKind::Value => token.text.clone(),
            _ => {
                return Err(InvalidQuery::parse(format!(
                    "missing right operand for '{}' on property '{}'",
                    op, path
                )))
            }
        };

        let predicate = match op {
            "!=" => Predicate::ne(path, value),
            _ => {
                let op = CompareOp::from_symbol(op).ok_or_else(|| {
                    InvalidQuery::parse(format!("unknown relational operator '{}'", op))
                })?;
                Predicate::compare(path, op, value)
            }
        };
        Ok(predicate)
    }

    fn function(&mut self, op: &str) -> Result<Predicate, InvalidQuery> {
        let path = self.property(op)?;

        let argument = match self.peek() {
            Some(token) if token.kind == TokenKind::Value => {
                self.pos += 1;
                Some(token.text.as_str())
            }
            _ => None,
        };
        match self.next() {
            Some(token) if token.kind == TokenKind::BracketClose => {}
            _ => {
                return Err(InvalidQuery::parse(format!(
                    "missing closing bracket for '{}' on property '{}'",
                    op, path
                )))
            }
        }

        match (op, argument) {
            (".in(", Some(list)) => in_list(path, list),
            (".in(", None) => Err(InvalidQuery::parse(format!(
                "'.in(' on property '{}' requires at least one value",
                path
            ))),
            (".isEmpty(", None) => Ok(Predicate::CategoryIsEmpty(path)),
            (".isEmpty(", Some(arg)) => Err(InvalidQuery::parse(format!(
                "'.isEmpty(' on property '{}' takes no operand, found '{}'",
                path, arg
            ))),
            (other, _) => Err(InvalidQuery::parse(format!(
                "unknown relational function '{}'",
                other
            ))),
        }
    }

    fn property(&mut self, op: &str) -> Result<PropertyPath, InvalidQuery> {
        match self.next() {
            Some(token) if token.kind == TokenKind::Property => Ok(PropertyPath::new(&token.text)),
            _ => Err(InvalidQuery::parse(format!(
                "missing property operand for '{}'",
                op
            ))),
        }
    }
}

/// Expand `path.in(a, b, ...)` into an `Or` of equalities.
fn in_list(path: PropertyPath, list: &str) -> Result<Predicate, InvalidQuery> {
    let values: Vec<&str> = list.split(',').map(str::trim).collect();
    if values.iter().any(|v| v.is_empty()) {
        return Err(InvalidQuery::parse(format!(
            "empty value in '.in(' list for property '{}'",
            path
        )));
    }

    let mut disjuncts: Vec<Predicate> = values
        .into_iter()
        .map(|v| Predicate::eq(path.clone(), v))
        .collect();

    if disjuncts.len() == 1 {
        Ok(disjuncts.remove(0))
    } else {
        Ok(Predicate::Or(disjuncts))
    }
}
