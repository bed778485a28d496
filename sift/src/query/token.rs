//! Lexical tokens of the query language.

use std::fmt;

/// The kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `=`, `!=`, `<`, `<=`, `>`, `>=`
    RelationalOp,
    /// `.in(` or `.isEmpty(`
    RelationalOpFunc,
    /// Left operand of a comparison (a property path)
    Property,
    /// Right operand of a comparison
    Value,
    /// `&` or `|`
    LogicalOp,
    /// `!`
    LogicalUnaryOp,
    /// `(`
    BracketOpen,
    /// `)`
    BracketClose,
}

/// A single token produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn relational(op: &str) -> Self {
        Self::new(TokenKind::RelationalOp, op)
    }

    pub fn function(op: &str) -> Self {
        Self::new(TokenKind::RelationalOpFunc, op)
    }

    pub fn property(name: &str) -> Self {
        Self::new(TokenKind::Property, name)
    }

    pub fn value(value: &str) -> Self {
        Self::new(TokenKind::Value, value)
    }

    pub fn logical(op: &str) -> Self {
        Self::new(TokenKind::LogicalOp, op)
    }

    pub fn not() -> Self {
        Self::new(TokenKind::LogicalUnaryOp, "!")
    }

    pub fn open() -> Self {
        Self::new(TokenKind::BracketOpen, "(")
    }

    pub fn close() -> Self {
        Self::new(TokenKind::BracketClose, ")")
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind, self.text)
    }
}
