//! Query predicate compiler.
//!
//! # Syntax Overview
//!
//! ```text
//! expression := term (('&' | '|') term)*
//! term       := '!'? ( '(' expression ')' | comparison )
//! comparison := PROPERTY ('=' | '!=' | '<' | '<=' | '>' | '>=') VALUE
//!             | PROPERTY '.in(' VALUE (',' VALUE)* ')'
//!             | PROPERTY '.isEmpty(' ')'
//! ```
//!
//! - `&` and `|` have equal precedence and fold left to right; only
//!   brackets change grouping.
//! - `fields=...` and `_=...` segments are reserved and never reach the
//!   grammar.

mod lexer;
mod parser;
mod token;

use thiserror::Error as ThisError;

pub use lexer::{lex, reserved_values, strip_ignored, IGNORED_PARAMETERS};
pub use parser::parse;
pub use token::{Token, TokenKind};

use crate::predicate::Predicate;

/// Which compiler stage rejected the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidQueryKind {
    /// Bad operator adjacency or unrecognized token.
    Lex,
    /// Mismatched brackets, missing or extra operands, incomplete expression.
    Parse,
}

/// A query string that does not compile.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("{message}")]
pub struct InvalidQuery {
    pub kind: InvalidQueryKind,
    pub message: String,
}

impl InvalidQuery {
    pub(crate) fn lex(message: impl Into<String>) -> Self {
        Self {
            kind: InvalidQueryKind::Lex,
            message: message.into(),
        }
    }

    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: InvalidQueryKind::Parse,
            message: message.into(),
        }
    }
}

/// Compile a raw (URL-decoded) query string into a predicate.
///
/// Returns `Ok(None)` when the query holds no predicate, e.g. an empty
/// string or one made only of reserved parameters.
pub fn compile(query: &str) -> Result<Option<Predicate>, InvalidQuery> {
    let tokens = lex(query)?;
    let predicate = parse(&tokens)?;
    match &predicate {
        Some(p) => log::debug!("compiled query '{}' into {}", query, p),
        None => log::trace!("query '{}' holds no predicate", query),
    }
    Ok(predicate)
}
