//! Query lexer.
//!
//! Comparisons are emitted operator first: `a<=2` lexes to
//! `RelationalOp(<=) Property(a) Value(2)`, and `a.in(x,y)` to
//! `RelationalOpFunc(.in() Property(a) Value(x,y) BracketClose`.

use super::token::Token;
use super::InvalidQuery;

/// Query parameters that are stripped before lexing.
pub const IGNORED_PARAMETERS: [&str; 2] = ["fields", "_"];

/// Relational function operators, matched directly after a property.
const FUNCTIONS: [&str; 2] = [".in(", ".isEmpty("];

/// Relational operators, two-character forms first.
const RELATIONAL_OPERATORS: [&str; 6] = ["<=", ">=", "!=", "=", "<", ">"];

/// Characters that end a property or value.
const OPERATOR_CHARS: [char; 8] = ['=', '!', '<', '>', '&', '|', '(', ')'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    /// Property, `!` or `(`.
    Term,
    /// Relational operator or function after a property.
    Operator,
    /// Right operand of a relational operator.
    Value,
    /// Logical operator, `)` or end of input.
    Connective,
}

/// Split a query string into tokens.
pub fn lex(query: &str) -> Result<Vec<Token>, InvalidQuery> {
    let query = strip_ignored(query);
    let mut lexer = Lexer::new(&query);
    lexer.run()?;
    Ok(lexer.tokens)
}

/// Remove every `fields=...` and `_=...` segment along with one adjacent
/// delimiter. A segment's value ends at `&`, `|` or an unmatched `)`, so
/// brackets around it survive.
pub fn strip_ignored(query: &str) -> String {
    let mut kept = String::with_capacity(query.len());
    let mut pos = 0;
    for segment in reserved_segments(query) {
        kept.push_str(&query[pos..segment.start]);
        pos = segment.end;
        let after = &query[pos..];
        if after.starts_with('&') {
            pos += 1;
        } else if kept.ends_with(|c: char| c == '&' || c == '|') {
            kept.pop();
        } else if after.starts_with('|') {
            pos += 1;
        }
    }
    kept.push_str(&query[pos..]);
    kept
}

/// Values of every reserved `key=value` segment named `key`.
pub fn reserved_values<'a>(query: &'a str, key: &str) -> Vec<&'a str> {
    reserved_segments(query)
        .into_iter()
        .filter(|segment| segment.key == key)
        .map(|segment| segment.value)
        .collect()
}

/// A reserved `key=value` segment spanning `start..end` of the query.
struct Reserved<'a> {
    key: &'static str,
    value: &'a str,
    start: usize,
    end: usize,
}

fn reserved_segments(query: &str) -> Vec<Reserved<'_>> {
    let mut found = Vec::new();
    let mut start = 0;
    loop {
        if let Some((key, len)) = reserved_at(&query[start..]) {
            let value_start = start + key.len() + 1;
            found.push(Reserved {
                key,
                value: &query[value_start..value_start + len],
                start,
                end: value_start + len,
            });
            start = value_start + len;
        }
        // segments begin at the start and after '&', '|' or '('
        match query[start..].find(|c: char| matches!(c, '&' | '|' | '(')) {
            Some(i) => start += i + 1,
            None => break,
        }
    }
    found
}

/// The reserved key at the start of `rest` and the byte length of its value.
fn reserved_at(rest: &str) -> Option<(&'static str, usize)> {
    let key = IGNORED_PARAMETERS
        .into_iter()
        .find(|key| rest.strip_prefix(*key).is_some_and(|r| r.starts_with('=')))?;
    let value = &rest[key.len() + 1..];
    let mut depth = 0usize;
    let len = value
        .char_indices()
        .find(|&(_, c)| match c {
            '&' | '|' => true,
            '(' => {
                depth += 1;
                false
            }
            ')' if depth == 0 => true,
            ')' => {
                depth -= 1;
                false
            }
            _ => false,
        })
        .map_or(value.len(), |(i, _)| i);
    Some((key, len))
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    expect: Expect,
    /// Property scanned but not yet emitted; it follows its operator.
    property: Option<&'a str>,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            expect: Expect::Term,
            property: None,
            tokens: Vec::new(),
        }
    }

    fn run(&mut self) -> Result<(), InvalidQuery> {
        let input = self.input;
        while self.pos < input.len() {
            let rest = &input[self.pos..];
            match self.expect {
                Expect::Term => self.term(rest)?,
                Expect::Operator => self.operator(rest)?,
                Expect::Value => self.value(rest)?,
                Expect::Connective => self.connective(rest)?,
            }
        }

        if let Some(property) = self.property {
            return Err(InvalidQuery::lex(format!(
                "property '{}' is not followed by an operator",
                property
            )));
        }
        Ok(())
    }

    fn term(&mut self, rest: &'a str) -> Result<(), InvalidQuery> {
        match rest.chars().next() {
            Some('(') => {
                self.tokens.push(Token::open());
                self.pos += 1;
            }
            Some('!') if !rest.starts_with("!=") => {
                self.tokens.push(Token::not());
                self.pos += 1;
            }
            Some(c) if OPERATOR_CHARS.contains(&c) => {
                return Err(self.unexpected(rest, "a property, '!' or '('"));
            }
            Some(_) => {
                let end = property_end(rest);
                if end == 0 {
                    return Err(self.unexpected(rest, "a property name"));
                }
                self.property = Some(&rest[..end]);
                self.pos += end;
                self.expect = Expect::Operator;
            }
            None => {}
        }
        Ok(())
    }

    fn operator(&mut self, rest: &'a str) -> Result<(), InvalidQuery> {
        let property = self.property.take().unwrap_or_default();

        if let Some(function) = FUNCTIONS.iter().find(|f| rest.starts_with(*f)) {
            self.tokens.push(Token::function(function));
            self.tokens.push(Token::property(property));
            self.pos += function.len();

            let input = self.input;
            let args = &input[self.pos..];
            let (raw, consumed, closed) = match args.find(')') {
                Some(i) => (&args[..i], i + 1, true),
                None => (args, args.len(), false),
            };
            if !raw.trim().is_empty() {
                self.tokens.push(Token::value(raw));
            }
            if closed {
                self.tokens.push(Token::close());
            }
            self.pos += consumed;
            self.expect = Expect::Connective;
            return Ok(());
        }

        match RELATIONAL_OPERATORS.iter().find(|op| rest.starts_with(*op)) {
            Some(op) => {
                self.tokens.push(Token::relational(op));
                self.tokens.push(Token::property(property));
                self.pos += op.len();
                self.expect = Expect::Value;
                Ok(())
            }
            None => {
                Err(self.unexpected(
                    rest,
                    &format!("a relational operator after property '{}'", property),
                ))
            }
        }
    }

    fn value(&mut self, rest: &'a str) -> Result<(), InvalidQuery> {
        let end = rest
            .char_indices()
            .find(|&(_, c)| matches!(c, '&' | '|' | ')' | '=' | '!' | '<' | '>'))
            .map_or(rest.len(), |(i, _)| i);
        if end == 0 {
            return Err(self.unexpected(rest, "a value"));
        }
        self.tokens.push(Token::value(&rest[..end]));
        self.pos += end;
        self.expect = Expect::Connective;
        Ok(())
    }

    fn connective(&mut self, rest: &'a str) -> Result<(), InvalidQuery> {
        match rest.chars().next() {
            Some(c @ ('&' | '|')) => {
                self.tokens.push(Token::logical(&c.to_string()));
                self.pos += 1;
                self.expect = Expect::Term;
                Ok(())
            }
            Some(')') => {
                self.tokens.push(Token::close());
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.unexpected(rest, "a logical operator or ')'")),
        }
    }

    fn unexpected(&self, rest: &str, expected: &str) -> InvalidQuery {
        let found: String = rest.chars().take(8).collect();
        InvalidQuery::lex(format!(
            "unexpected '{}' at position {}; expected {}",
            found, self.pos, expected
        ))
    }
}

/// Byte length of the property name at the start of `rest`.
fn property_end(rest: &str) -> usize {
    for (i, c) in rest.char_indices() {
        if OPERATOR_CHARS.contains(&c) {
            return i;
        }
        if c == '.' && FUNCTIONS.iter().any(|f| rest[i..].starts_with(f)) {
            return i;
        }
    }
    rest.len()
}
