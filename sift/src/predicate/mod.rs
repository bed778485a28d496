//! Predicate model.
//!
//! A predicate is an immutable boolean expression over resource
//! properties. Trees are built by the query parser and by providers that
//! combine a compiled query with identifying ids taken from a URI.

mod eval;

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::path::PropertyPath;

pub use eval::{evaluate, PropertyBag};
pub(crate) use eval::as_number;

/// Comparison operators. `!=` has no variant; it is `Not(Eq)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CompareOp {
    /// `=`
    #[serde(rename = "=")]
    Eq,
    /// `<`
    #[serde(rename = "<")]
    Lt,
    /// `<=`
    #[serde(rename = "<=")]
    Lte,
    /// `>`
    #[serde(rename = ">")]
    Gt,
    /// `>=`
    #[serde(rename = ">=")]
    Gte,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(CompareOp::Eq),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Lte),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Gte),
            _ => None,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// `path op value`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Comparison {
    pub path: PropertyPath,
    pub op: CompareOp,
    pub value: String,
}

/// Boolean expression over resource properties.
///
/// `And` and `Or` always hold at least two children when built through
/// the constructors below.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Predicate {
    Comparison(Comparison),
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    /// No property sits at or beneath the category.
    CategoryIsEmpty(PropertyPath),
}

impl Predicate {
    pub fn compare(path: PropertyPath, op: CompareOp, value: impl Into<String>) -> Self {
        Predicate::Comparison(Comparison {
            path,
            op,
            value: value.into(),
        })
    }

    pub fn eq(path: PropertyPath, value: impl Into<String>) -> Self {
        Self::compare(path, CompareOp::Eq, value)
    }

    pub fn ne(path: PropertyPath, value: impl Into<String>) -> Self {
        Self::not(Self::eq(path, value))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }

    /// Binary conjunction; the left fold of the parser relies on this
    /// never flattening.
    pub fn and(left: Predicate, right: Predicate) -> Self {
        Predicate::And(vec![left, right])
    }

    /// Binary disjunction.
    pub fn or(left: Predicate, right: Predicate) -> Self {
        Predicate::Or(vec![left, right])
    }

    /// Conjunction of any number of predicates. Returns `None` when empty
    /// and the lone predicate when there is only one.
    pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Option<Self> {
        let mut predicates: Vec<_> = predicates.into_iter().collect();
        match predicates.len() {
            0 => None,
            1 => predicates.pop(),
            _ => Some(Predicate::And(predicates)),
        }
    }

    /// Disjunction of any number of predicates, collapsing like [`Predicate::all`].
    pub fn any(predicates: impl IntoIterator<Item = Predicate>) -> Option<Self> {
        let mut predicates: Vec<_> = predicates.into_iter().collect();
        match predicates.len() {
            0 => None,
            1 => predicates.pop(),
            _ => Some(Predicate::Or(predicates)),
        }
    }

    /// Every property path referenced anywhere in the tree.
    pub fn property_paths(&self) -> BTreeSet<PropertyPath> {
        let mut paths = BTreeSet::new();
        self.collect_paths(&mut paths);
        paths
    }

    fn collect_paths(&self, paths: &mut BTreeSet<PropertyPath>) {
        match self {
            Predicate::Comparison(c) => {
                paths.insert(c.path.clone());
            }
            Predicate::CategoryIsEmpty(path) => {
                paths.insert(path.clone());
            }
            Predicate::Not(inner) => inner.collect_paths(paths),
            Predicate::And(children) | Predicate::Or(children) => {
                for child in children {
                    child.collect_paths(paths);
                }
            }
        }
    }

    /// The value this predicate pins `path` to, if it is a plain equality
    /// on `path` or a conjunction containing one.
    pub fn equality_value(&self, path: &PropertyPath) -> Option<&str> {
        match self {
            Predicate::Comparison(Comparison {
                path: p,
                op: CompareOp::Eq,
                value,
            }) if p == path => Some(value),
            Predicate::And(children) => children.iter().find_map(|c| c.equality_value(path)),
            _ => None,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Comparison(c) => write!(f, "{}{}{}", c.path, c.op, c.value),
            Predicate::Not(inner) => match inner.as_ref() {
                Predicate::Comparison(Comparison {
                    path,
                    op: CompareOp::Eq,
                    value,
                }) => write!(f, "{}!={}", path, value),
                // `!!x` does not parse; the inner negation needs brackets
                Predicate::Not(_) => write!(f, "!({})", inner),
                other => write!(f, "!{}", other),
            },
            Predicate::And(children) => write_group(f, children, "&"),
            Predicate::Or(children) => write_group(f, children, "|"),
            Predicate::CategoryIsEmpty(path) => write!(f, "{}.isEmpty()", path),
        }
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, children: &[Predicate], op: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(op)?;
        }
        write!(f, "{}", child)?;
    }
    f.write_str(")")
}
