//! Predicate evaluation against property bags.
//!
//! Comparisons are numeric when both the stored value and the literal parse
//! as finite `f64`, and lexical otherwise. A missing property makes every
//! comparison false.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::{CompareOp, Comparison, Predicate};
use crate::path::PropertyPath;

/// Anything that can answer property lookups by path.
pub trait PropertyBag {
    /// Value stored exactly at `path`.
    fn property(&self, path: &PropertyPath) -> Option<&str>;

    /// Whether any property lives strictly beneath `category`.
    fn has_under(&self, category: &PropertyPath) -> bool;
}

impl PropertyBag for BTreeMap<PropertyPath, String> {
    fn property(&self, path: &PropertyPath) -> Option<&str> {
        self.get(path).map(String::as_str)
    }

    fn has_under(&self, category: &PropertyPath) -> bool {
        // Keys under `category` sort right after it
        self.range(category.clone()..)
            .take_while(|(k, _)| k.as_str().starts_with(category.as_str()))
            .any(|(k, _)| category.is_category_of(k))
    }
}

/// Evaluate `predicate` against `bag`.
pub fn evaluate<B: PropertyBag + ?Sized>(predicate: &Predicate, bag: &B) -> bool {
    match predicate {
        Predicate::Comparison(c) => compare(c, bag),
        Predicate::Not(inner) => !evaluate(inner, bag),
        Predicate::And(children) => children.iter().all(|c| evaluate(c, bag)),
        Predicate::Or(children) => children.iter().any(|c| evaluate(c, bag)),
        Predicate::CategoryIsEmpty(path) => bag.property(path).is_none() && !bag.has_under(path),
    }
}

fn compare<B: PropertyBag + ?Sized>(comparison: &Comparison, bag: &B) -> bool {
    let Some(stored) = bag.property(&comparison.path) else {
        return false;
    };

    let ordering = match (as_number(stored), as_number(&comparison.value)) {
        (Some(lhs), Some(rhs)) => match lhs.partial_cmp(&rhs) {
            Some(ordering) => ordering,
            None => return false,
        },
        _ => stored.cmp(comparison.value.as_str()),
    };

    match comparison.op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Lte => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Gte => ordering != Ordering::Less,
    }
}

/// Parse a value as a finite number.
pub(crate) fn as_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}
