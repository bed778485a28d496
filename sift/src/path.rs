//! Property paths and field selection.
//!
//! A property path is a `/`-delimited identifier such as
//! `Hosts/host_name` or `metrics/cpu/cpu_user`. The last segment is the
//! leaf; everything before it is the category.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Hierarchical property identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyPath(String);

impl PropertyPath {
    pub const SEPARATOR: char = '/';

    /// Create a path, dropping leading and trailing separators.
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(path.as_ref().trim_matches(Self::SEPARATOR).to_string())
    }

    /// Build a path from individual segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .map(|s| s.as_ref().trim_matches(Self::SEPARATOR).to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        Self(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(Self::SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// The last segment.
    pub fn leaf(&self) -> &str {
        match self.0.rsplit_once(Self::SEPARATOR) {
            Some((_, leaf)) => leaf,
            None => &self.0,
        }
    }

    /// Everything before the leaf, or `None` for a single-segment path.
    pub fn category(&self) -> Option<PropertyPath> {
        self.0
            .rsplit_once(Self::SEPARATOR)
            .map(|(category, _)| PropertyPath(category.to_string()))
    }

    /// True when `other` lives strictly beneath this path.
    pub fn is_category_of(&self, other: &PropertyPath) -> bool {
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0[self.0.len()..].starts_with(Self::SEPARATOR)
    }

    /// True when `other` is this path or lives beneath it.
    pub fn contains(&self, other: &PropertyPath) -> bool {
        self == other || self.is_category_of(other)
    }

    /// Append a segment.
    pub fn join(&self, segment: &str) -> PropertyPath {
        PropertyPath::from_segments([self.as_str(), segment])
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PropertyPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for PropertyPath {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl Borrow<str> for PropertyPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Time window attached to a selected field: `prop[start,end,step]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemporalInfo {
    pub start: i64,
    pub end: i64,
    pub step: i64,
}

impl TemporalInfo {
    pub fn new(start: i64, end: i64, step: i64) -> Self {
        Self { start, end, step }
    }
}

impl fmt::Display for TemporalInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{},{}]", self.start, self.end, self.step)
    }
}

/// Field selection derived from a `fields=` query parameter.
///
/// An empty spec selects every property.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSpec {
    fields: BTreeMap<PropertyPath, Option<TemporalInfo>>,
}

impl FieldSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the value of a `fields=` parameter, e.g.
    /// `Hosts/host_name,metrics/cpu[1360000000,1360003600,60],Hosts/*`.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut fields = Self::new();
        for entry in split_entries(spec)? {
            let entry = entry.trim();
            if entry.is_empty() || entry == "*" {
                continue;
            }

            let (name, temporal) = match entry.split_once('[') {
                Some((name, window)) => {
                    let window = window.strip_suffix(']').ok_or_else(|| {
                        Error::InvalidFields(format!("unterminated time window in '{}'", entry))
                    })?;
                    (name, Some(parse_temporal(entry, window)?))
                }
                None => (entry, None),
            };

            let name = name.strip_suffix("/*").unwrap_or(name);
            let path = PropertyPath::new(name);
            if path.is_empty() {
                return Err(Error::InvalidFields(format!("empty field name in '{}'", entry)));
            }
            fields.insert(path, temporal);
        }
        Ok(fields)
    }

    /// Collect the `fields=` parameters of a raw query string.
    pub fn from_query(query: &str) -> Result<Self> {
        let mut fields = Self::new();
        for value in crate::query::reserved_values(query, "fields") {
            fields.fields.extend(Self::parse(value)?.fields);
        }
        Ok(fields)
    }

    pub fn insert(&mut self, path: impl Into<PropertyPath>, temporal: Option<TemporalInfo>) {
        self.fields.insert(path.into(), temporal);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropertyPath, Option<&TemporalInfo>)> {
        self.fields.iter().map(|(p, t)| (p, t.as_ref()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &PropertyPath> {
        self.fields.keys()
    }

    /// Time window requested for `path`, if any.
    pub fn temporal_info(&self, path: &PropertyPath) -> Option<&TemporalInfo> {
        self.fields.get(path).and_then(Option::as_ref)
    }

    /// Whether a property at `path` should be returned.
    pub fn selects(&self, path: &PropertyPath) -> bool {
        self.is_empty() || self.fields.keys().any(|selected| selected.contains(path))
    }
}

/// Split on commas that are not inside `[...]`.
fn split_entries(spec: &str) -> Result<Vec<&str>> {
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in spec.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    Error::InvalidFields(format!("unbalanced ']' in '{}'", spec))
                })?;
            }
            ',' if depth == 0 => {
                entries.push(&spec[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(Error::InvalidFields(format!("unbalanced '[' in '{}'", spec)));
    }
    entries.push(&spec[start..]);
    Ok(entries)
}

fn parse_temporal(entry: &str, window: &str) -> Result<TemporalInfo> {
    let parts = window
        .split(',')
        .map(|p| p.trim().parse::<i64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::InvalidFields(format!("bad time window in '{}': {}", entry, e)))?;

    match parts.as_slice() {
        [start, end, step] => Ok(TemporalInfo::new(*start, *end, *step)),
        _ => Err(Error::InvalidFields(format!(
            "time window in '{}' must be [start,end,step]",
            entry
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_and_category() {
        let path = PropertyPath::new("cat5/subcat5/map");
        assert_eq!(path.leaf(), "map");
        assert_eq!(path.category(), Some(PropertyPath::new("cat5/subcat5")));
        assert_eq!(path.depth(), 3);

        let bare = PropertyPath::new("foo");
        assert_eq!(bare.leaf(), "foo");
        assert_eq!(bare.category(), None);
    }

    #[test]
    fn test_new_trims_separators() {
        assert_eq!(PropertyPath::new("/Hosts/host_name/").as_str(), "Hosts/host_name");
        assert_eq!(
            PropertyPath::from_segments(["Hosts", "", "host_name"]).as_str(),
            "Hosts/host_name"
        );
    }

    #[test]
    fn test_is_category_of() {
        let cat = PropertyPath::new("config");
        assert!(cat.is_category_of(&PropertyPath::new("config/unknown_property")));
        assert!(!cat.is_category_of(&PropertyPath::new("config")));
        // Shared prefix is not enough; the boundary must be a separator
        assert!(!cat.is_category_of(&PropertyPath::new("configs/x")));
        assert!(cat.contains(&PropertyPath::new("config")));
    }

    #[test]
    fn test_fields_bare() {
        let spec = FieldSpec::parse("Hosts/host_name,Hosts/cpu_count").unwrap();
        assert_eq!(spec.len(), 2);
        assert!(spec.temporal_info(&PropertyPath::new("Hosts/host_name")).is_none());
    }

    #[test]
    fn test_fields_temporal() {
        let spec = FieldSpec::parse("metrics/cpu[1360610225,1360610226,15],Hosts/host_name").unwrap();
        assert_eq!(spec.len(), 2);
        assert_eq!(
            spec.temporal_info(&PropertyPath::new("metrics/cpu")),
            Some(&TemporalInfo::new(1360610225, 1360610226, 15))
        );
    }

    #[test]
    fn test_fields_category_wildcard() {
        let spec = FieldSpec::parse("Hosts/*").unwrap();
        assert!(spec.selects(&PropertyPath::new("Hosts/host_name")));
        assert!(!spec.selects(&PropertyPath::new("metrics/cpu")));
    }

    #[test]
    fn test_fields_bad_window() {
        assert!(FieldSpec::parse("metrics/cpu[1,2]").is_err());
        assert!(FieldSpec::parse("metrics/cpu[a,b,c]").is_err());
        assert!(FieldSpec::parse("metrics/cpu[1,2,3").is_err());
    }

    #[test]
    fn test_fields_from_query() {
        let spec = FieldSpec::from_query("foo=1&fields=a/b,c&_=123&bar=2").unwrap();
        assert_eq!(
            spec.paths().map(PropertyPath::as_str).collect::<Vec<_>>(),
            vec!["a/b", "c"]
        );

        let spec = FieldSpec::from_query("(Hosts/cpu_count>4&fields=Hosts/cpu_count)").unwrap();
        assert_eq!(
            spec.paths().map(PropertyPath::as_str).collect::<Vec<_>>(),
            vec!["Hosts/cpu_count"]
        );
    }

    #[test]
    fn test_empty_spec_selects_everything() {
        let spec = FieldSpec::new();
        assert!(spec.selects(&PropertyPath::new("anything/at/all")));
    }
}
