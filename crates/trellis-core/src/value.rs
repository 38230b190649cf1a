//! Typed attribute values and the single comparison routine filters use.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// Attribute map of a capability, ordered for stable iteration.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Directive map of a capability or requirement.
pub type Directives = BTreeMap<String, String>;

/// Comparison operator of a filter leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Equal,
    /// `~=`: whitespace- and case-insensitive equality.
    Approx,
    /// `>=`
    GreaterEq,
    /// `<=`
    LessEq,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Equal => "=",
            Self::Approx => "~=",
            Self::GreaterEq => ">=",
            Self::LessEq => "<=",
        })
    }
}

/// A typed attribute value.
///
/// The filter literal on the other side of a comparison is always text; it
/// is interpreted in the attribute's type before comparing, and a literal that
/// does not parse in that type never matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    /// Plain string.
    String(String),
    /// Signed integer.
    Long(i64),
    /// Floating point number.
    Double(f64),
    /// Boolean.
    Bool(bool),
    /// Version, compared numerically component by component.
    Version(Version),
    /// List; matches if any element matches.
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    /// Compare this attribute against a filter literal.
    #[must_use]
    pub fn compare(&self, op: CompareOp, literal: &str) -> bool {
        match self {
            Self::String(attr) => compare_str(attr, op, literal),
            Self::Long(attr) => literal
                .trim()
                .parse::<i64>()
                .is_ok_and(|value| ordering_satisfies(attr.cmp(&value), op)),
            Self::Double(attr) => literal
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(|value| attr.partial_cmp(&value))
                .is_some_and(|ordering| ordering_satisfies(ordering, op)),
            Self::Bool(attr) => {
                matches!(op, CompareOp::Equal | CompareOp::Approx)
                    && literal.trim().eq_ignore_ascii_case("true") == *attr
            },
            Self::Version(attr) => Version::parse(literal)
                .is_ok_and(|value| ordering_satisfies(attr.cmp(&value), op)),
            Self::List(items) => items.iter().any(|item| item.compare(op, literal)),
        }
    }

    /// Whether a `*`-wildcard pattern matches this value.
    ///
    /// Only strings (and lists containing strings) can match substrings.
    #[must_use]
    pub fn matches_substring(&self, parts: &[String]) -> bool {
        match self {
            Self::String(attr) => substring_match(attr, parts),
            Self::List(items) => items.iter().any(|item| item.matches_substring(parts)),
            _ => false,
        }
    }

    /// The value as a version, if it is one.
    #[must_use]
    pub fn as_version(&self) -> Option<&Version> {
        match self {
            Self::Version(v) => Some(v),
            _ => None,
        }
    }

    /// The value as a string slice, if it is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

fn ordering_satisfies(ordering: Ordering, op: CompareOp) -> bool {
    match op {
        CompareOp::Equal | CompareOp::Approx => ordering == Ordering::Equal,
        CompareOp::GreaterEq => ordering != Ordering::Less,
        CompareOp::LessEq => ordering != Ordering::Greater,
    }
}

fn compare_str(attr: &str, op: CompareOp, literal: &str) -> bool {
    match op {
        CompareOp::Approx => normalize(attr) == normalize(literal),
        _ => ordering_satisfies(attr.cmp(literal), op),
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Glob-style match where `parts` are the literal pieces between `*`s.
///
/// An empty first (last) part means the pattern starts (ends) with `*`.
fn substring_match(value: &str, parts: &[String]) -> bool {
    let Some((first, rest)) = parts.split_first() else {
        return true;
    };
    let Some(mut remaining) = value.strip_prefix(first.as_str()) else {
        return false;
    };
    let Some((last, middle)) = rest.split_last() else {
        return remaining.is_empty();
    };
    for piece in middle {
        match remaining.find(piece.as_str()) {
            Some(pos) => {
                remaining = remaining.get(pos.saturating_add(piece.len())..).unwrap_or("");
            },
            None => return false,
        }
    }
    remaining.ends_with(last.as_str())
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Long(n) => write!(f, "{n}"),
            Self::Double(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Version(v) => write!(f, "{v}"),
            Self::List(items) => {
                let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", rendered.join(","))
            },
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        Self::Long(n)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Version> for AttributeValue {
    fn from(v: Version) -> Self {
        Self::Version(v)
    }
}
