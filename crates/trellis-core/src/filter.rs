//! LDAP-style (RFC 1960) filter expressions.
//!
//! ```text
//! filter     = "(" filtercomp ")"
//! filtercomp = "&" filter+ | "|" filter+ | "!" filter | item
//! item       = attr ("=" | "~=" | ">=" | "<=") value
//!            | attr "=*"
//!            | attr "=" substring-pattern
//! ```
//!
//! Values may escape `\`, `*`, `(` and `)` with a backslash.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{ModelError, ModelResult};
use crate::value::{Attributes, CompareOp};

/// A parsed filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// All sub-filters match.
    And(Vec<Filter>),
    /// At least one sub-filter matches.
    Or(Vec<Filter>),
    /// The sub-filter does not match.
    Not(Box<Filter>),
    /// `attr op value`.
    Compare {
        /// Attribute name.
        attribute: String,
        /// Operator.
        op: CompareOp,
        /// Unescaped literal.
        value: String,
    },
    /// `attr=*`.
    Present(String),
    /// `attr=a*b*c`; `parts` are the unescaped pieces between wildcards.
    Substring {
        /// Attribute name.
        attribute: String,
        /// Literal pieces; an empty first or last piece stands for a leading
        /// or trailing wildcard.
        parts: Vec<String>,
    },
}

impl Filter {
    /// Parse a filter string.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidFilter`] with the byte offset where
    /// parsing failed.
    pub fn parse(input: &str) -> ModelResult<Self> {
        let mut parser = Parser { input, pos: 0 };
        parser.skip_ws();
        let filter = parser.filter()?;
        parser.skip_ws();
        if parser.pos < input.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(filter)
    }

    /// Evaluate the filter against an attribute map.
    #[must_use]
    pub fn matches(&self, attributes: &Attributes) -> bool {
        match self {
            Self::And(filters) => filters.iter().all(|f| f.matches(attributes)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(attributes)),
            Self::Not(filter) => !filter.matches(attributes),
            Self::Compare {
                attribute,
                op,
                value,
            } => attributes
                .get(attribute)
                .is_some_and(|attr| attr.compare(*op, value)),
            Self::Present(attribute) => attributes.contains_key(attribute),
            Self::Substring { attribute, parts } => attributes
                .get(attribute)
                .is_some_and(|attr| attr.matches_substring(parts)),
        }
    }

    /// Every attribute name the filter mentions, at any depth.
    #[must_use]
    pub fn referenced_attributes(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_attributes(&mut out);
        out
    }

    fn collect_attributes<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Self::And(filters) | Self::Or(filters) => {
                for f in filters {
                    f.collect_attributes(out);
                }
            },
            Self::Not(filter) => filter.collect_attributes(out),
            Self::Compare { attribute, .. }
            | Self::Present(attribute)
            | Self::Substring { attribute, .. } => {
                out.insert(attribute.as_str());
            },
        }
    }
}

/// Escape a literal for embedding in a filter value.
#[must_use]
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '*' | '(' | ')') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(filters) => {
                f.write_str("(&")?;
                for sub in filters {
                    write!(f, "{sub}")?;
                }
                f.write_str(")")
            },
            Self::Or(filters) => {
                f.write_str("(|")?;
                for sub in filters {
                    write!(f, "{sub}")?;
                }
                f.write_str(")")
            },
            Self::Not(filter) => write!(f, "(!{filter})"),
            Self::Compare {
                attribute,
                op,
                value,
            } => write!(f, "({attribute}{op}{})", escape_value(value)),
            Self::Present(attribute) => write!(f, "({attribute}=*)"),
            Self::Substring { attribute, parts } => {
                let escaped: Vec<String> = parts.iter().map(|p| escape_value(p)).collect();
                write!(f, "({attribute}={})", escaped.join("*"))
            },
        }
    }
}

impl FromStr for Filter {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> ModelError {
        ModelError::InvalidFilter {
            filter: self.input.to_string(),
            offset: self.pos,
            reason: reason.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos..).and_then(|rest| rest.chars().next())
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos = self.pos.saturating_add(c.len_utf8());
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, expected: char) -> ModelResult<()> {
        if self.peek() == Some(expected) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{expected}'")))
        }
    }

    fn filter(&mut self) -> ModelResult<Filter> {
        self.expect('(')?;
        self.skip_ws();
        let filter = match self.peek() {
            Some('&') => {
                self.bump();
                Filter::And(self.filter_list()?)
            },
            Some('|') => {
                self.bump();
                Filter::Or(self.filter_list()?)
            },
            Some('!') => {
                self.bump();
                self.skip_ws();
                Filter::Not(Box::new(self.filter()?))
            },
            Some(_) => self.item()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        self.skip_ws();
        self.expect(')')?;
        Ok(filter)
    }

    fn filter_list(&mut self) -> ModelResult<Vec<Filter>> {
        let mut filters = Vec::new();
        self.skip_ws();
        while self.peek() == Some('(') {
            filters.push(self.filter()?);
            self.skip_ws();
        }
        if filters.is_empty() {
            return Err(self.error("empty filter list"));
        }
        Ok(filters)
    }

    fn item(&mut self) -> ModelResult<Filter> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '=' | '~' | '<' | '>' | '(' | ')') {
                break;
            }
            self.bump();
        }
        let attribute = self
            .input
            .get(start..self.pos)
            .unwrap_or_default()
            .trim()
            .to_string();
        if attribute.is_empty() {
            return Err(self.error("missing attribute name"));
        }

        let op = match self.bump() {
            Some('=') => CompareOp::Equal,
            Some('~') => {
                self.expect('=')?;
                CompareOp::Approx
            },
            Some('>') => {
                self.expect('=')?;
                CompareOp::GreaterEq
            },
            Some('<') => {
                self.expect('=')?;
                CompareOp::LessEq
            },
            _ => return Err(self.error("expected comparison operator")),
        };

        let parts = self.value()?;
        if op != CompareOp::Equal || parts.len() == 1 {
            let value = parts.concat();
            return Ok(Filter::Compare {
                attribute,
                op,
                value,
            });
        }
        if parts.len() == 2 && parts.iter().all(String::is_empty) {
            return Ok(Filter::Present(attribute));
        }
        Ok(Filter::Substring { attribute, parts })
    }

    /// Read a value up to the closing parenthesis, split at unescaped `*`.
    fn value(&mut self) -> ModelResult<Vec<String>> {
        let mut parts = vec![String::new()];
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated value")),
                Some(')') => break,
                Some('(') => return Err(self.error("unescaped '(' in value")),
                Some('\\') => {
                    self.bump();
                    let escaped = self
                        .bump()
                        .ok_or_else(|| self.error("dangling escape"))?;
                    if let Some(last) = parts.last_mut() {
                        last.push(escaped);
                    }
                },
                Some('*') => {
                    self.bump();
                    parts.push(String::new());
                },
                Some(c) => {
                    self.bump();
                    if let Some(last) = parts.last_mut() {
                        last.push(c);
                    }
                },
            }
        }
        Ok(parts)
    }
}
