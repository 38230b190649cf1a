//! Required execution environment tokens.
//!
//! A token names an environment and optionally a version, written as
//! `NAME-VERSION`. Two-part tokens such as `CDC-1.0/Foundation-1.0` combine
//! into one name (`CDC/Foundation`) when both parts agree on the version.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use trellis_core::{Namespace, Requirement, Version, escape_value};

use crate::error::{RuntimeError, RuntimeResult};

/// One parsed required execution environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EeToken {
    /// Environment name, e.g. `JavaSE` or `OSGi/Minimum`.
    pub name: String,
    /// Required version, if the token carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

impl EeToken {
    /// A token with a name and an optional version.
    #[must_use]
    pub fn new(name: impl Into<String>, version: Option<Version>) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Parse one token.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ManifestTranslation`] for an empty token, more
    /// than two `/`-separated parts, an empty name or an invalid version.
    pub fn parse(token: &str) -> RuntimeResult<Self> {
        let invalid = || RuntimeError::translation(format!("invalid bree string '{token}'"));
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let parts: Vec<&str> = trimmed.split('/').collect();
        match parts.as_slice() {
            [single] => {
                let (name, version) = split_part(single).ok_or_else(invalid)?;
                Ok(Self::new(name, version))
            },
            [first, second] => {
                let (n1, v1) = split_part(first).ok_or_else(invalid)?;
                let (n2, v2) = split_part(second).ok_or_else(invalid)?;
                match (v1, v2) {
                    (Some(a), Some(b)) if a != b => Ok(Self::new(trimmed, None)),
                    (a, b) => Ok(Self::new(format!("{n1}/{n2}"), a.or(b))),
                }
            },
            _ => Err(invalid()),
        }
    }

    /// The token's name after alias rewriting.
    fn aliased_name<'a>(&'a self, aliases: &'a BTreeMap<String, String>) -> &'a str {
        aliases
            .get(&self.name)
            .map_or(self.name.as_str(), String::as_str)
    }

    /// Filter clause matching an environment capability.
    #[must_use]
    pub fn to_filter(&self, aliases: &BTreeMap<String, String>) -> String {
        let name = escape_value(self.aliased_name(aliases));
        match &self.version {
            Some(version) => format!("(&(execution-environment={name})(version={version}))"),
            None => format!("(execution-environment={name})"),
        }
    }
}

impl fmt::Display for EeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}-{version}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// `NAME` or `NAME-VERSION`. `None` when the name is empty or the version
/// does not parse.
fn split_part(part: &str) -> Option<(&str, Option<Version>)> {
    let part = part.trim();
    let (name, version) = match part.rsplit_once('-') {
        Some((name, suffix)) if suffix.starts_with(|c: char| c.is_ascii_digit()) => {
            (name, Some(Version::parse(suffix).ok()?))
        },
        _ => (part, None),
    };
    if name.is_empty() {
        return None;
    }
    Some((name, version))
}

/// Build the synthetic `execution-environment` requirement for a revision.
///
/// Returns `None` when `tokens` is empty. More than one token becomes an OR.
///
/// # Errors
///
/// Returns [`RuntimeError::ManifestTranslation`] if the combined filter
/// cannot be parsed, which only happens for names the escaping cannot
/// represent.
pub fn requirement(
    tokens: &[EeToken],
    aliases: &BTreeMap<String, String>,
) -> RuntimeResult<Option<Requirement>> {
    let filter = match tokens {
        [] => return Ok(None),
        [one] => one.to_filter(aliases),
        many => {
            let clauses: String = many.iter().map(|t| t.to_filter(aliases)).collect();
            format!("(|{clauses})")
        },
    };
    Requirement::with_filter(Namespace::ExecutionEnvironment, &filter)
        .map(Some)
        .map_err(RuntimeError::translation)
}
