//! Unit and package versions.
//!
//! Versions have the form `major[.minor[.micro[.qualifier]]]` with numeric
//! `major`, `minor` and `micro` components and a free-form qualifier that is
//! compared lexicographically. Missing components default to zero, so `1`,
//! `1.0` and `1.0.0` are the same version.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// A four-part version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Version {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Micro component.
    pub micro: u64,
    /// Qualifier, empty when absent.
    pub qualifier: String,
}

impl Version {
    /// The empty version `0.0.0`.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a version without a qualifier.
    #[must_use]
    pub fn new(major: u64, minor: u64, micro: u64) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    /// Parse a version string.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidVersion`] if a numeric component is not a
    /// number, the string has more than four parts, or the qualifier contains
    /// characters other than alphanumerics, `-` and `_`.
    pub fn parse(input: &str) -> ModelResult<Self> {
        let trimmed = input.trim();
        let invalid = |reason: &str| ModelError::InvalidVersion {
            version: input.to_string(),
            reason: reason.to_string(),
        };
        if trimmed.is_empty() {
            return Err(invalid("version must not be empty"));
        }

        let mut parts = trimmed.splitn(4, '.');
        let mut numeric = [0_u64; 3];
        for slot in &mut numeric {
            match parts.next() {
                Some(part) => {
                    *slot = part
                        .parse::<u64>()
                        .map_err(|_| invalid("numeric component expected"))?;
                },
                None => break,
            }
        }

        let qualifier = parts.next().unwrap_or_default().to_string();
        if !qualifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(invalid("qualifier contains invalid characters"));
        }
        if trimmed.ends_with('.') {
            return Err(invalid("trailing separator"));
        }

        Ok(Self {
            major: numeric[0],
            minor: numeric[1],
            micro: numeric[2],
            qualifier,
        })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.micro.cmp(&other.micro))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl TryFrom<String> for Version {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

/// A version interval such as `[1.0,2.0)`.
///
/// A bare version `v` is the range "at least `v`" with no ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct VersionRange {
    floor: Version,
    floor_inclusive: bool,
    ceiling: Option<Version>,
    ceiling_inclusive: bool,
}

impl VersionRange {
    /// The range matching every version.
    #[must_use]
    pub fn any() -> Self {
        Self::at_least(Version::empty())
    }

    /// The range `[floor, ∞)`.
    #[must_use]
    pub fn at_least(floor: Version) -> Self {
        Self {
            floor,
            floor_inclusive: true,
            ceiling: None,
            ceiling_inclusive: false,
        }
    }

    /// The range `[version, version]`.
    #[must_use]
    pub fn exactly(version: Version) -> Self {
        Self {
            floor: version.clone(),
            floor_inclusive: true,
            ceiling: Some(version),
            ceiling_inclusive: true,
        }
    }

    /// Parse `[a,b)`, `(a,b]`, `[a,b]`, `(a,b)` or a bare version.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidVersionRange`] on malformed input or an
    /// empty interval (floor above ceiling).
    pub fn parse(input: &str) -> ModelResult<Self> {
        let trimmed = input.trim();
        let invalid = |reason: &str| ModelError::InvalidVersionRange {
            range: input.to_string(),
            reason: reason.to_string(),
        };

        let Some(first) = trimmed.chars().next() else {
            return Err(invalid("range must not be empty"));
        };
        if first != '[' && first != '(' {
            let floor = Version::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
            return Ok(Self::at_least(floor));
        }

        let last = trimmed.chars().last().unwrap_or(first);
        if last != ']' && last != ')' {
            return Err(invalid("missing closing bracket"));
        }
        let inner = trimmed
            .get(1..trimmed.len().saturating_sub(1))
            .ok_or_else(|| invalid("missing bounds"))?;
        let (floor, ceiling) = inner
            .split_once(',')
            .ok_or_else(|| invalid("expected two comma separated bounds"))?;
        let floor = Version::parse(floor).map_err(|e| invalid(&e.to_string()))?;
        let ceiling = Version::parse(ceiling).map_err(|e| invalid(&e.to_string()))?;

        let range = Self {
            floor,
            floor_inclusive: first == '[',
            ceiling: Some(ceiling),
            ceiling_inclusive: last == ']',
        };
        if range.is_empty() {
            return Err(invalid("floor is above ceiling"));
        }
        Ok(range)
    }

    /// Lower bound.
    #[must_use]
    pub fn floor(&self) -> &Version {
        &self.floor
    }

    /// Upper bound, if any.
    #[must_use]
    pub fn ceiling(&self) -> Option<&Version> {
        self.ceiling.as_ref()
    }

    fn is_empty(&self) -> bool {
        match &self.ceiling {
            None => false,
            Some(ceiling) => match self.floor.cmp(ceiling) {
                Ordering::Greater => true,
                Ordering::Equal => !(self.floor_inclusive && self.ceiling_inclusive),
                Ordering::Less => false,
            },
        }
    }

    /// Whether `version` lies inside the range.
    #[must_use]
    pub fn includes(&self, version: &Version) -> bool {
        let above_floor = if self.floor_inclusive {
            version >= &self.floor
        } else {
            version > &self.floor
        };
        let below_ceiling = match &self.ceiling {
            None => true,
            Some(ceiling) if self.ceiling_inclusive => version <= ceiling,
            Some(ceiling) => version < ceiling,
        };
        above_floor && below_ceiling
    }

    /// Render the range as filter clauses over `attribute`.
    ///
    /// `[1.0,2.0)` on `version` becomes `(version>=1.0.0)(!(version>=2.0.0))`.
    /// The result is a sequence of clauses meant to be embedded in an `(&...)`.
    #[must_use]
    pub fn to_filter_clauses(&self, attribute: &str) -> String {
        let mut out = String::new();
        if self.floor_inclusive {
            if self.floor != Version::empty() {
                out.push_str(&format!("({attribute}>={})", self.floor));
            }
        } else {
            out.push_str(&format!("(!({attribute}<={}))", self.floor));
        }
        if let Some(ceiling) = &self.ceiling {
            if self.ceiling_inclusive {
                out.push_str(&format!("({attribute}<={ceiling})"));
            } else {
                out.push_str(&format!("(!({attribute}>={ceiling}))"));
            }
        }
        out
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ceiling {
            None if self.floor_inclusive => write!(f, "{}", self.floor),
            None => write!(f, "({},)", self.floor),
            Some(ceiling) => write!(
                f,
                "{}{},{}{}",
                if self.floor_inclusive { '[' } else { '(' },
                self.floor,
                ceiling,
                if self.ceiling_inclusive { ']' } else { ')' },
            ),
        }
    }
}

impl FromStr for VersionRange {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<VersionRange> for String {
    fn from(range: VersionRange) -> Self {
        range.to_string()
    }
}

impl TryFrom<String> for VersionRange {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}
