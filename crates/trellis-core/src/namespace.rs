//! Capability namespaces.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The namespace a capability or requirement lives in.
///
/// The namespace name doubles as the key attribute: a `package` capability
/// carries `package = "<name>"`, an `identity` capability carries
/// `identity = "<symbolic name>"`, and so on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Namespace {
    /// Exported and imported packages.
    Package,
    /// Whole-unit dependencies (`require-unit`).
    Bundle,
    /// Fragment attachment points.
    Host,
    /// Symbolic name and version of a revision.
    Identity,
    /// Execution environments provided by the system unit.
    ExecutionEnvironment,
    /// Any other namespace.
    Other(String),
}

impl Namespace {
    /// Wire name of the namespace.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Package => "package",
            Self::Bundle => "bundle",
            Self::Host => "host",
            Self::Identity => "identity",
            Self::ExecutionEnvironment => "execution-environment",
            Self::Other(name) => name,
        }
    }

    /// Whether a revision's own capability in this namespace is never a
    /// candidate for its own requirement.
    #[must_use]
    pub fn excludes_self(&self) -> bool {
        matches!(self, Self::Package | Self::Bundle)
    }
}

impl From<&str> for Namespace {
    fn from(name: &str) -> Self {
        match name {
            "package" => Self::Package,
            "bundle" => Self::Bundle,
            "host" => Self::Host,
            "identity" => Self::Identity,
            "execution-environment" => Self::ExecutionEnvironment,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Namespace {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.as_str().to_string()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
