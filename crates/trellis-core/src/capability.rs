//! Capabilities, requirements and the matching predicate.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::filter::Filter;
use crate::namespace::Namespace;
use crate::value::{AttributeValue, Attributes, Directives};
use crate::version::Version;

/// Well-known directive names.
pub mod directive {
    /// Requirement filter.
    pub const FILTER: &str = "filter";
    /// `mandatory`, `optional` or `dynamic`.
    pub const RESOLUTION: &str = "resolution";
    /// `single` or `multiple`.
    pub const CARDINALITY: &str = "cardinality";
    /// `private` or `reexport`.
    pub const VISIBILITY: &str = "visibility";
    /// Phase in which a requirement applies; only `resolve` is resolved.
    pub const EFFECTIVE: &str = "effective";
    /// Comma separated attributes a requirer must mention.
    pub const MANDATORY: &str = "mandatory";
    /// `true` marks a singleton identity.
    pub const SINGLETON: &str = "singleton";
    /// Required execution environments, as declared.
    pub const EXECUTION_ENVIRONMENT: &str = "execution-environment";
}

/// Well-known attribute names.
pub mod attribute {
    /// Package or capability version.
    pub const VERSION: &str = "version";
    /// Version on identity, bundle and host capabilities.
    pub const BUNDLE_VERSION: &str = "bundle-version";
}

/// Something a revision provides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Namespace.
    pub namespace: Namespace,
    /// Typed attributes.
    #[serde(default)]
    pub attributes: Attributes,
    /// Directives.
    #[serde(default)]
    pub directives: Directives,
}

impl Capability {
    /// An empty capability in `namespace`.
    #[must_use]
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            attributes: Attributes::new(),
            directives: Directives::new(),
        }
    }

    /// Add an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Add a directive.
    #[must_use]
    pub fn with_directive(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.directives.insert(name.into(), value.into());
        self
    }

    /// Look up an attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Look up a directive.
    #[must_use]
    pub fn directive(&self, name: &str) -> Option<&str> {
        self.directives.get(name).map(String::as_str)
    }

    /// Value of the namespace key attribute, if it is a string.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.attribute(self.namespace.as_str())
            .and_then(AttributeValue::as_str)
    }

    /// The capability's own version: `version`, else `bundle-version`.
    #[must_use]
    pub fn version(&self) -> Option<&Version> {
        self.attribute(attribute::VERSION)
            .or_else(|| self.attribute(attribute::BUNDLE_VERSION))
            .and_then(AttributeValue::as_version)
    }

    /// Attributes a requirement filter must mention to match.
    pub fn mandatory_attributes(&self) -> impl Iterator<Item = &str> {
        self.directive(directive::MANDATORY)
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Whether the capability carries `singleton:=true`.
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.directive(directive::SINGLETON)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.namespace)?;
        if let Some(key) = self.key() {
            write!(f, ":{key}")?;
        }
        if let Some(version) = self.version() {
            write!(f, ";{version}")?;
        }
        Ok(())
    }
}

/// How a requirement must be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Unsatisfied means the revision cannot resolve.
    Mandatory,
    /// Wired if possible, otherwise ignored.
    Optional,
    /// Never wired at resolve time.
    Dynamic,
}

/// How many providers a requirement may be wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// The best candidate only.
    Single,
    /// Every matching provider.
    Multiple,
}

/// Whether a `bundle` requirement re-exports the provider's packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Not re-exported.
    Private,
    /// Re-exported to the requirer's own dependents.
    Reexport,
}

/// Something a revision needs.
///
/// The filter directive is parsed at construction, so a `Requirement` that
/// exists always has a valid filter and valid directive values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRequirement", into = "RawRequirement")]
pub struct Requirement {
    namespace: Namespace,
    directives: Directives,
    filter: Option<Filter>,
}

#[derive(Serialize, Deserialize)]
struct RawRequirement {
    namespace: Namespace,
    #[serde(default)]
    directives: Directives,
}

impl TryFrom<RawRequirement> for Requirement {
    type Error = ModelError;

    fn try_from(raw: RawRequirement) -> Result<Self, Self::Error> {
        Self::new(raw.namespace, raw.directives)
    }
}

impl From<Requirement> for RawRequirement {
    fn from(req: Requirement) -> Self {
        Self {
            namespace: req.namespace,
            directives: req.directives,
        }
    }
}

fn check_directive(directives: &Directives, name: &str, allowed: &[&str]) -> ModelResult<()> {
    match directives.get(name) {
        Some(value) if !allowed.contains(&value.trim()) => Err(ModelError::InvalidDirective {
            directive: name.to_string(),
            value: value.clone(),
        }),
        _ => Ok(()),
    }
}

impl Requirement {
    /// Build a requirement, parsing its filter and checking directive values.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidFilter`] for a malformed filter and
    /// [`ModelError::InvalidDirective`] for an unknown `resolution`,
    /// `cardinality` or `visibility` value.
    pub fn new(namespace: Namespace, directives: Directives) -> ModelResult<Self> {
        check_directive(&directives, directive::RESOLUTION, &["mandatory", "optional", "dynamic"])?;
        check_directive(&directives, directive::CARDINALITY, &["single", "multiple"])?;
        check_directive(&directives, directive::VISIBILITY, &["private", "reexport"])?;
        let filter = directives
            .get(directive::FILTER)
            .map(|f| Filter::parse(f))
            .transpose()?;
        Ok(Self {
            namespace,
            directives,
            filter,
        })
    }

    /// A requirement with only a filter directive.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidFilter`] for a malformed filter.
    pub fn with_filter(namespace: Namespace, filter: &str) -> ModelResult<Self> {
        let mut directives = Directives::new();
        directives.insert(directive::FILTER.to_string(), filter.to_string());
        Self::new(namespace, directives)
    }

    /// Namespace.
    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Raw directives.
    #[must_use]
    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    /// Look up a directive.
    #[must_use]
    pub fn directive(&self, name: &str) -> Option<&str> {
        self.directives.get(name).map(String::as_str)
    }

    /// Parsed filter.
    #[must_use]
    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// `resolution` directive, default mandatory.
    #[must_use]
    pub fn resolution(&self) -> Resolution {
        match self.directive(directive::RESOLUTION).map(str::trim) {
            Some("optional") => Resolution::Optional,
            Some("dynamic") => Resolution::Dynamic,
            _ => Resolution::Mandatory,
        }
    }

    /// `cardinality` directive, default single.
    #[must_use]
    pub fn cardinality(&self) -> Cardinality {
        match self.directive(directive::CARDINALITY).map(str::trim) {
            Some("multiple") => Cardinality::Multiple,
            _ => Cardinality::Single,
        }
    }

    /// `visibility` directive, default private.
    #[must_use]
    pub fn visibility(&self) -> Visibility {
        match self.directive(directive::VISIBILITY).map(str::trim) {
            Some("reexport") => Visibility::Reexport,
            _ => Visibility::Private,
        }
    }

    /// Whether the resolver should consider this requirement at all.
    #[must_use]
    pub fn is_effective(&self) -> bool {
        self.directive(directive::EFFECTIVE)
            .is_none_or(|e| e.trim() == "resolve")
    }

    /// Human readable summary used in error messages.
    #[must_use]
    pub fn description(&self) -> String {
        match &self.filter {
            Some(filter) => format!("{}{filter}", self.namespace),
            None => self.namespace.to_string(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// Whether `capability` satisfies `requirement`.
///
/// Namespaces must be equal, the filter (if any) must hold over the
/// capability's attributes, and every attribute the capability declares
/// `mandatory` must be mentioned by the filter.
#[must_use]
pub fn matches(requirement: &Requirement, capability: &Capability) -> bool {
    if requirement.namespace != capability.namespace {
        return false;
    }
    let Some(filter) = &requirement.filter else {
        return capability.mandatory_attributes().next().is_none();
    };
    if !filter.matches(&capability.attributes) {
        return false;
    }
    let referenced = filter.referenced_attributes();
    capability
        .mandatory_attributes()
        .all(|name| referenced.contains(name))
}
