//! Manifest translation.
//!
//! The engine only ever sees a [`Translation`]. Turning raw manifest text
//! into one is the job of a [`ManifestTranslator`]; [`TomlManifestTranslator`]
//! reads the TOML unit manifest format:
//!
//! ```toml
//! [unit]
//! symbolic-name = "com.example.client"
//! version = "1.2.0"
//! activator = "client"
//! required-execution-environment = ["JavaSE-1.8"]
//!
//! [[export]]
//! package = "com.example.client.api"
//! version = "1.2.0"
//!
//! [[import]]
//! package = "com.example.service"
//! version = "[1.0,2.0)"
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;
use trellis_core::{
    AttributeValue, Attributes, Capability, Directives, Namespace, Requirement, Version,
    VersionRange, attribute, directive, escape_value,
};

use crate::error::{RuntimeError, RuntimeResult};
use crate::resolver::ee::EeToken;
use crate::unit::{RevisionKind, Translation};

/// Turns raw manifest text into a [`Translation`].
///
/// Called exactly once per install or update. Implementations must reject
/// malformed input; the engine never re-validates the result.
pub trait ManifestTranslator: Send + Sync {
    /// Translate one manifest.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ManifestTranslation`] for malformed input.
    fn translate(&self, raw: &str) -> RuntimeResult<Translation>;
}

/// Translator for TOML unit manifests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlManifestTranslator;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawManifest {
    unit: RawUnit,
    #[serde(default)]
    export: Vec<RawExport>,
    #[serde(default)]
    import: Vec<RawImport>,
    #[serde(default)]
    require_unit: Vec<RawRequireUnit>,
    #[serde(default)]
    dynamic_import: Vec<RawDynamicImport>,
    #[serde(default)]
    capability: Vec<RawCapability>,
    #[serde(default)]
    requirement: Vec<RawRequirement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawUnit {
    symbolic_name: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    singleton: bool,
    #[serde(default)]
    activator: Option<String>,
    #[serde(default)]
    required_execution_environment: Vec<String>,
    #[serde(default)]
    fragment_host: Option<RawFragmentHost>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawFragmentHost {
    symbolic_name: String,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawExport {
    package: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    mandatory: Vec<String>,
    #[serde(default)]
    attributes: toml::Table,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawImport {
    package: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    resolution: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawRequireUnit {
    symbolic_name: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    visibility: Option<String>,
    #[serde(default)]
    resolution: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawDynamicImport {
    package: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawCapability {
    namespace: String,
    #[serde(default)]
    attributes: toml::Table,
    #[serde(default)]
    directives: Directives,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawRequirement {
    namespace: String,
    #[serde(default)]
    filter: Option<String>,
    #[serde(default)]
    directives: Directives,
}

impl ManifestTranslator for TomlManifestTranslator {
    fn translate(&self, raw: &str) -> RuntimeResult<Translation> {
        let manifest: RawManifest = toml::from_str(raw).map_err(RuntimeError::translation)?;
        manifest.into_translation()
    }
}

impl RawManifest {
    fn into_translation(self) -> RuntimeResult<Translation> {
        let name = self.unit.symbolic_name.trim().to_string();
        if name.is_empty() {
            return Err(RuntimeError::translation("unit symbolic-name must not be empty"));
        }
        let version = parse_version(self.unit.version.as_deref())?;
        let kind = if self.unit.fragment_host.is_some() {
            RevisionKind::Fragment
        } else {
            RevisionKind::Normal
        };

        let mut capabilities = identity_capabilities(&name, &version, kind, self.unit.singleton);
        for export in self.export {
            capabilities.push(export.into_capability(&name, &version)?);
        }
        for cap in self.capability {
            capabilities.push(Capability {
                namespace: Namespace::from(cap.namespace),
                attributes: convert_attributes(cap.attributes)?,
                directives: cap.directives,
            });
        }

        let mut requirements = Vec::new();
        if let Some(host) = &self.unit.fragment_host {
            let filter = and_filter(range_clause(
                "host",
                &host.symbolic_name,
                host.version.as_deref(),
                attribute::BUNDLE_VERSION,
            )?);
            requirements.push(requirement(Namespace::Host, filter, Directives::new())?);
        }
        for import in self.import {
            requirements.push(import.into_requirement()?);
        }
        for require in self.require_unit {
            requirements.push(require.into_requirement()?);
        }
        for dynamic in self.dynamic_import {
            let mut directives = Directives::new();
            directives.insert(directive::RESOLUTION.into(), "dynamic".into());
            directives.insert(directive::CARDINALITY.into(), "multiple".into());
            let filter = format!("(package={})", escape_wildcard(&dynamic.package));
            requirements.push(requirement(Namespace::Package, filter, directives)?);
        }
        for req in self.requirement {
            let mut directives = req.directives;
            if let Some(filter) = req.filter {
                directives.insert(directive::FILTER.into(), filter);
            }
            requirements.push(
                Requirement::new(Namespace::from(req.namespace), directives)
                    .map_err(RuntimeError::translation)?,
            );
        }

        let required_ee = self
            .unit
            .required_execution_environment
            .iter()
            .map(|token| EeToken::parse(token))
            .collect::<RuntimeResult<Vec<_>>>()?;

        Ok(Translation {
            symbolic_name: name,
            version,
            kind,
            activator: self.unit.activator,
            capabilities,
            requirements,
            required_ee,
        })
    }
}

fn identity_capabilities(
    name: &str,
    version: &Version,
    kind: RevisionKind,
    singleton: bool,
) -> Vec<Capability> {
    let with_singleton = |cap: Capability| {
        if singleton {
            cap.with_directive(directive::SINGLETON, "true")
        } else {
            cap
        }
    };
    let kind_name = match kind {
        RevisionKind::Normal => "unit",
        RevisionKind::Fragment => "fragment",
    };
    let mut caps = vec![with_singleton(
        Capability::new(Namespace::Identity)
            .with_attribute(Namespace::Identity.as_str(), name)
            .with_attribute("type", kind_name)
            .with_attribute(attribute::VERSION, version.clone()),
    )];
    if kind == RevisionKind::Normal {
        caps.push(with_singleton(
            Capability::new(Namespace::Bundle)
                .with_attribute(Namespace::Bundle.as_str(), name)
                .with_attribute(attribute::BUNDLE_VERSION, version.clone()),
        ));
        caps.push(
            Capability::new(Namespace::Host)
                .with_attribute(Namespace::Host.as_str(), name)
                .with_attribute(attribute::BUNDLE_VERSION, version.clone()),
        );
    }
    caps
}

impl RawExport {
    fn into_capability(self, unit: &str, unit_version: &Version) -> RuntimeResult<Capability> {
        let mut cap = Capability::new(Namespace::Package);
        cap.attributes = convert_attributes(self.attributes)?;
        cap.attributes
            .insert(Namespace::Package.as_str().into(), self.package.into());
        cap.attributes.insert(
            attribute::VERSION.into(),
            parse_version(self.version.as_deref())?.into(),
        );
        cap.attributes
            .insert("bundle-symbolic-name".into(), unit.into());
        cap.attributes
            .insert(attribute::BUNDLE_VERSION.into(), unit_version.clone().into());
        if !self.mandatory.is_empty() {
            cap.directives
                .insert(directive::MANDATORY.into(), self.mandatory.join(","));
        }
        Ok(cap)
    }
}

impl RawImport {
    fn into_requirement(self) -> RuntimeResult<Requirement> {
        let mut clauses =
            range_clause("package", &self.package, self.version.as_deref(), attribute::VERSION)?;
        for (name, value) in &self.attributes {
            clauses.push(format!("({name}={})", escape_value(value)));
        }
        let mut directives = Directives::new();
        if let Some(resolution) = self.resolution {
            directives.insert(directive::RESOLUTION.into(), resolution);
        }
        requirement(Namespace::Package, and_filter(clauses), directives)
    }
}

impl RawRequireUnit {
    fn into_requirement(self) -> RuntimeResult<Requirement> {
        let clauses = range_clause(
            "bundle",
            &self.symbolic_name,
            self.version.as_deref(),
            attribute::BUNDLE_VERSION,
        )?;
        let mut directives = Directives::new();
        if let Some(visibility) = self.visibility {
            directives.insert(directive::VISIBILITY.into(), visibility);
        }
        if let Some(resolution) = self.resolution {
            directives.insert(directive::RESOLUTION.into(), resolution);
        }
        requirement(Namespace::Bundle, and_filter(clauses), directives)
    }
}

fn requirement(
    namespace: Namespace,
    filter: String,
    mut directives: Directives,
) -> RuntimeResult<Requirement> {
    directives.insert(directive::FILTER.into(), filter);
    Requirement::new(namespace, directives).map_err(RuntimeError::translation)
}

fn parse_version(raw: Option<&str>) -> RuntimeResult<Version> {
    raw.map_or_else(
        || Ok(Version::empty()),
        |v| Version::parse(v).map_err(RuntimeError::translation),
    )
}

/// `(key=name)` followed by the range clauses over `version_attr`.
fn range_clause(
    key: &str,
    name: &str,
    range: Option<&str>,
    version_attr: &str,
) -> RuntimeResult<Vec<String>> {
    let mut clauses = vec![format!("({key}={})", escape_value(name.trim()))];
    if let Some(range) = range {
        let range = VersionRange::parse(range).map_err(RuntimeError::translation)?;
        let rendered = range.to_filter_clauses(version_attr);
        if !rendered.is_empty() {
            clauses.push(rendered);
        }
    }
    Ok(clauses)
}

fn and_filter(clauses: Vec<String>) -> String {
    if clauses.len() == 1 {
        clauses.concat()
    } else {
        format!("(&{})", clauses.concat())
    }
}

/// Escape a package pattern, keeping `*` as a wildcard.
fn escape_wildcard(pattern: &str) -> String {
    pattern
        .trim()
        .split('*')
        .map(escape_value)
        .collect::<Vec<_>>()
        .join("*")
}

fn convert_attributes(table: toml::Table) -> RuntimeResult<Attributes> {
    table
        .into_iter()
        .map(|(name, value)| {
            let converted = convert_value(&name, value)?;
            Ok((name, converted))
        })
        .collect()
}

/// Attributes named `version` or ending in `-version` hold versions.
fn convert_value(name: &str, value: toml::Value) -> RuntimeResult<AttributeValue> {
    let is_version = name == attribute::VERSION || name.ends_with("-version");
    match value {
        toml::Value::String(s) if is_version => Version::parse(&s)
            .map(AttributeValue::Version)
            .map_err(RuntimeError::translation),
        toml::Value::String(s) => Ok(AttributeValue::String(s)),
        toml::Value::Integer(i) => Ok(AttributeValue::Long(i)),
        toml::Value::Float(f) => Ok(AttributeValue::Double(f)),
        toml::Value::Boolean(b) => Ok(AttributeValue::Bool(b)),
        toml::Value::Array(items) => items
            .into_iter()
            .map(|item| convert_value(name, item))
            .collect::<RuntimeResult<Vec<_>>>()
            .map(AttributeValue::List),
        other => Err(RuntimeError::translation(format!(
            "attribute '{name}' has unsupported type {}",
            other.type_str()
        ))),
    }
}
