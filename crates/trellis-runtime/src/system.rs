//! The system unit.
//!
//! Unit `0` stands for the framework itself. It exports the bootstrap
//! package and any configured system packages, and advertises the
//! configured execution environments. It is always ACTIVE and always wired.

use trellis_config::FrameworkSection;
use trellis_core::{AttributeValue, Capability, Namespace, Version, attribute};

use crate::error::{RuntimeError, RuntimeResult};
use crate::resolver::BootstrapImport;
use crate::unit::{RevisionKind, Translation};

/// Symbolic name of the system unit.
pub const SYSTEM_SYMBOLIC_NAME: &str = "trellis.system";

/// Install location of the system unit.
pub const SYSTEM_LOCATION: &str = "system";

fn version(raw: &str, field: &str) -> RuntimeResult<Version> {
    Version::parse(raw).map_err(|e| RuntimeError::Config(format!("{field}: {e}")))
}

fn package(name: &str, version: Version) -> Capability {
    Capability::new(Namespace::Package)
        .with_attribute(Namespace::Package.as_str(), name)
        .with_attribute(attribute::VERSION, version)
        .with_attribute("bundle-symbolic-name", SYSTEM_SYMBOLIC_NAME)
}

/// The bootstrap import described by the configuration.
///
/// # Errors
///
/// Returns [`RuntimeError::Config`] if the bootstrap version is invalid.
pub fn bootstrap_import(section: &FrameworkSection) -> RuntimeResult<Option<BootstrapImport>> {
    if !section.implicit_bootstrap_import {
        return Ok(None);
    }
    Ok(Some(BootstrapImport {
        package: section.bootstrap_package.clone(),
        version: version(&section.bootstrap_version, "framework.bootstrap_version")?,
    }))
}

/// Capabilities of the system unit.
///
/// # Errors
///
/// Returns [`RuntimeError::Config`] if a configured version is invalid.
pub fn system_translation(section: &FrameworkSection) -> RuntimeResult<Translation> {
    let bootstrap_version = version(&section.bootstrap_version, "framework.bootstrap_version")?;

    let mut capabilities = vec![
        Capability::new(Namespace::Identity)
            .with_attribute(Namespace::Identity.as_str(), SYSTEM_SYMBOLIC_NAME)
            .with_attribute("type", "unit")
            .with_attribute(attribute::VERSION, bootstrap_version.clone()),
        Capability::new(Namespace::Bundle)
            .with_attribute(Namespace::Bundle.as_str(), SYSTEM_SYMBOLIC_NAME)
            .with_attribute(attribute::BUNDLE_VERSION, bootstrap_version.clone()),
        package(&section.bootstrap_package, bootstrap_version.clone()),
    ];

    for extra in &section.system_packages {
        let v = match &extra.version {
            Some(raw) => version(raw, "framework.system_packages")?,
            None => Version::empty(),
        };
        capabilities.push(package(&extra.name, v));
    }

    for ee in &section.execution_environments {
        let versions = ee
            .versions
            .iter()
            .map(|raw| version(raw, "framework.execution_environments").map(AttributeValue::Version))
            .collect::<RuntimeResult<Vec<_>>>()?;
        let mut cap = Capability::new(Namespace::ExecutionEnvironment)
            .with_attribute(Namespace::ExecutionEnvironment.as_str(), ee.name.as_str());
        if !versions.is_empty() {
            cap = cap.with_attribute(attribute::VERSION, AttributeValue::List(versions));
        }
        capabilities.push(cap);
    }

    Ok(Translation {
        symbolic_name: SYSTEM_SYMBOLIC_NAME.to_string(),
        version: bootstrap_version,
        kind: RevisionKind::Normal,
        activator: None,
        capabilities,
        requirements: Vec::new(),
        required_ee: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use trellis_config::{ExecutionEnvironment, SystemPackage};

    use super::*;

    #[test]
    fn test_default_system_translation() {
        let t = system_translation(&FrameworkSection::default()).unwrap();
        assert_eq!(t.symbolic_name, SYSTEM_SYMBOLIC_NAME);
        let bootstrap = t
            .capabilities
            .iter()
            .find(|c| c.namespace == Namespace::Package)
            .unwrap();
        assert_eq!(bootstrap.key(), Some("trellis.framework"));
        let ees = t
            .capabilities
            .iter()
            .filter(|c| c.namespace == Namespace::ExecutionEnvironment)
            .count();
        assert_eq!(ees, 2);
    }

    #[test]
    fn test_extra_system_packages_and_ees() {
        let mut section = FrameworkSection::default();
        section.system_packages.push(SystemPackage {
            name: "javax.net".into(),
            version: Some("1.1".into()),
        });
        section.execution_environments = vec![ExecutionEnvironment::new("CDC/Foundation", &["1.0"])];
        let t = system_translation(&section).unwrap();
        assert!(t.capabilities.iter().any(|c| c.key() == Some("javax.net")));
        assert!(t
            .capabilities
            .iter()
            .any(|c| c.key() == Some("CDC/Foundation")));
    }

    #[test]
    fn test_invalid_bootstrap_version() {
        let section = FrameworkSection {
            bootstrap_version: "one".into(),
            ..FrameworkSection::default()
        };
        assert!(matches!(
            system_translation(&section),
            Err(RuntimeError::Config(_))
        ));
    }

    #[test]
    fn test_bootstrap_import_disabled() {
        let section = FrameworkSection {
            implicit_bootstrap_import: false,
            ..FrameworkSection::default()
        };
        assert!(bootstrap_import(&section).unwrap().is_none());
    }
}
