//! Test fixtures: manifests, configuration and frameworks.

use std::fmt::Write as _;
use std::path::Path;

use trellis_config::FrameworkSection;
use trellis_runtime::Framework;
use trellis_telemetry::{LogConfig, LogTarget, setup_logging};

fn quote(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}

fn quote_list(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| quote(v)).collect();
    format!("[{}]", items.join(", "))
}

/// Builds TOML unit manifests for tests.
#[derive(Debug, Clone, Default)]
pub struct ManifestBuilder {
    name: String,
    version: Option<String>,
    singleton: bool,
    activator: Option<String>,
    required_ee: Vec<String>,
    host: Option<(String, Option<String>)>,
    sections: Vec<String>,
}

impl ManifestBuilder {
    /// Start a manifest for a unit with version `1.0.0`.
    #[must_use]
    pub fn unit(symbolic_name: &str) -> Self {
        Self {
            name: symbolic_name.to_string(),
            version: Some("1.0.0".to_string()),
            ..Self::default()
        }
    }

    /// Set the unit version.
    #[must_use]
    pub fn version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Mark the unit a singleton.
    #[must_use]
    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    /// Name the activator in the manifest.
    #[must_use]
    pub fn activator(mut self, name: &str) -> Self {
        self.activator = Some(name.to_string());
        self
    }

    /// Require an execution environment token such as `JavaSE-1.8`.
    #[must_use]
    pub fn required_ee(mut self, token: &str) -> Self {
        self.required_ee.push(token.to_string());
        self
    }

    /// Make the unit a fragment of `host`.
    #[must_use]
    pub fn fragment_of(mut self, host: &str, version: Option<&str>) -> Self {
        self.host = Some((host.to_string(), version.map(str::to_string)));
        self
    }

    /// Export a package.
    #[must_use]
    pub fn export(self, package: &str, version: &str) -> Self {
        self.section(format!(
            "[[export]]\npackage = {}\nversion = {}\n",
            quote(package),
            quote(version)
        ))
    }

    /// Export a package with extra string attributes, all of them mandatory.
    #[must_use]
    pub fn export_mandatory(self, package: &str, version: &str, attrs: &[(&str, &str)]) -> Self {
        let mut body = format!(
            "[[export]]\npackage = {}\nversion = {}\n",
            quote(package),
            quote(version)
        );
        let names: Vec<String> = attrs.iter().map(|(k, _)| (*k).to_string()).collect();
        let _ = writeln!(body, "mandatory = {}", quote_list(&names));
        body.push_str("[export.attributes]\n");
        for (key, value) in attrs {
            let _ = writeln!(body, "{} = {}", quote(key), quote(value));
        }
        self.section(body)
    }

    /// Import a package, optionally within a version range.
    #[must_use]
    pub fn import(self, package: &str, range: Option<&str>) -> Self {
        self.import_with(package, range, None, &[])
    }

    /// Import a package with `resolution:=optional`.
    #[must_use]
    pub fn optional_import(self, package: &str, range: Option<&str>) -> Self {
        self.import_with(package, range, Some("optional"), &[])
    }

    /// Import a package with matching attributes.
    #[must_use]
    pub fn import_with(
        self,
        package: &str,
        range: Option<&str>,
        resolution: Option<&str>,
        attrs: &[(&str, &str)],
    ) -> Self {
        let mut body = format!("[[import]]\npackage = {}\n", quote(package));
        if let Some(range) = range {
            let _ = writeln!(body, "version = {}", quote(range));
        }
        if let Some(resolution) = resolution {
            let _ = writeln!(body, "resolution = {}", quote(resolution));
        }
        if !attrs.is_empty() {
            body.push_str("[import.attributes]\n");
            for (key, value) in attrs {
                let _ = writeln!(body, "{} = {}", quote(key), quote(value));
            }
        }
        self.section(body)
    }

    /// Require another unit by symbolic name.
    #[must_use]
    pub fn require_unit(self, name: &str, range: Option<&str>) -> Self {
        let mut body = format!("[[require-unit]]\nsymbolic-name = {}\n", quote(name));
        if let Some(range) = range {
            let _ = writeln!(body, "version = {}", quote(range));
        }
        self.section(body)
    }

    /// Require another unit and re-export what it provides.
    #[must_use]
    pub fn reexport_unit(self, name: &str) -> Self {
        self.section(format!(
            "[[require-unit]]\nsymbolic-name = {}\nvisibility = \"reexport\"\n",
            quote(name)
        ))
    }

    /// Declare a dynamic import; `*` wildcards are allowed.
    #[must_use]
    pub fn dynamic_import(self, package: &str) -> Self {
        self.section(format!("[[dynamic-import]]\npackage = {}\n", quote(package)))
    }

    /// Append a raw TOML section.
    #[must_use]
    pub fn section(mut self, raw: impl Into<String>) -> Self {
        self.sections.push(raw.into());
        self
    }

    /// Render the manifest.
    #[must_use]
    pub fn build(&self) -> String {
        let mut out = String::from("[unit]\n");
        let _ = writeln!(out, "symbolic-name = {}", quote(&self.name));
        if let Some(version) = &self.version {
            let _ = writeln!(out, "version = {}", quote(version));
        }
        if self.singleton {
            out.push_str("singleton = true\n");
        }
        if let Some(activator) = &self.activator {
            let _ = writeln!(out, "activator = {}", quote(activator));
        }
        if !self.required_ee.is_empty() {
            let _ = writeln!(
                out,
                "required-execution-environment = {}",
                quote_list(&self.required_ee)
            );
        }
        if let Some((host, version)) = &self.host {
            out.push_str("\n[unit.fragment-host]\n");
            let _ = writeln!(out, "symbolic-name = {}", quote(host));
            if let Some(version) = version {
                let _ = writeln!(out, "version = {}", quote(version));
            }
        }
        for section in &self.sections {
            out.push('\n');
            out.push_str(section);
        }
        out
    }
}

/// In-memory framework configuration with the default system unit.
#[must_use]
pub fn test_section() -> FrameworkSection {
    FrameworkSection::default()
}

/// Framework configuration persisting to `dir`.
#[must_use]
pub fn stored_section(dir: &Path) -> FrameworkSection {
    FrameworkSection {
        storage_dir: Some(dir.to_path_buf()),
        ..FrameworkSection::default()
    }
}

/// An in-memory framework with no activators.
///
/// # Panics
///
/// Panics if the default configuration is rejected.
#[must_use]
pub async fn test_framework() -> Framework {
    Framework::open(test_section())
        .await
        .expect("default framework configuration is valid")
}

/// Install the telemetry subscriber writing to the test output, at the
/// `RUST_LOG` level or `warn`. Safe to call from every test.
pub fn init_test_logging() {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    let config = LogConfig::new(level)
        .with_target(LogTarget::Test)
        .without_ansi();
    // A second call finds the subscriber already installed.
    let _ = setup_logging(&config);
}
