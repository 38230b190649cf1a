//! Configuration struct definitions.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level Trellis configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Framework and resolver settings.
    pub framework: FrameworkSection,
    /// Logging settings.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// FrameworkSection
// ---------------------------------------------------------------------------

/// Framework, resolver and persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkSection {
    /// Directory holding the persistent unit store. `None` runs in memory.
    pub storage_dir: Option<PathBuf>,
    /// Discard any persisted units on startup.
    pub clean_start: bool,
    /// Package exported by the system unit that every unit implicitly imports.
    pub bootstrap_package: String,
    /// Version of the bootstrap package.
    pub bootstrap_version: String,
    /// Add the implicit bootstrap import to non-fragment revisions.
    pub implicit_bootstrap_import: bool,
    /// Extra packages exported by the system unit.
    pub system_packages: Vec<SystemPackage>,
    /// Execution environments provided by the system unit.
    pub execution_environments: Vec<ExecutionEnvironment>,
    /// Legacy execution environment names rewritten before matching.
    pub ee_aliases: BTreeMap<String, String>,
    /// Capacity of the notification channel.
    pub event_capacity: usize,
}

impl Default for FrameworkSection {
    fn default() -> Self {
        Self {
            storage_dir: None,
            clean_start: false,
            bootstrap_package: "trellis.framework".to_owned(),
            bootstrap_version: "1.0.0".to_owned(),
            implicit_bootstrap_import: true,
            system_packages: Vec::new(),
            execution_environments: vec![
                ExecutionEnvironment::new("OSGi/Minimum", &["1.0", "1.1", "1.2"]),
                ExecutionEnvironment::new(
                    "JavaSE",
                    &["1.0", "1.1", "1.2", "1.3", "1.4", "1.5", "1.6", "1.7", "1.8"],
                ),
            ],
            ee_aliases: BTreeMap::from([("J2SE".to_owned(), "JavaSE".to_owned())]),
            event_capacity: 1024,
        }
    }
}

/// A package exported by the system unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemPackage {
    /// Package name.
    pub name: String,
    /// Package version; defaults to `0.0.0`.
    #[serde(default)]
    pub version: Option<String>,
}

/// An execution environment and the versions of it that are available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionEnvironment {
    /// Environment name, e.g. `JavaSE`.
    pub name: String,
    /// Available versions.
    #[serde(default)]
    pub versions: Vec<String>,
}

impl ExecutionEnvironment {
    /// Convenience constructor.
    #[must_use]
    pub fn new(name: &str, versions: &[&str]) -> Self {
        Self {
            name: name.to_owned(),
            versions: versions.iter().map(|v| (*v).to_owned()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["trellis_runtime=debug"]`).
    pub directives: Vec<String>,
    /// Write logs to daily-rotated files in this directory instead of stderr.
    pub file_dir: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
            file_dir: None,
        }
    }
}
