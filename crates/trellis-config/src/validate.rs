//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Upper bound on the notification channel capacity.
const MAX_EVENT_CAPACITY: usize = 1_048_576;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_framework(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn is_version_like(s: &str) -> bool {
    let mut parts = s.trim().splitn(4, '.');
    let numeric_ok = parts
        .by_ref()
        .take(3)
        .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    numeric_ok && !s.trim().is_empty()
}

fn validate_framework(config: &Config) -> ConfigResult<()> {
    let f = &config.framework;

    if f.bootstrap_package.trim().is_empty() {
        return Err(invalid(
            "framework.bootstrap_package",
            "bootstrap package name must not be empty",
        ));
    }
    if !is_version_like(&f.bootstrap_version) {
        return Err(invalid(
            "framework.bootstrap_version",
            format!("'{}' is not a version", f.bootstrap_version),
        ));
    }
    if f.event_capacity == 0 || f.event_capacity > MAX_EVENT_CAPACITY {
        return Err(invalid(
            "framework.event_capacity",
            format!("event_capacity must be between 1 and {MAX_EVENT_CAPACITY}"),
        ));
    }

    for package in &f.system_packages {
        if package.name.trim().is_empty() {
            return Err(invalid(
                "framework.system_packages",
                "package name must not be empty",
            ));
        }
        if let Some(version) = &package.version
            && !is_version_like(version)
        {
            return Err(invalid(
                "framework.system_packages",
                format!("'{version}' is not a version (package {})", package.name),
            ));
        }
    }

    for ee in &f.execution_environments {
        if ee.name.trim().is_empty() {
            return Err(invalid(
                "framework.execution_environments",
                "environment name must not be empty",
            ));
        }
        if let Some(bad) = ee.versions.iter().find(|v| !is_version_like(v)) {
            return Err(invalid(
                "framework.execution_environments",
                format!("'{bad}' is not a version (environment {})", ee.name),
            ));
        }
    }

    if let Some((alias, _)) = f
        .ee_aliases
        .iter()
        .find(|(alias, target)| alias.trim().is_empty() || target.trim().is_empty())
    {
        return Err(invalid(
            "framework.ee_aliases",
            format!("alias '{alias}' has an empty name or target"),
        ));
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;
    if !matches!(
        l.level.as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported level '{}'; expected one of: trace, debug, info, warn, error",
                l.level
            ),
        ));
    }
    if !matches!(l.format.as_str(), "pretty" | "compact" | "json" | "full") {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported format '{}'; expected one of: pretty, compact, json, full",
                l.format
            ),
        ));
    }
    Ok(())
}
