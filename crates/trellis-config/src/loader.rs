//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `/etc/trellis/config.toml` (system)
//! 3. Merge the user file (`TRELLIS_HOME/config.toml`, else the platform
//!    config directory)
//! 4. Merge the explicit file, if one was given
//! 5. Apply `TRELLIS_*` env var fallbacks for fields no file set
//! 6. Deserialize merged tree → `Config`
//! 7. Validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record};
use crate::types::Config;
use crate::validate;

const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Largest config file accepted, in bytes.
pub const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

const SYSTEM_CONFIG: &str = "/etc/trellis/config.toml";

/// A loaded configuration plus where each field came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final configuration.
    pub config: Config,
    /// Layer that set each leaf field, keyed by dotted path.
    pub field_sources: FieldSources,
    /// Files merged, in order.
    pub loaded_files: Vec<PathBuf>,
}

/// Where to look for configuration files.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit file merged above the user layer.
    pub explicit_file: Option<PathBuf>,
    /// Directory used instead of the user config directory.
    pub home_override: Option<PathBuf>,
    /// Skip `/etc/trellis/config.toml`.
    pub skip_system: bool,
}

/// Load the configuration with layered file precedence.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// final merged configuration fails validation.
pub fn load(options: &LoadOptions) -> ConfigResult<ResolvedConfig> {
    load_with_env(options, &collect_env_vars())
}

/// [`load`] with an explicit environment snapshot.
///
/// # Errors
///
/// Same as [`load`].
pub fn load_with_env<S: ::std::hash::BuildHasher>(
    options: &LoadOptions,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<ResolvedConfig> {
    // 1. Parse embedded defaults.
    let mut merged: toml::Value = toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::Parse {
        path: PathBuf::from("<defaults>"),
        source: e,
    })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    let mut layers: Vec<(PathBuf, ConfigLayer)> = Vec::new();

    // 2. System config.
    if !options.skip_system {
        layers.push((PathBuf::from(SYSTEM_CONFIG), ConfigLayer::System));
    }

    // 3. User config.
    let user_dir = options
        .home_override
        .clone()
        .or_else(|| env_vars.get("TRELLIS_HOME").map(PathBuf::from))
        .or_else(user_config_dir);
    if let Some(dir) = user_dir {
        layers.push((dir.join("config.toml"), ConfigLayer::User));
    }

    // 4. Explicit file. Unlike the discovered layers it must exist.
    if let Some(path) = &options.explicit_file {
        if !path.is_file() {
            return Err(not_found(path));
        }
        layers.push((path.clone(), ConfigLayer::Explicit));
    }

    for (path, layer) in layers {
        if let Some(overlay) = try_load_file(&path)? {
            deep_merge_tracking(&mut merged, &overlay, "", &layer, &mut field_sources);
            loaded_files.push(path.clone());
            info!(path = %path.display(), layer = %layer, "Config layer merged");
        }
    }

    // 5. Env var fallbacks.
    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "Environment fallbacks applied");
    }

    // 6. Deserialize.
    let config: Config = merged.try_into().map_err(|e| ConfigError::Parse {
        path: PathBuf::from("<merged>"),
        source: e,
    })?;

    // 7. Validate.
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a config from a specific file path (no layering).
///
/// Fields missing from the file take their built-in defaults.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let value = try_load_file(path)?.ok_or_else(|| not_found(path))?;
    let config: Config = value.try_into().map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    validate::validate(&config)?;
    Ok(config)
}

fn not_found(path: &Path) -> ConfigError {
    ConfigError::Read {
        path: path.to_path_buf(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    }
}

/// Read and parse one layer. A missing file is `None`.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No config layer here");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            });
        },
    };
    if size > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::TooLarge {
            path: path.to_path_buf(),
            size,
            limit: MAX_CONFIG_FILE_SIZE,
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Platform config directory for Trellis, e.g. `~/.config/trellis`.
fn user_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "trellis").map(|d| d.config_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isolated(home: &Path) -> LoadOptions {
        LoadOptions {
            explicit_file: None,
            home_override: Some(home.to_path_buf()),
            skip_system: true,
        }
    }

    #[test]
    fn test_defaults_deserialize_to_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        let expected = Config::default();
        assert_eq!(
            config.framework.bootstrap_package,
            expected.framework.bootstrap_package
        );
        assert_eq!(
            config.framework.execution_environments,
            expected.framework.execution_environments
        );
        assert_eq!(config.framework.ee_aliases, expected.framework.ee_aliases);
        assert_eq!(config.framework.event_capacity, 1024);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_defaults_only() {
        let home = tempfile::tempdir().unwrap();
        let resolved = load_with_env(&isolated(home.path()), &HashMap::new()).unwrap();
        assert!(resolved.loaded_files.is_empty());
        assert_eq!(
            resolved.field_sources.get("framework.event_capacity"),
            Some(&ConfigLayer::Defaults)
        );
    }

    #[test]
    fn test_user_then_explicit_layering() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(
            home.path().join("config.toml"),
            "[framework]\nclean_start = true\nevent_capacity = 16\n",
        )
        .unwrap();
        let explicit = home.path().join("explicit.toml");
        std::fs::write(&explicit, "[framework]\nevent_capacity = 32\n").unwrap();

        let mut options = isolated(home.path());
        options.explicit_file = Some(explicit);
        let resolved = load_with_env(&options, &HashMap::new()).unwrap();

        assert!(resolved.config.framework.clean_start);
        assert_eq!(resolved.config.framework.event_capacity, 32);
        assert_eq!(resolved.loaded_files.len(), 2);
        assert_eq!(
            resolved.field_sources.get("framework.event_capacity"),
            Some(&ConfigLayer::Explicit)
        );
    }

    #[test]
    fn test_env_fallback_applies() {
        let home = tempfile::tempdir().unwrap();
        let env = HashMap::from([("TRELLIS_LOG_LEVEL".to_owned(), "debug".to_owned())]);
        let resolved = load_with_env(&isolated(home.path()), &env).unwrap();
        assert_eq!(resolved.config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_merged_config_is_rejected() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join("config.toml"), "[logging]\nlevel = \"loud\"\n").unwrap();
        let result = load_with_env(&isolated(home.path()), &HashMap::new());
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let home = tempfile::tempdir().unwrap();
        let mut options = isolated(home.path());
        options.explicit_file = Some(home.path().join("nope.toml"));
        assert!(matches!(
            load_with_env(&options, &HashMap::new()),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_load_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.toml");
        std::fs::write(&path, "[framework]\nbootstrap_package = \"acme.boot\"\n").unwrap();
        let config = load_file(&path).unwrap();
        assert_eq!(config.framework.bootstrap_package, "acme.boot");
        assert_eq!(config.framework.bootstrap_version, "1.0.0");
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&file_path, data).unwrap();

        let result = try_load_file(&file_path);
        assert!(matches!(
            result,
            Err(ConfigError::TooLarge { size, .. }) if size > MAX_CONFIG_FILE_SIZE
        ));
    }
}
