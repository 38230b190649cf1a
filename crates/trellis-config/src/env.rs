//! Environment variable fallbacks.
//!
//! Env vars are fallback, not override: they only apply to fields that no
//! config file set.

use std::collections::HashMap;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
}

/// All supported `TRELLIS_*` env var mappings.
const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "TRELLIS_STORAGE_DIR",
        field_path: "framework.storage_dir",
    },
    EnvMapping {
        var_name: "TRELLIS_CLEAN_START",
        field_path: "framework.clean_start",
    },
    EnvMapping {
        var_name: "TRELLIS_BOOTSTRAP_PACKAGE",
        field_path: "framework.bootstrap_package",
    },
    EnvMapping {
        var_name: "TRELLIS_EVENT_CAPACITY",
        field_path: "framework.event_capacity",
    },
    EnvMapping {
        var_name: "TRELLIS_LOG_LEVEL",
        field_path: "logging.level",
    },
    EnvMapping {
        var_name: "TRELLIS_LOG_FORMAT",
        field_path: "logging.format",
    },
    EnvMapping {
        var_name: "TRELLIS_LOG_DIR",
        field_path: "logging.file_dir",
    },
];

/// Snapshot the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("TRELLIS_"))
        .collect()
}

/// Apply environment variable fallbacks to fields that were not set by any
/// config file layer.
///
/// Returns the number of env vars applied.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        let set_by_file = sources
            .get(mapping.field_path)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults);
        if set_by_file {
            continue;
        }

        if let Some(val) = env_vars.get(mapping.var_name) {
            debug!(
                var = mapping.var_name,
                field = mapping.field_path,
                "applying env var fallback"
            );
            set_field_from_string(merged, mapping.field_path, val);
            sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
            count = count.saturating_add(1);
        }
    }

    count
}

fn set_field_from_string(root: &mut toml::Value, path: &str, val: &str) {
    let toml_val = coerce_to_toml_value(path, val);
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(leaf) = segments.pop() else {
        return;
    };

    let mut current = root;
    for segment in segments {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        current = table
            .entry(segment.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    if let Some(table) = current.as_table_mut() {
        table.insert(leaf.to_owned(), toml_val);
    }
}

/// Coerce a string env var value to the TOML type of the target field.
fn coerce_to_toml_value(path: &str, val: &str) -> toml::Value {
    if path == "framework.clean_start"
        && let Ok(b) = val.trim().parse::<bool>()
    {
        return toml::Value::Boolean(b);
    }
    if path == "framework.event_capacity"
        && let Ok(n) = val.trim().parse::<i64>()
    {
        return toml::Value::Integer(n);
    }
    toml::Value::String(val.to_owned())
}
