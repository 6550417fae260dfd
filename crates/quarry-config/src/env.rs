//! Environment variable fallbacks.
//!
//! A `QUARRY_*` variable fills its field only when no config file set it.

use std::collections::HashMap;

use crate::merge::{ConfigLayer, FieldSources};

/// Variable → dotted field path, with the TOML type of the field.
const ENV_FIELDS: &[(&str, &str, FieldType)] = &[
    ("QUARRY_WORKSPACE_ID", "mount.workspace_id", FieldType::String),
    ("QUARRY_ROOT", "mount.root", FieldType::String),
    ("QUARRY_LOG_LEVEL", "logging.level", FieldType::String),
    ("QUARRY_LOG_FORMAT", "logging.format", FieldType::String),
    ("QUARRY_MAX_BUFFER_SIZE", "io.max_buffer_size", FieldType::Integer),
    ("QUARRY_PATH_LOCK_TIMEOUT_MS", "io.path_lock_timeout_ms", FieldType::Integer),
];

#[derive(Debug, Clone, Copy)]
enum FieldType {
    String,
    Integer,
}

/// Snapshot of the `QUARRY_*` variables of this process.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("QUARRY_"))
        .collect()
}

/// Applies fallbacks for fields still at their default. Returns how many
/// were applied. Unparseable integers are skipped with a warning.
pub fn apply_env_fallbacks(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env: &HashMap<String, String>,
) -> usize {
    let mut applied = 0usize;
    for (var, field, ty) in ENV_FIELDS {
        let Some(raw) = env.get(*var) else {
            continue;
        };
        if sources
            .get(*field)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults)
        {
            continue;
        }
        let value = match ty {
            FieldType::String => toml::Value::String(raw.clone()),
            FieldType::Integer => match raw.parse::<i64>() {
                Ok(n) => toml::Value::Integer(n),
                Err(e) => {
                    tracing::warn!(var, error = %e, "ignoring non-integer environment value");
                    continue;
                },
            },
        };
        if set_path(merged, field, value) {
            sources.insert((*field).to_owned(), ConfigLayer::Environment);
            applied = applied.saturating_add(1);
        }
    }
    applied
}

fn set_path(root: &mut toml::Value, dotted: &str, value: toml::Value) -> bool {
    let Some(table) = root.as_table_mut() else {
        return false;
    };
    match dotted.split_once('.') {
        None => {
            table.insert(dotted.to_owned(), value);
            true
        },
        Some((head, rest)) => {
            let child = table
                .entry(head.to_owned())
                .or_insert(toml::Value::Table(toml::map::Map::new()));
            set_path(child, rest, value)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::record_leaves;

    #[test]
    fn test_env_fills_defaults_only() {
        let mut merged: toml::Value =
            toml::from_str("[mount]\nworkspace_id = \"default\"\n[logging]\nlevel = \"info\"\n").unwrap();
        let mut sources = FieldSources::new();
        record_leaves(&merged, "", &ConfigLayer::Defaults, &mut sources);
        sources.insert("logging.level".into(), ConfigLayer::User);

        let env = HashMap::from([
            ("QUARRY_WORKSPACE_ID".to_owned(), "ws-9".to_owned()),
            ("QUARRY_LOG_LEVEL".to_owned(), "trace".to_owned()),
            ("QUARRY_MAX_BUFFER_SIZE".to_owned(), "lots".to_owned()),
        ]);
        assert_eq!(apply_env_fallbacks(&mut merged, &mut sources, &env), 1);
        assert_eq!(merged["mount"]["workspace_id"].as_str(), Some("ws-9"));
        assert_eq!(merged["logging"]["level"].as_str(), Some("info"));
        assert_eq!(sources["mount.workspace_id"], ConfigLayer::Environment);
    }
}
