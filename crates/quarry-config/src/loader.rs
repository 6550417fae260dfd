//! Config file discovery and layered loading.
//!
//! `load` works in this order:
//! 1. Parse the embedded `defaults.toml`
//! 2. Merge `/etc/quarry/config.toml` (system)
//! 3. Merge `~/.quarry/config.toml` (user)
//! 4. Merge `{workspace}/.quarry/config.toml` (workspace)
//! 5. Apply `QUARRY_*` fallbacks for fields no file set
//! 6. Deserialize and validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum accepted config file size (1 MiB).
const MAX_CONFIG_FILE_SIZE: usize = 1_048_576;

/// A loaded configuration and where each value came from.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// The final configuration.
    pub config: Config,
    /// Dotted field path → layer that set it.
    pub field_sources: FieldSources,
    /// Files that contributed, in merge order.
    pub loaded_files: Vec<String>,
}

/// Loads the layered configuration.
///
/// `workspace_root` enables the workspace layer; `home_override` replaces
/// the user's home directory for user-level discovery.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a config file is unreadable or malformed,
/// or if the merged configuration fails validation.
pub fn load(workspace_root: Option<&Path>, home_override: Option<&Path>) -> ConfigResult<ResolvedConfig> {
    let home = match home_override {
        Some(h) => Some(h.to_path_buf()),
        None => home_directory().ok(),
    };
    let layers = [
        (ConfigLayer::System, Some(PathBuf::from("/etc/quarry/config.toml"))),
        (
            ConfigLayer::User,
            home.map(|h| h.join(".quarry").join("config.toml")),
        ),
        (
            ConfigLayer::Workspace,
            workspace_root.map(|w| w.join(".quarry").join("config.toml")),
        ),
    ];
    load_layers(&layers, &collect_env_vars())
}

/// Loads defaults, then a single explicit file, then env fallbacks.
///
/// # Errors
///
/// Returns [`ConfigError::ReadError`] if `path` is missing, plus the
/// errors of [`load`].
pub fn load_file(path: &Path) -> ConfigResult<ResolvedConfig> {
    if !path.is_file() {
        return Err(ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
    }
    let layers = [(
        ConfigLayer::File(path.display().to_string()),
        Some(path.to_path_buf()),
    )];
    load_layers(&layers, &collect_env_vars())
}

pub(crate) fn load_layers(
    layers: &[(ConfigLayer, Option<PathBuf>)],
    env: &HashMap<String, String>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let mut field_sources = FieldSources::new();
    record_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);
    let mut loaded_files = Vec::new();

    for (layer, path) in layers {
        let Some(path) = path else {
            continue;
        };
        if let Some(overlay) = try_load_file(path)? {
            deep_merge_tracking(&mut merged, &overlay, "", layer, &mut field_sources);
            loaded_files.push(path.display().to_string());
            info!(path = %path.display(), layer = %layer, "loaded config");
        }
    }

    let applied = apply_env_fallbacks(&mut merged, &mut field_sources, env);
    if applied > 0 {
        debug!(count = applied, "applied environment variable fallbacks");
    }

    let config: Config = merged
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: "<merged config>".to_owned(),
            source: e,
        })?;
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Reads and parses `path`, `None` if it does not exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };
    if content.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })
}

fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}
