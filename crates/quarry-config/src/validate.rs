//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Largest accepted in-memory read buffer (64 MiB).
const MAX_BUFFER_UPPER_BOUND: u64 = 64 * 1024 * 1024;

/// Largest accepted cache partition count.
const MAX_PARTITIONS: usize = 1024;

/// Validates a fully merged configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_mount(config)?;
    validate_cache(config)?;
    validate_io(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_mount(config: &Config) -> ConfigResult<()> {
    let id = &config.mount.workspace_id;
    if id.trim().is_empty() {
        return Err(invalid("mount.workspace_id", "workspace id must not be empty"));
    }
    if id.contains(':') {
        return Err(invalid(
            "mount.workspace_id",
            format!("workspace id '{id}' must not contain ':'"),
        ));
    }
    Ok(())
}

fn validate_cache(config: &Config) -> ConfigResult<()> {
    let c = &config.cache;
    if c.partitions == 0 || c.partitions > MAX_PARTITIONS {
        return Err(invalid(
            "cache.partitions",
            format!("partitions must be between 1 and {MAX_PARTITIONS}"),
        ));
    }
    if c.protected_size == 0 {
        return Err(invalid("cache.protected_size", "capacity must be positive"));
    }
    if c.probationary_size == 0 {
        return Err(invalid("cache.probationary_size", "capacity must be positive"));
    }
    Ok(())
}

fn validate_io(config: &Config) -> ConfigResult<()> {
    let io = &config.io;
    if io.max_buffer_size > MAX_BUFFER_UPPER_BOUND {
        return Err(invalid(
            "io.max_buffer_size",
            format!("max_buffer_size must not exceed {MAX_BUFFER_UPPER_BOUND}"),
        ));
    }
    if io.copy_buffer_size == 0 {
        return Err(invalid("io.copy_buffer_size", "copy_buffer_size must be positive"));
    }
    if io.path_lock_timeout_ms == 0 {
        return Err(invalid(
            "io.path_lock_timeout_ms",
            "path_lock_timeout_ms must be positive",
        ));
    }
    if io.max_zip_entries == 0 {
        return Err(invalid("io.max_zip_entries", "max_zip_entries must be positive"));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;
    if !matches!(
        l.level.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error" | "off"
    ) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported level '{}'; expected one of: trace, debug, info, warn, error, off",
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_workspace_id_rules() {
        let mut config = Config::default();
        config.mount.workspace_id = "a:b".into();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::ValidationError { field, .. }) if field == "mount.workspace_id"
        ));
        config.mount.workspace_id = "  ".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_io_bounds() {
        let mut config = Config::default();
        config.io.copy_buffer_size = 0;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.io.max_buffer_size = u64::MAX;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_cache_and_logging() {
        let mut config = Config::default();
        config.cache.partitions = 0;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.logging.format = "xml".into();
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.logging.level = "DEBUG".into();
        assert!(validate(&config).is_ok());
    }
}
