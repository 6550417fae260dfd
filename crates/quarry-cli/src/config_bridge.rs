//! Bridge from `quarry_config::Config` to mount and logging types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use quarry_config::Config;
use quarry_telemetry::{LogConfig, LogFormat};
use quarry_vfs::{CacheOptions, MountOptions};

/// Convert config to [`MountOptions`].
#[must_use]
pub fn to_mount_options(cfg: &Config) -> MountOptions {
    MountOptions {
        cache: CacheOptions {
            partitions: cfg.cache.partitions,
            protected_capacity: cfg.cache.protected_size,
            probationary_capacity: cfg.cache.probationary_size,
        },
        max_buffer_size: cfg.io.max_buffer_size,
        copy_buffer_size: cfg.io.copy_buffer_size,
        path_lock_timeout: Duration::from_millis(cfg.io.path_lock_timeout_ms),
        max_zip_entries: cfg.io.max_zip_entries,
    }
}

/// Convert config to [`LogConfig`].
#[must_use]
pub fn to_log_config(cfg: &Config) -> LogConfig {
    let format = match cfg.logging.format.as_str() {
        "pretty" => LogFormat::Pretty,
        "json" => LogFormat::Json,
        "full" => LogFormat::Full,
        _ => LogFormat::Compact,
    };

    let mut log_config = LogConfig::new(&cfg.logging.level).with_format(format);

    for directive in &cfg.logging.directives {
        log_config = log_config.with_directive(directive);
    }

    log_config
}

/// The directory to mount: the configured root, resolved against `cwd`
/// when relative, or `cwd` itself when unset.
#[must_use]
pub fn mount_root(cfg: &Config, cwd: &Path) -> PathBuf {
    if cfg.mount.root.as_os_str().is_empty() {
        cwd.to_path_buf()
    } else {
        cwd.join(&cfg.mount.root)
    }
}
