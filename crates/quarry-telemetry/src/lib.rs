//! Quarry Telemetry - logging for the Quarry virtual file system.
//!
//! This crate provides:
//! - [`LogConfig`], a serializable description of where and how to log
//! - [`setup_logging`], which installs a global `tracing` subscriber
//!
//! # Example
//!
//! ```rust,no_run
//! use quarry_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), quarry_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("quarry_vfs=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("Logging ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
