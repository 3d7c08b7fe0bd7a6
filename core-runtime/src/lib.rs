//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the pipeline crates:
//! - `config`: the `Settings` snapshot, its validation, secret updates and
//!   settings sources
//! - `logging`: `tracing-subscriber` initialisation and redaction helpers
//! - `activity`: the operator-facing activity log forwarded to a `LoggerSink`

pub mod activity;
pub mod config;
pub mod error;
pub mod logging;

pub use activity::{ActivityLog, MemoryLogSink};
pub use config::{JsonSettingsFile, SecretUpdate, Settings, SettingsSource, StaticSettings};
pub use error::{Error, Result};
