//! Workspace entry crate.
//!
//! Maps feature flags onto the member crates so a host binary can depend on
//! `relay-workspace` alone and pick, for example, the SFTP transport with
//! `features = ["sftp"]`.

#[cfg(any(feature = "desktop-shims", feature = "sftp"))]
pub use core_service::{PipelineDependencies, PipelineService, StageKind, StageReport};
