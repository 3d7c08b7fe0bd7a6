//! # Core Pipeline
//!
//! The three reconciliation stages and the supervisor that drives them.
//!
//! - [`MirrorStage`]: remote source directory to local mirror
//! - [`TranscodeStage`]: local mirror to a JPEG output tree
//! - [`PublishStage`]: output tree to the remote publish directory
//!
//! Each stage runs under its own [`StageSupervisor`], which enforces a
//! single live run, drives one-shot or polling execution, and honours
//! cooperative stop requests through a `CancellationToken`.
//!
//! ```ignore
//! use core_pipeline::{MirrorStage, PipelineConfig, StageSupervisor};
//!
//! let mirror = StageSupervisor::new(
//!     MirrorStage::new(connector, PipelineConfig::default()),
//!     settings,
//!     activity,
//!     PipelineConfig::default(),
//! );
//! let report = mirror.run_once().await?;
//! println!("copied {}", report.stats.copied);
//! ```

pub mod config;
pub mod error;
pub mod listing;
pub mod mirror;
pub mod publish;
pub mod record;
pub mod run;
pub mod stage;
pub mod stats;
pub mod supervisor;
pub mod transcode;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use listing::{ListingFailure, LocalListing, RemoteListing, RemoteTree};
pub use mirror::{MirrorPlan, MirrorStage};
pub use publish::{PublishPlan, PublishStage};
pub use record::{FileKind, FileRecord};
pub use run::{RunId, RunMode, StagePhase, StageStatus};
pub use stage::{CycleContext, Stage};
pub use stats::{CycleStats, MirrorStats, PublishStats, RunReport, TranscodeStats};
pub use supervisor::{RunHandle, StageSupervisor};
pub use transcode::{TranscodePlan, TranscodeStage};
