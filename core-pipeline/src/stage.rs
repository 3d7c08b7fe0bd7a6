//! The contract every pipeline stage implements.

use crate::error::Result;
use crate::run::{RunId, RunMode};
use crate::stats::CycleStats;
use async_trait::async_trait;
use core_async::sync::CancellationToken;
use core_runtime::{ActivityLog, Settings};
use std::time::Duration;

/// Per-run state handed to every cycle.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub run_id: RunId,
    pub mode: RunMode,
    pub token: CancellationToken,
    /// Activity log scoped to the stage and tagged with the run id.
    pub activity: ActivityLog,
}

impl CycleContext {
    pub fn new(mode: RunMode, activity: ActivityLog) -> Self {
        let run_id = RunId::new();
        Self {
            run_id,
            mode,
            token: CancellationToken::new(),
            activity: activity.with_span_id(run_id.to_string()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// One reconciliation stage driven by a
/// [`StageSupervisor`](crate::supervisor::StageSupervisor).
///
/// `prepare` runs before any work and turns the settings snapshot into a
/// plan; an error there aborts the run. `run_cycle` does one pass. Item
/// failures are counted in the returned stats, never returned as errors.
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    /// Name used in logs and errors.
    const NAME: &'static str;

    type Plan: Send + Sync + 'static;
    type Stats: CycleStats;

    fn prepare(&self, settings: &Settings) -> Result<Self::Plan>;

    /// Poll interval configured for this stage.
    fn interval(settings: &Settings) -> Duration;

    /// Checked every tick before a polling cycle; `false` postpones it.
    async fn ready(&self, _plan: &Self::Plan, _ctx: &CycleContext) -> bool {
        true
    }

    async fn run_cycle(&self, plan: &Self::Plan, ctx: &CycleContext) -> Result<Self::Stats>;
}

pub(crate) fn require_path(
    value: Option<&std::path::Path>,
    what: &str,
) -> Result<std::path::PathBuf> {
    match value {
        Some(path) if !path.as_os_str().is_empty() => Ok(path.to_path_buf()),
        _ => Err(crate::error::PipelineError::Validation(format!(
            "{what} is not configured"
        ))),
    }
}

pub(crate) fn require_remote(value: Option<&str>, what: &str) -> Result<String> {
    match value.map(str::trim) {
        Some(path) if !path.is_empty() => Ok(path.to_string()),
        _ => Err(crate::error::PipelineError::Validation(format!(
            "{what} is not configured"
        ))),
    }
}
