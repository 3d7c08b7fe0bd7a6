use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for one stage run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a run does one pass or keeps polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunMode {
    /// Interval `0`: a single pass.
    OneShot,
    /// Interval above `0`: pass, sleep, repeat until stopped.
    Watch,
}

impl RunMode {
    pub fn from_interval(interval: std::time::Duration) -> Self {
        if interval.is_zero() {
            RunMode::OneShot
        } else {
            RunMode::Watch
        }
    }
}

/// Lifecycle of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StagePhase {
    Idle,
    Running,
    StopRequested,
}

impl StagePhase {
    pub fn is_active(&self) -> bool {
        !matches!(self, StagePhase::Idle)
    }
}

/// Snapshot returned by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageStatus {
    pub stage: &'static str,
    pub phase: StagePhase,
    pub running: bool,
    pub stop_requested: bool,
    pub current_run: Option<RunId>,
    /// When the most recent run finished.
    pub last_run: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn test_run_id_display_is_uuid() {
        let uuid = Uuid::new_v4();
        assert_eq!(RunId::from_uuid(uuid).to_string(), uuid.to_string());
    }

    #[test]
    fn test_mode_from_interval() {
        assert_eq!(RunMode::from_interval(Duration::ZERO), RunMode::OneShot);
        assert_eq!(RunMode::from_interval(Duration::from_secs(5)), RunMode::Watch);
    }

    #[test]
    fn test_phase_activity() {
        assert!(!StagePhase::Idle.is_active());
        assert!(StagePhase::Running.is_active());
        assert!(StagePhase::StopRequested.is_active());
    }
}
