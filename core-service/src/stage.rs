//! Stage addressing for the control surface.

use crate::error::{Result, ServiceError};
use core_pipeline::{
    CycleStats, MirrorStats, PublishStats, RunHandle, RunId, RunReport, TranscodeStats,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Mirror,
    Transcode,
    Publish,
}

impl StageKind {
    /// Pipeline order.
    pub const ALL: [StageKind; 3] = [StageKind::Mirror, StageKind::Transcode, StageKind::Publish];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Mirror => "mirror",
            StageKind::Transcode => "transcode",
            StageKind::Publish => "publish",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mirror" | "sync" => Ok(StageKind::Mirror),
            "transcode" | "compress" => Ok(StageKind::Transcode),
            "publish" | "upload" => Ok(StageKind::Publish),
            other => Err(ServiceError::InitializationFailed(format!(
                "unknown stage: {other}"
            ))),
        }
    }
}

/// Report of a finished run, tagged by stage.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "stage", content = "report", rename_all = "lowercase")]
pub enum StageReport {
    Mirror(RunReport<MirrorStats>),
    Transcode(RunReport<TranscodeStats>),
    Publish(RunReport<PublishStats>),
}

impl StageReport {
    pub fn kind(&self) -> StageKind {
        match self {
            StageReport::Mirror(_) => StageKind::Mirror,
            StageReport::Transcode(_) => StageKind::Transcode,
            StageReport::Publish(_) => StageKind::Publish,
        }
    }

    pub fn run_id(&self) -> RunId {
        match self {
            StageReport::Mirror(r) => r.run_id,
            StageReport::Transcode(r) => r.run_id,
            StageReport::Publish(r) => r.run_id,
        }
    }

    pub fn cycles(&self) -> u64 {
        match self {
            StageReport::Mirror(r) => r.cycles,
            StageReport::Transcode(r) => r.cycles,
            StageReport::Publish(r) => r.cycles,
        }
    }

    pub fn stopped_by_request(&self) -> bool {
        match self {
            StageReport::Mirror(r) => r.stopped_by_request,
            StageReport::Transcode(r) => r.stopped_by_request,
            StageReport::Publish(r) => r.stopped_by_request,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            StageReport::Mirror(r) => r.stats.summary(),
            StageReport::Transcode(r) => r.stats.summary(),
            StageReport::Publish(r) => r.stats.summary(),
        }
    }

    pub fn as_mirror(&self) -> Option<&MirrorStats> {
        match self {
            StageReport::Mirror(r) => Some(&r.stats),
            _ => None,
        }
    }

    pub fn as_transcode(&self) -> Option<&TranscodeStats> {
        match self {
            StageReport::Transcode(r) => Some(&r.stats),
            _ => None,
        }
    }

    pub fn as_publish(&self) -> Option<&PublishStats> {
        match self {
            StageReport::Publish(r) => Some(&r.stats),
            _ => None,
        }
    }
}

/// A live run of any stage.
#[derive(Debug)]
pub enum StageHandle {
    Mirror(RunHandle<MirrorStats>),
    Transcode(RunHandle<TranscodeStats>),
    Publish(RunHandle<PublishStats>),
}

impl StageHandle {
    pub fn run_id(&self) -> RunId {
        match self {
            StageHandle::Mirror(h) => h.run_id(),
            StageHandle::Transcode(h) => h.run_id(),
            StageHandle::Publish(h) => h.run_id(),
        }
    }

    pub fn is_finished(&self) -> bool {
        match self {
            StageHandle::Mirror(h) => h.is_finished(),
            StageHandle::Transcode(h) => h.is_finished(),
            StageHandle::Publish(h) => h.is_finished(),
        }
    }

    pub async fn wait(self) -> Result<StageReport> {
        Ok(match self {
            StageHandle::Mirror(h) => StageReport::Mirror(h.wait().await?),
            StageHandle::Transcode(h) => StageReport::Transcode(h.wait().await?),
            StageHandle::Publish(h) => StageReport::Publish(h.wait().await?),
        })
    }
}
