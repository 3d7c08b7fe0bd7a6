//! Per-cycle counters and the report a finished run yields.

use crate::run::RunId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Debug;

/// Counters produced by one stage cycle.
pub trait CycleStats: Default + Clone + Debug + Send + Sync + Serialize + 'static {
    /// Add another cycle's counters into this one.
    fn absorb(&mut self, other: Self);

    /// `true` if the cycle changed anything or hit an error.
    fn did_work(&self) -> bool;

    /// One-line summary for the activity log.
    fn summary(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MirrorStats {
    pub copied: u64,
    pub skipped: u64,
    pub dirs_created: u64,
    pub failed: u64,
    pub bytes_copied: u64,
}

impl CycleStats for MirrorStats {
    fn absorb(&mut self, other: Self) {
        self.copied += other.copied;
        self.skipped += other.skipped;
        self.dirs_created += other.dirs_created;
        self.failed += other.failed;
        self.bytes_copied += other.bytes_copied;
    }

    fn did_work(&self) -> bool {
        self.copied > 0 || self.dirs_created > 0 || self.failed > 0
    }

    fn summary(&self) -> String {
        format!(
            "copied {} ({} bytes), skipped {}, directories created {}, failed {}",
            self.copied, self.bytes_copied, self.skipped, self.dirs_created, self.failed
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TranscodeStats {
    pub total_files: u64,
    pub compressed_files: u64,
    pub skipped_files: u64,
    pub error_files: u64,
    /// Sum of `original - output` sizes. Negative when outputs grew.
    pub total_saved_bytes: i64,
}

impl CycleStats for TranscodeStats {
    fn absorb(&mut self, other: Self) {
        self.total_files += other.total_files;
        self.compressed_files += other.compressed_files;
        self.skipped_files += other.skipped_files;
        self.error_files += other.error_files;
        self.total_saved_bytes += other.total_saved_bytes;
    }

    fn did_work(&self) -> bool {
        self.compressed_files > 0 || self.error_files > 0
    }

    fn summary(&self) -> String {
        format!(
            "compressed {}/{}, skipped {}, errors {}, saved {} bytes",
            self.compressed_files,
            self.total_files,
            self.skipped_files,
            self.error_files,
            self.total_saved_bytes
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishStats {
    pub uploaded_files: u64,
    pub uploaded_bytes: u64,
    pub deleted_files: u64,
    pub error_files: u64,
}

impl CycleStats for PublishStats {
    fn absorb(&mut self, other: Self) {
        self.uploaded_files += other.uploaded_files;
        self.uploaded_bytes += other.uploaded_bytes;
        self.deleted_files += other.deleted_files;
        self.error_files += other.error_files;
    }

    fn did_work(&self) -> bool {
        self.uploaded_files > 0 || self.error_files > 0
    }

    fn summary(&self) -> String {
        format!(
            "uploaded {} ({} bytes), deleted {}, errors {}",
            self.uploaded_files, self.uploaded_bytes, self.deleted_files, self.error_files
        )
    }
}

/// What a finished run yields.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport<S> {
    pub run_id: RunId,
    /// Cycles that completed, including ones halted by a stop request.
    pub cycles: u64,
    /// Counters accumulated over every cycle.
    pub stats: S,
    pub stopped_by_request: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
