//! Remote to local mirroring.
//!
//! One-way and additive: files that differ in size or whole-second mtime
//! are copied down, directories are created, nothing is ever deleted
//! locally.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::listing::{LocalListing, RemoteListing};
use crate::record::{FileKind, FileRecord};
use crate::stage::{require_path, require_remote, CycleContext, Stage};
use crate::stats::MirrorStats;
use async_trait::async_trait;
use bridge_traits::remote::{path as remote_path, Endpoint, RemoteConnector, RemoteSession};
use core_async::fs;
use core_async::io::AsyncWriteExt;
use core_async::sync::CancellationToken;
use core_runtime::Settings;
use filetime::FileTime;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct MirrorPlan {
    pub endpoint: Endpoint,
    pub remote_root: String,
    pub local_root: PathBuf,
}

pub struct MirrorStage {
    connector: Arc<dyn RemoteConnector>,
    config: PipelineConfig,
}

impl MirrorStage {
    pub fn new(connector: Arc<dyn RemoteConnector>, config: PipelineConfig) -> Self {
        Self { connector, config }
    }

    async fn mirror(
        &self,
        session: &dyn RemoteSession,
        plan: &MirrorPlan,
        ctx: &CycleContext,
    ) -> Result<MirrorStats> {
        let tree = RemoteListing::new(session)
            .list(&plan.remote_root, &ctx.token)
            .await?;
        for failure in &tree.failures {
            let err = failure.clone().into_error(&plan.remote_root);
            ctx.activity
                .error("Failed to list remote directory", err.to_string())
                .await;
        }

        let local = LocalListing::index(LocalListing::scan(&plan.local_root).await?);
        let mut stats = MirrorStats::default();

        for record in &tree.records {
            if ctx.is_cancelled() {
                break;
            }
            let local_path = record.local_path(&plan.local_root);

            match record.kind {
                FileKind::Directory => match ensure_local_dir(&local_path).await {
                    Ok(true) => stats.dirs_created += 1,
                    Ok(false) => {}
                    Err(err) => {
                        stats.failed += 1;
                        ctx.activity
                            .error(
                                "Failed to create local directory",
                                PipelineError::item(record.relative.as_str(), err).to_string(),
                            )
                            .await;
                    }
                },
                FileKind::File => {
                    if local
                        .get(&record.relative)
                        .is_some_and(|existing| existing.same_content(record))
                    {
                        stats.skipped += 1;
                        continue;
                    }

                    let remote = remote_path::join(&plan.remote_root, &record.relative);
                    match self
                        .copy_file(session, &remote, &local_path, record, &ctx.token)
                        .await
                    {
                        Ok(bytes) => {
                            stats.copied += 1;
                            stats.bytes_copied += bytes;
                            ctx.activity
                                .info_with("Copied file", record.relative.clone())
                                .await;
                        }
                        Err(PipelineError::Cancelled) => {
                            ctx.activity
                                .info_with("Copy interrupted by stop request", record.relative.clone())
                                .await;
                            break;
                        }
                        Err(err) => {
                            stats.failed += 1;
                            ctx.activity
                                .error(
                                    "Failed to copy file",
                                    PipelineError::item(record.relative.as_str(), err).to_string(),
                                )
                                .await;
                        }
                    }
                }
            }
        }

        Ok(stats)
    }

    /// Stream one remote file to disk, then stamp it with the remote times.
    ///
    /// Returns [`PipelineError::Cancelled`] as soon as a stop is observed;
    /// the partial file is left as is and keeps its current mtime.
    async fn copy_file(
        &self,
        session: &dyn RemoteSession,
        remote: &str,
        local: &Path,
        record: &FileRecord,
        token: &CancellationToken,
    ) -> Result<u64> {
        if token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut reader = session.open_read(remote).await?;
        let mut file = fs::File::create(local).await?;
        let mut written = 0u64;
        let mut interrupted = false;

        loop {
            if token.is_cancelled() {
                interrupted = true;
                break;
            }
            let Some(chunk) = reader.read_chunk(self.config.chunk_size).await? else {
                break;
            };
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        if interrupted {
            debug!(remote, bytes = written, "Copy interrupted");
            return Err(PipelineError::Cancelled);
        }

        filetime::set_file_times(
            local,
            FileTime::from_unix_time(record.atime, 0),
            FileTime::from_unix_time(record.mtime, 0),
        )?;
        debug!(remote, bytes = written, "Copied remote file");
        Ok(written)
    }
}

/// Create `path` if it is not already a directory. `true` if created.
async fn ensure_local_dir(path: &Path) -> std::io::Result<bool> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(false),
        _ => {
            fs::create_dir_all(path).await?;
            Ok(true)
        }
    }
}

#[async_trait]
impl Stage for MirrorStage {
    const NAME: &'static str = "mirror";
    type Plan = MirrorPlan;
    type Stats = MirrorStats;

    fn prepare(&self, settings: &Settings) -> Result<MirrorPlan> {
        let remote_root = require_remote(Some(settings.remote_dir.as_str()), "Remote source directory")?;
        let local_root = require_path(Some(settings.local_dir.as_path()), "Local mirror directory")?;
        Ok(MirrorPlan {
            endpoint: settings.endpoint()?,
            remote_root: remote_path::normalize(&remote_root),
            local_root,
        })
    }

    fn interval(settings: &Settings) -> Duration {
        Duration::from_secs(settings.mirror_interval_secs)
    }

    #[instrument(skip(self, plan, ctx), fields(run_id = %ctx.run_id, remote = %plan.remote_root))]
    async fn run_cycle(&self, plan: &MirrorPlan, ctx: &CycleContext) -> Result<MirrorStats> {
        fs::create_dir_all(&plan.local_root).await?;

        let session = self.connector.connect(&plan.endpoint).await?;
        debug!(target = %plan.endpoint.display_target(), "Connected for mirror");

        let result = self.mirror(session.as_ref(), plan, ctx).await;

        if let Err(err) = session.close().await {
            ctx.activity
                .warn("Failed to close remote session", err.to_string())
                .await;
        }
        result
    }
}
