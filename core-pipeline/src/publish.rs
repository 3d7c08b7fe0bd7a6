//! Transcoded tree to remote publish directory.
//!
//! Uploads every file under the output root to the same relative path
//! under the publish root, creating remote directories as needed. With
//! delete-after-upload, files uploaded in the cycle are removed locally
//! and emptied directories are pruned.

use crate::error::{PipelineError, Result};
use crate::listing::LocalListing;
use crate::record::FileRecord;
use crate::stage::{require_path, require_remote, CycleContext, Stage};
use crate::stats::PublishStats;
use async_trait::async_trait;
use bridge_traits::remote::{path as remote_path, Endpoint, RemoteConnector, RemoteSession};
use core_async::fs;
use core_runtime::Settings;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct PublishPlan {
    pub endpoint: Endpoint,
    pub local_root: PathBuf,
    pub remote_root: String,
    pub delete_after_upload: bool,
}

pub struct PublishStage {
    connector: Arc<dyn RemoteConnector>,
}

impl PublishStage {
    pub fn new(connector: Arc<dyn RemoteConnector>) -> Self {
        Self { connector }
    }

    async fn publish(
        &self,
        session: &dyn RemoteSession,
        files: &[FileRecord],
        plan: &PublishPlan,
        ctx: &CycleContext,
    ) -> PublishStats {
        let mut stats = PublishStats::default();
        let mut known_dirs = HashSet::new();
        let mut uploaded = Vec::new();

        for record in files {
            if ctx.is_cancelled() {
                break;
            }
            let local = record.local_path(&plan.local_root);
            let remote = remote_path::join(&plan.remote_root, &record.relative);

            match upload_one(session, &local, &remote, record, &mut known_dirs).await {
                Ok(bytes) => {
                    stats.uploaded_files += 1;
                    stats.uploaded_bytes += bytes;
                    uploaded.push(local);
                    ctx.activity
                        .info_with("Uploaded file", record.relative.clone())
                        .await;
                }
                Err(err) => {
                    stats.error_files += 1;
                    ctx.activity
                        .error(
                            "Failed to upload file",
                            PipelineError::item(record.relative.as_str(), err).to_string(),
                        )
                        .await;
                }
            }
        }

        if plan.delete_after_upload && !uploaded.is_empty() {
            stats.deleted_files = remove_uploaded(&uploaded, plan, ctx).await;
        }
        stats
    }
}

async fn upload_one(
    session: &dyn RemoteSession,
    local: &Path,
    remote: &str,
    record: &FileRecord,
    known_dirs: &mut HashSet<String>,
) -> Result<u64> {
    if let Some(parent) = remote_path::parent(remote) {
        ensure_remote_dir(session, parent, known_dirs).await?;
    }
    let bytes = session.put(local, remote).await?;
    session.set_times(remote, record.atime, record.mtime).await?;
    Ok(bytes)
}

/// Make sure `dir` exists remotely: walk up to the nearest existing
/// ancestor, then create the missing levels top-down.
async fn ensure_remote_dir(
    session: &dyn RemoteSession,
    dir: &str,
    known_dirs: &mut HashSet<String>,
) -> Result<()> {
    let mut missing = Vec::new();
    let mut current = Some(dir.to_string());

    while let Some(candidate) = current {
        if known_dirs.contains(&candidate) || session.exists(&candidate).await? {
            break;
        }
        current = remote_path::parent(&candidate).map(str::to_string);
        missing.push(candidate);
    }

    for level in missing.iter().rev() {
        session.mkdir(level).await?;
        debug!(dir = %level, "Created remote directory");
        known_dirs.insert(level.clone());
    }
    known_dirs.insert(dir.to_string());
    Ok(())
}

/// Delete the uploaded files, then prune directories left empty.
async fn remove_uploaded(uploaded: &[PathBuf], plan: &PublishPlan, ctx: &CycleContext) -> u64 {
    let mut deleted = 0;
    for path in uploaded {
        if ctx.is_cancelled() {
            return deleted;
        }
        match fs::remove_file(path).await {
            Ok(()) => deleted += 1,
            Err(err) => {
                ctx.activity
                    .warn(
                        "Failed to delete uploaded file",
                        format!("{}: {}", path.display(), err),
                    )
                    .await;
            }
        }
    }

    let dirs = match LocalListing::directories_bottom_up(&plan.local_root).await {
        Ok(dirs) => dirs,
        Err(err) => {
            ctx.activity
                .warn("Failed to scan for empty directories", err.to_string())
                .await;
            return deleted;
        }
    };
    for dir in dirs {
        if ctx.is_cancelled() {
            break;
        }
        if !is_empty_dir(&dir).await {
            continue;
        }
        match fs::remove_dir(&dir).await {
            Ok(()) => {
                ctx.activity
                    .info_with("Removed empty directory", dir.display().to_string())
                    .await
            }
            Err(err) => {
                ctx.activity
                    .warn(
                        "Failed to remove empty directory",
                        format!("{}: {}", dir.display(), err),
                    )
                    .await
            }
        }
    }
    deleted
}

async fn is_empty_dir(dir: &Path) -> bool {
    match fs::read_dir(dir).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => false,
    }
}

#[async_trait]
impl Stage for PublishStage {
    const NAME: &'static str = "publish";
    type Plan = PublishPlan;
    type Stats = PublishStats;

    fn prepare(&self, settings: &Settings) -> Result<PublishPlan> {
        Ok(PublishPlan {
            endpoint: settings.endpoint()?,
            local_root: require_path(settings.output_dir.as_deref(), "Transcode output directory")?,
            remote_root: remote_path::normalize(&require_remote(
                settings.publish_dir.as_deref(),
                "Remote publish directory",
            )?),
            delete_after_upload: settings.delete_after_upload,
        })
    }

    fn interval(settings: &Settings) -> Duration {
        Duration::from_secs(settings.publish_interval_secs)
    }

    async fn ready(&self, plan: &PublishPlan, _ctx: &CycleContext) -> bool {
        LocalListing::has_files(&plan.local_root).await
    }

    #[instrument(skip(self, plan, ctx), fields(run_id = %ctx.run_id, remote = %plan.remote_root))]
    async fn run_cycle(&self, plan: &PublishPlan, ctx: &CycleContext) -> Result<PublishStats> {
        if !fs::metadata(&plan.local_root)
            .await
            .is_ok_and(|meta| meta.is_dir())
        {
            ctx.activity
                .warn(
                    "Upload source directory does not exist",
                    plan.local_root.display().to_string(),
                )
                .await;
            return Ok(PublishStats::default());
        }

        let files = LocalListing::files(&plan.local_root).await?;
        if files.is_empty() {
            ctx.activity.info("No files to upload").await;
            return Ok(PublishStats::default());
        }

        let session = self
            .connector
            .connect(&plan.endpoint)
            .await
            .map_err(PipelineError::from)?;
        debug!(target = %plan.endpoint.display_target(), files = files.len(), "Connected for publish");

        let stats = self.publish(session.as_ref(), &files, plan, ctx).await;

        if let Err(err) = session.close().await {
            ctx.activity
                .warn("Failed to close remote session", err.to_string())
                .await;
        }
        Ok(stats)
    }
}
