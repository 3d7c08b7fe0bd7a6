//! Local mirror to normalized JPEG tree.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::listing::LocalListing;
use crate::run::RunMode;
use crate::stage::{require_path, CycleContext, Stage};
use crate::stats::TranscodeStats;
use async_trait::async_trait;
use bridge_traits::media::ImageCodec;
use core_async::fs;
use core_media::{TranscodePolicy, Transcoder};
use core_runtime::Settings;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct TranscodePlan {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub policy: TranscodePolicy,
}

#[derive(Debug, Clone)]
pub struct TranscodeStage {
    transcoder: Transcoder,
}

impl TranscodeStage {
    pub fn new(codec: Arc<dyn ImageCodec>, config: &PipelineConfig) -> Self {
        let transcoder = Transcoder::new(codec)
            .with_extensions(&config.image_extensions)
            .with_output_extension(&config.output_extension);
        Self { transcoder }
    }
}

/// The output is at least as new as the input.
async fn is_fresh(input: &Path, output: &Path) -> bool {
    let (Ok(input_meta), Ok(output_meta)) = (fs::metadata(input).await, fs::metadata(output).await)
    else {
        return false;
    };
    match (input_meta.modified(), output_meta.modified()) {
        (Ok(input_mtime), Ok(output_mtime)) => output_mtime >= input_mtime,
        _ => false,
    }
}

#[async_trait]
impl Stage for TranscodeStage {
    const NAME: &'static str = "transcode";
    type Plan = TranscodePlan;
    type Stats = TranscodeStats;

    fn prepare(&self, settings: &Settings) -> Result<TranscodePlan> {
        Ok(TranscodePlan {
            input_root: require_path(Some(settings.local_dir.as_path()), "Local mirror directory")?,
            output_root: require_path(settings.output_dir.as_deref(), "Transcode output directory")?,
            policy: TranscodePolicy::new(settings.quality).with_resize_width(settings.resize_width),
        })
    }

    fn interval(settings: &Settings) -> Duration {
        Duration::from_secs(settings.transcode_interval_secs)
    }

    #[instrument(skip(self, plan, ctx), fields(run_id = %ctx.run_id, mode = ?ctx.mode))]
    async fn run_cycle(&self, plan: &TranscodePlan, ctx: &CycleContext) -> Result<TranscodeStats> {
        let mut stats = TranscodeStats::default();

        if !fs::metadata(&plan.input_root)
            .await
            .is_ok_and(|meta| meta.is_dir())
        {
            ctx.activity
                .error(
                    "Input directory does not exist",
                    plan.input_root.display().to_string(),
                )
                .await;
            return Ok(stats);
        }
        fs::create_dir_all(&plan.output_root).await?;

        for record in LocalListing::files(&plan.input_root).await? {
            if ctx.is_cancelled() {
                break;
            }

            let input = record.local_path(&plan.input_root);
            // An output tree nested in the input tree is never fed back in.
            if input.starts_with(&plan.output_root) || !self.transcoder.accepts(&input) {
                continue;
            }
            stats.total_files += 1;

            let output = match self
                .transcoder
                .output_path(&plan.input_root, &plan.output_root, &input)
            {
                Ok(output) => output,
                Err(err) => {
                    stats.error_files += 1;
                    ctx.activity
                        .error(
                            "Failed to transcode image",
                            PipelineError::item(record.relative.as_str(), err).to_string(),
                        )
                        .await;
                    continue;
                }
            };

            if ctx.mode == RunMode::Watch && is_fresh(&input, &output).await {
                stats.skipped_files += 1;
                debug!(file = %record.relative, "Output is up to date");
                continue;
            }

            match self.transcoder.transcode(&input, &output, plan.policy).await {
                Ok(outcome) => {
                    stats.compressed_files += 1;
                    stats.total_saved_bytes += outcome.saved_bytes();
                    ctx.activity
                        .info_with(
                            "Compressed image",
                            format!(
                                "{}: {}, {} -> {} bytes",
                                record.relative,
                                outcome.dimensions(),
                                outcome.original_bytes,
                                outcome.output_bytes
                            ),
                        )
                        .await;
                }
                Err(err) => {
                    stats.error_files += 1;
                    ctx.activity
                        .error(
                            "Failed to transcode image",
                            PipelineError::item(record.relative.as_str(), err).to_string(),
                        )
                        .await;
                }
            }
        }

        Ok(stats)
    }
}
