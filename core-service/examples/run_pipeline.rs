//! Run one pipeline stage from the command line.
//!
//! ```text
//! cargo run -p core-service --example run_pipeline -- relay.json mirror /mnt/share
//! ```
//!
//! The third argument is the directory served as the remote endpoint. With
//! the `sftp` feature it may be omitted to talk SFTP to the configured host.

use anyhow::{bail, Context};
use bridge_traits::time::{ConsoleLogger, LoggerSink};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_runtime::{JsonSettingsFile, SettingsSource};
use core_service::{PipelineService, StageKind};
use std::sync::Arc;

fn build_service(
    endpoint_root: Option<String>,
    settings: Arc<dyn SettingsSource>,
    sink: Arc<dyn LoggerSink>,
) -> anyhow::Result<PipelineService> {
    match endpoint_root {
        Some(root) => Ok(core_service::bootstrap_local_dir(root, settings, Some(sink))),
        #[cfg(feature = "sftp")]
        None => Ok(core_service::bootstrap_sftp(settings, Some(sink))),
        #[cfg(not(feature = "sftp"))]
        None => bail!("an endpoint directory is required without the `sftp` feature"),
    }
}

#[core_async::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default().with_format(LogFormat::Compact))?;

    let mut args = std::env::args().skip(1);
    let Some(settings_path) = args.next() else {
        bail!("usage: run_pipeline <settings.json> <mirror|transcode|publish> [endpoint-dir]");
    };
    let stage: StageKind = args
        .next()
        .unwrap_or_else(|| "mirror".to_string())
        .parse()?;

    let settings = Arc::new(JsonSettingsFile::new(settings_path));
    let service = build_service(args.next(), settings, Arc::new(ConsoleLogger::default()))?;

    let report = service
        .run_once(stage)
        .await
        .with_context(|| format!("{stage} run failed"))?;
    println!("{stage}: {}", report.summary());
    Ok(())
}
