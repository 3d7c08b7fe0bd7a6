//! Pipeline service façade and bootstrap helpers.
//!
//! Wires host-provided capabilities (remote connector, image codec, settings
//! source, log sink) into the three pipeline stages and exposes one control
//! surface addressed by [`StageKind`]. Desktop hosts enable `desktop-shims`
//! for the local-directory endpoint, and `sftp` for the SSH transport.

pub mod error;
pub mod stage;

pub use error::{Result, ServiceError};
pub use stage::{StageHandle, StageKind, StageReport};

use std::sync::Arc;

use bridge_traits::{media::ImageCodec, remote::RemoteConnector, time::LoggerSink};
use core_media::ImageRsCodec;
use core_pipeline::{
    MirrorStage, PipelineConfig, PipelineError, PublishStage, StageStatus, StageSupervisor,
    TranscodeStage,
};
use core_runtime::{ActivityLog, SecretUpdate, Settings, SettingsSource};
use std::time::Duration;
use tracing::{info, instrument};

/// Aggregated handle to the capabilities the pipeline requires.
pub struct PipelineDependencies {
    pub connector: Arc<dyn RemoteConnector>,
    pub codec: Arc<dyn ImageCodec>,
    pub settings: Arc<dyn SettingsSource>,
    /// `None` logs through `tracing` only.
    pub log_sink: Option<Arc<dyn LoggerSink>>,
}

impl PipelineDependencies {
    /// Dependencies with the `image`-crate codec and no log sink.
    pub fn new(connector: Arc<dyn RemoteConnector>, settings: Arc<dyn SettingsSource>) -> Self {
        Self {
            connector,
            codec: Arc::new(ImageRsCodec),
            settings,
            log_sink: None,
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn ImageCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }
}

/// Outcome of a successful connection test.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ConnectionReport {
    /// `user@host:port`.
    pub target: String,
    pub remote_dir: String,
    /// Direct children of the remote source directory.
    pub entries: usize,
}

struct ServiceInner {
    mirror: StageSupervisor<MirrorStage>,
    transcode: StageSupervisor<TranscodeStage>,
    publish: StageSupervisor<PublishStage>,
    connector: Arc<dyn RemoteConnector>,
    settings: Arc<dyn SettingsSource>,
    activity: ActivityLog,
}

/// Primary façade exposed to host applications.
///
/// Cheap to clone; clones share the same stage locks.
#[derive(Clone)]
pub struct PipelineService {
    inner: Arc<ServiceInner>,
}

impl PipelineService {
    pub fn new(deps: PipelineDependencies) -> Self {
        Self::with_config(deps, PipelineConfig::default())
    }

    pub fn with_config(deps: PipelineDependencies, config: PipelineConfig) -> Self {
        let activity = match deps.log_sink {
            Some(sink) => ActivityLog::new(sink),
            None => ActivityLog::tracing_only(),
        };

        let mirror = StageSupervisor::new(
            MirrorStage::new(Arc::clone(&deps.connector), config.clone()),
            Arc::clone(&deps.settings),
            activity.clone(),
            config.clone(),
        );
        let transcode = StageSupervisor::new(
            TranscodeStage::new(Arc::clone(&deps.codec), &config),
            Arc::clone(&deps.settings),
            activity.clone(),
            config.clone(),
        );
        let publish = StageSupervisor::new(
            PublishStage::new(Arc::clone(&deps.connector)),
            Arc::clone(&deps.settings),
            activity.clone(),
            config,
        );

        Self {
            inner: Arc::new(ServiceInner {
                mirror,
                transcode,
                publish,
                connector: deps.connector,
                settings: deps.settings,
                activity: activity.scoped("service"),
            }),
        }
    }

    /// Run one pass of `stage` and wait for it.
    pub async fn run_once(&self, stage: StageKind) -> Result<StageReport> {
        self.start_watch(stage, 0).await?.wait().await
    }

    /// Start `stage` polling every `interval_secs`; `0` runs a single pass.
    pub async fn start_watch(&self, stage: StageKind, interval_secs: u64) -> Result<StageHandle> {
        let interval = Duration::from_secs(interval_secs);
        let inner = &self.inner;
        Ok(match stage {
            StageKind::Mirror => StageHandle::Mirror(inner.mirror.start(interval).await?),
            StageKind::Transcode => StageHandle::Transcode(inner.transcode.start(interval).await?),
            StageKind::Publish => StageHandle::Publish(inner.publish.start(interval).await?),
        })
    }

    /// Start `stage` with the interval from the current settings.
    pub async fn start(&self, stage: StageKind) -> Result<StageHandle> {
        let inner = &self.inner;
        Ok(match stage {
            StageKind::Mirror => StageHandle::Mirror(inner.mirror.start_configured().await?),
            StageKind::Transcode => {
                StageHandle::Transcode(inner.transcode.start_configured().await?)
            }
            StageKind::Publish => StageHandle::Publish(inner.publish.start_configured().await?),
        })
    }

    pub async fn request_stop(&self, stage: StageKind) -> Result<()> {
        let inner = &self.inner;
        match stage {
            StageKind::Mirror => inner.mirror.request_stop().await?,
            StageKind::Transcode => inner.transcode.request_stop().await?,
            StageKind::Publish => inner.publish.request_stop().await?,
        }
        Ok(())
    }

    pub fn status(&self, stage: StageKind) -> StageStatus {
        match stage {
            StageKind::Mirror => self.inner.mirror.status(),
            StageKind::Transcode => self.inner.transcode.status(),
            StageKind::Publish => self.inner.publish.status(),
        }
    }

    pub fn status_all(&self) -> Vec<StageStatus> {
        StageKind::ALL.iter().map(|kind| self.status(*kind)).collect()
    }

    /// Operator recovery: release `stage` even if its run never finished.
    pub async fn force_unlock(&self, stage: StageKind) -> bool {
        match stage {
            StageKind::Mirror => self.inner.mirror.force_unlock().await,
            StageKind::Transcode => self.inner.transcode.force_unlock().await,
            StageKind::Publish => self.inner.publish.force_unlock().await,
        }
    }

    /// Connect with the stored settings and list the remote source directory.
    pub async fn test_connection(&self) -> Result<ConnectionReport> {
        let settings = self.inner.settings.load().await?.ok_or_else(|| {
            PipelineError::Validation("Connection settings are not configured".to_string())
        })?;
        self.test_settings(settings, SecretUpdate::Unchanged).await
    }

    /// Test `candidate` before saving it.
    ///
    /// With [`SecretUpdate::Unchanged`] the stored password is used, so a
    /// form that leaves the password blank can still be tested.
    #[instrument(skip(self, candidate, password), fields(host = %candidate.host))]
    pub async fn test_settings(
        &self,
        mut candidate: Settings,
        password: SecretUpdate<String>,
    ) -> Result<ConnectionReport> {
        if matches!(password, SecretUpdate::Unchanged) && candidate.password.is_none() {
            if let Some(stored) = self.inner.settings.load().await? {
                candidate.password = stored.password;
            }
        }
        candidate.apply_password_update(password);

        let activity = &self.inner.activity;
        let target = format!("{}:{}", candidate.host, candidate.port);
        activity
            .info_with("Connection test started", target.clone())
            .await;

        match self.probe(&candidate).await {
            Ok(report) => {
                activity
                    .info_with(
                        "Connection test succeeded",
                        format!("{}, remote directory {}", target, report.remote_dir),
                    )
                    .await;
                Ok(report)
            }
            Err(err) => {
                activity
                    .error("Connection test failed", format!("{target}: {err}"))
                    .await;
                Err(err)
            }
        }
    }

    async fn probe(&self, settings: &Settings) -> Result<ConnectionReport> {
        settings.validate()?;
        let endpoint = settings.endpoint()?;
        let remote_dir = if settings.remote_dir.trim().is_empty() {
            "/".to_string()
        } else {
            settings.remote_dir.clone()
        };

        let session = self
            .inner
            .connector
            .connect(&endpoint)
            .await
            .map_err(|e| ServiceError::ConnectionTest(e.to_string()))?;
        let listed = session.read_dir(&remote_dir).await;
        if let Err(err) = session.close().await {
            tracing::warn!(error = %err, "Failed to close test session");
        }
        let entries = listed.map_err(|e| ServiceError::ConnectionTest(e.to_string()))?;

        info!(target = %endpoint.display_target(), entries = entries.len(), "Connection test passed");
        Ok(ConnectionReport {
            target: endpoint.display_target(),
            remote_dir,
            entries: entries.len(),
        })
    }
}

/// Service whose endpoint is a locally mounted directory.
///
/// ```ignore
/// use core_runtime::JsonSettingsFile;
///
/// let settings = Arc::new(JsonSettingsFile::new("relay.json"));
/// let service = core_service::bootstrap_local_dir("/mnt/share", settings, None);
/// let report = service.run_once(StageKind::Mirror).await?;
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_local_dir(
    root: impl Into<std::path::PathBuf>,
    settings: Arc<dyn SettingsSource>,
    log_sink: Option<Arc<dyn LoggerSink>>,
) -> PipelineService {
    let connector = Arc::new(bridge_desktop::LocalDirConnector::new(root));
    let mut deps = PipelineDependencies::new(connector, settings);
    deps.log_sink = log_sink;
    PipelineService::new(deps)
}

/// Service that talks SFTP to the configured host.
#[cfg(feature = "sftp")]
pub fn bootstrap_sftp(
    settings: Arc<dyn SettingsSource>,
    log_sink: Option<Arc<dyn LoggerSink>>,
) -> PipelineService {
    let connector = Arc::new(bridge_desktop::SftpConnector::new());
    let mut deps = PipelineDependencies::new(connector, settings);
    deps.log_sink = log_sink;
    PipelineService::new(deps)
}
