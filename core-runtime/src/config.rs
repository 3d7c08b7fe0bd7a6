//! # Pipeline Settings
//!
//! The resolved configuration every stage consumes.
//!
//! ## Overview
//!
//! A [`Settings`] value is an immutable snapshot: stages load one at the
//! start of each run through a [`SettingsSource`] and keep it until the run
//! ends. Edits made while a stage is running take effect on its next run.
//!
//! [`Settings::validate`] checks what every stage needs (quality, resize
//! width). [`Settings::validate_endpoint`] covers host, port, username and
//! credentials and runs inside [`Settings::endpoint`], so only stages that
//! connect require them. Directory requirements differ per stage and are
//! checked by the stage itself.
//!
//! ## Sources
//!
//! - [`StaticSettings`] holds a value in memory; [`StaticSettings::replace`]
//!   swaps it at runtime.
//! - [`JsonSettingsFile`] reads a JSON document on every load and writes it
//!   back on save, applying a [`SecretUpdate`] to the stored password.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{JsonSettingsFile, SecretUpdate, SettingsSource};
//!
//! let source = JsonSettingsFile::new("/etc/relay/settings.json");
//! if let Some(settings) = source.load().await? {
//!     settings.validate()?;
//!     let endpoint = settings.endpoint()?;
//! }
//! ```

use crate::error::{Error, Result};
use crate::logging::{redact_if_sensitive, strip_path};
use async_trait::async_trait;
use bridge_traits::remote::{Credentials, Endpoint};
use core_async::fs;
use core_async::sync::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_QUALITY: u8 = 85;
pub const DEFAULT_MIRROR_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_TRANSCODE_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_PUBLISH_INTERVAL_SECS: u64 = 10;

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

fn default_mirror_interval() -> u64 {
    DEFAULT_MIRROR_INTERVAL_SECS
}

fn default_transcode_interval() -> u64 {
    DEFAULT_TRANSCODE_INTERVAL_SECS
}

fn default_publish_interval() -> u64 {
    DEFAULT_PUBLISH_INTERVAL_SECS
}

/// Resolved pipeline settings.
///
/// Interval fields are in seconds; `0` means "run once and stop".
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,

    /// Remote directory mirrored into `local_dir`.
    #[serde(default)]
    pub remote_dir: String,
    /// Local mirror root; also the transcode input root.
    #[serde(default)]
    pub local_dir: PathBuf,
    /// Transcode output root; also the publish input root.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// JPEG quality, 1-100.
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Target width in pixels. `None` keeps the original size.
    #[serde(default)]
    pub resize_width: Option<u32>,
    /// Remote directory the transcoded tree is published to.
    #[serde(default)]
    pub publish_dir: Option<String>,

    #[serde(default = "default_mirror_interval")]
    pub mirror_interval_secs: u64,
    #[serde(default = "default_transcode_interval")]
    pub transcode_interval_secs: u64,
    #[serde(default = "default_publish_interval")]
    pub publish_interval_secs: u64,

    /// Remove local files (and emptied directories) after a successful upload.
    #[serde(default)]
    pub delete_after_upload: bool,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field(
                "password",
                &self
                    .password
                    .as_deref()
                    .map(|p| redact_if_sensitive("password", p)),
            )
            .field(
                "private_key_path",
                &self
                    .private_key_path
                    .as_ref()
                    .map(|p| strip_path(&p.to_string_lossy()).to_string()),
            )
            .field("remote_dir", &self.remote_dir)
            .field("local_dir", &self.local_dir)
            .field("output_dir", &self.output_dir)
            .field("quality", &self.quality)
            .field("resize_width", &self.resize_width)
            .field("publish_dir", &self.publish_dir)
            .field("mirror_interval_secs", &self.mirror_interval_secs)
            .field("transcode_interval_secs", &self.transcode_interval_secs)
            .field("publish_interval_secs", &self.publish_interval_secs)
            .field("delete_after_upload", &self.delete_after_upload)
            .finish()
    }
}

impl Settings {
    /// Settings with defaults for everything but the endpoint.
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password: None,
            private_key_path: None,
            remote_dir: String::new(),
            local_dir: PathBuf::new(),
            output_dir: None,
            quality: DEFAULT_QUALITY,
            resize_width: None,
            publish_dir: None,
            mirror_interval_secs: DEFAULT_MIRROR_INTERVAL_SECS,
            transcode_interval_secs: DEFAULT_TRANSCODE_INTERVAL_SECS,
            publish_interval_secs: DEFAULT_PUBLISH_INTERVAL_SECS,
            delete_after_upload: false,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_private_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key_path = Some(path.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_mirror(mut self, remote_dir: impl Into<String>, local_dir: impl Into<PathBuf>) -> Self {
        self.remote_dir = remote_dir.into();
        self.local_dir = local_dir.into();
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_resize_width(mut self, width: u32) -> Self {
        self.resize_width = Some(width);
        self
    }

    pub fn with_publish_dir(mut self, publish_dir: impl Into<String>) -> Self {
        self.publish_dir = Some(publish_dir.into());
        self
    }

    pub fn with_intervals(mut self, mirror: u64, transcode: u64, publish: u64) -> Self {
        self.mirror_interval_secs = mirror;
        self.transcode_interval_secs = transcode;
        self.publish_interval_secs = publish;
        self
    }

    pub fn with_delete_after_upload(mut self, enabled: bool) -> Self {
        self.delete_after_upload = enabled;
        self
    }

    /// Resolve the configured credentials. A key file wins over a password.
    pub fn credentials(&self) -> Option<Credentials> {
        if let Some(key) = self
            .private_key_path
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
        {
            return Some(Credentials::KeyFile(key.clone()));
        }
        self.password
            .as_ref()
            .filter(|p| !p.is_empty())
            .map(|p| Credentials::Password(p.clone()))
    }

    /// Endpoint for the bridge connector, after [`Settings::validate_endpoint`].
    pub fn endpoint(&self) -> Result<Endpoint> {
        self.validate_endpoint()?;
        let credentials = self.credentials().ok_or_else(missing_credentials)?;
        Ok(Endpoint::new(
            self.host.clone(),
            self.port,
            self.username.clone(),
            credentials,
        ))
    }

    /// Validate the settings shared by every stage.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.quality) {
            return Err(Error::Config(format!(
                "Quality must be between 1 and 100 (got {})",
                self.quality
            )));
        }
        if self.resize_width == Some(0) {
            return Err(Error::Config(
                "Resize width must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate what a remote connection needs: host, port, username and
    /// a password or key file. Local-only stages skip this.
    pub fn validate_endpoint(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("Host is required".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Config("Port must be between 1 and 65535".to_string()));
        }
        if self.username.trim().is_empty() {
            return Err(Error::Config("Username is required".to_string()));
        }
        if self.credentials().is_none() {
            return Err(missing_credentials());
        }
        Ok(())
    }

    /// Apply a password change.
    pub fn apply_password_update(&mut self, update: SecretUpdate<String>) {
        update.apply_to(&mut self.password);
    }
}

fn missing_credentials() -> Error {
    Error::Config("Either a password or a private key path is required".to_string())
}

/// Change to a stored secret.
///
/// Distinguishes "leave the stored value alone" from "remove it", which a
/// plain `Option` cannot.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum SecretUpdate<T> {
    #[default]
    Unchanged,
    Clear,
    SetTo(T),
}

impl<T> SecretUpdate<T> {
    pub fn apply_to(self, slot: &mut Option<T>) {
        match self {
            SecretUpdate::Unchanged => {}
            SecretUpdate::Clear => *slot = None,
            SecretUpdate::SetTo(value) => *slot = Some(value),
        }
    }
}

impl<T> fmt::Debug for SecretUpdate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretUpdate::Unchanged => f.write_str("Unchanged"),
            SecretUpdate::Clear => f.write_str("Clear"),
            SecretUpdate::SetTo(_) => f.write_str("SetTo(<redacted>)"),
        }
    }
}

/// Where stages get their settings from.
///
/// `Ok(None)` means nothing has been configured yet.
#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn load(&self) -> Result<Option<Settings>>;
}

/// In-memory settings, swappable at runtime.
#[derive(Debug, Default)]
pub struct StaticSettings {
    current: RwLock<Option<Settings>>,
}

impl StaticSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: RwLock::new(Some(settings)),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Replace the stored settings; running stages see it on their next run.
    pub async fn replace(&self, settings: Settings) {
        *self.current.write().await = Some(settings);
    }

    pub async fn clear(&self) {
        *self.current.write().await = None;
    }
}

#[async_trait]
impl SettingsSource for StaticSettings {
    async fn load(&self) -> Result<Option<Settings>> {
        Ok(self.current.read().await.clone())
    }
}

/// Settings persisted as a JSON document.
#[derive(Debug, Clone)]
pub struct JsonSettingsFile {
    path: PathBuf,
}

impl JsonSettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `settings`, resolving the password against the stored copy.
    ///
    /// The password carried by `settings` is ignored; `password` decides
    /// whether the stored one is kept, cleared or replaced.
    pub async fn save(&self, mut settings: Settings, password: SecretUpdate<String>) -> Result<()> {
        let stored = self.load().await?;
        settings.password = stored.and_then(|s| s.password);
        settings.apply_password_update(password);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(&settings)?;
        fs::write(&self.path, body).await?;
        tracing::info!(path = ?self.path, "Saved settings");
        Ok(())
    }
}

#[async_trait]
impl SettingsSource for JsonSettingsFile {
    async fn load(&self) -> Result<Option<Settings>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
