#![allow(dead_code)]

use async_trait::async_trait;
use bridge_desktop::LocalDirConnector;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::remote::{Endpoint, RemoteConnector, RemoteEntry, RemoteReader, RemoteSession};
use bytes::Bytes;
use core_async::sync::CancellationToken;
use core_pipeline::{CycleContext, RunMode};
use core_runtime::{ActivityLog, MemoryLogSink, Settings};
use filetime::FileTime;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A scratch layout: `remote/` served as the endpoint root, plus local
/// `mirror/` and `out/` trees.
pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("remote")).unwrap();
        Self { dir }
    }

    pub fn remote_root(&self) -> PathBuf {
        self.dir.path().join("remote")
    }

    pub fn mirror(&self) -> PathBuf {
        self.dir.path().join("mirror")
    }

    pub fn out(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn connector(&self) -> Arc<LocalDirConnector> {
        Arc::new(LocalDirConnector::new(self.remote_root()))
    }

    pub fn settings(&self) -> Settings {
        Settings::new("localhost", "relay")
            .with_password("secret")
            .with_mirror("/src", self.mirror())
            .with_output_dir(self.out())
            .with_publish_dir("/pub")
            .with_intervals(0, 0, 0)
    }
}

pub fn write_file(path: &Path, contents: &[u8], mtime: i64) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
    set_mtime(path, mtime);
}

pub fn set_mtime(path: &Path, mtime: i64) {
    let time = FileTime::from_unix_time(mtime, 0);
    filetime::set_file_times(path, time, time).unwrap();
}

pub fn mtime_of(path: &Path) -> i64 {
    FileTime::from_last_modification_time(&std::fs::metadata(path).unwrap()).unix_seconds()
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    image::RgbImage::from_pixel(width, height, image::Rgb([120, 40, 200]))
        .save(path)
        .unwrap();
}

pub fn context(mode: RunMode) -> (CycleContext, Arc<MemoryLogSink>) {
    let sink = Arc::new(MemoryLogSink::default());
    let ctx = CycleContext::new(mode, ActivityLog::new(sink.clone()));
    (ctx, sink)
}

/// Fails `open_read` and `put` for paths ending in `fail_on`.
pub struct FlakyConnector {
    inner: LocalDirConnector,
    fail_on: String,
}

impl FlakyConnector {
    pub fn new(root: PathBuf, fail_on: &str) -> Self {
        Self {
            inner: LocalDirConnector::new(root),
            fail_on: fail_on.to_string(),
        }
    }
}

#[async_trait]
impl RemoteConnector for FlakyConnector {
    async fn connect(&self, endpoint: &Endpoint) -> BridgeResult<Box<dyn RemoteSession>> {
        let inner = self.inner.connect(endpoint).await?;
        Ok(Box::new(WrappedSession {
            inner,
            fail_on: Some(self.fail_on.clone()),
            cancel_on_read: None,
        }))
    }
}

/// Cancels `token` as soon as the first chunk of any file has been read.
pub struct CancellingConnector {
    inner: LocalDirConnector,
    token: CancellationToken,
}

impl CancellingConnector {
    pub fn new(root: PathBuf, token: CancellationToken) -> Self {
        Self {
            inner: LocalDirConnector::new(root),
            token,
        }
    }
}

#[async_trait]
impl RemoteConnector for CancellingConnector {
    async fn connect(&self, endpoint: &Endpoint) -> BridgeResult<Box<dyn RemoteSession>> {
        let inner = self.inner.connect(endpoint).await?;
        Ok(Box::new(WrappedSession {
            inner,
            fail_on: None,
            cancel_on_read: Some(self.token.clone()),
        }))
    }
}

struct WrappedSession {
    inner: Box<dyn RemoteSession>,
    fail_on: Option<String>,
    cancel_on_read: Option<CancellationToken>,
}

impl WrappedSession {
    fn should_fail(&self, path: &str) -> bool {
        self.fail_on
            .as_deref()
            .is_some_and(|suffix| path.ends_with(suffix))
    }
}

#[async_trait]
impl RemoteSession for WrappedSession {
    async fn read_dir(&self, path: &str) -> BridgeResult<Vec<RemoteEntry>> {
        self.inner.read_dir(path).await
    }

    async fn stat(&self, path: &str) -> BridgeResult<RemoteEntry> {
        self.inner.stat(path).await
    }

    async fn open_read(&self, path: &str) -> BridgeResult<Box<dyn RemoteReader>> {
        if self.should_fail(path) {
            return Err(BridgeError::OperationFailed("permission denied".to_string()));
        }
        let inner = self.inner.open_read(path).await?;
        Ok(Box::new(WrappedReader {
            inner,
            cancel: self.cancel_on_read.clone(),
        }))
    }

    async fn mkdir(&self, path: &str) -> BridgeResult<()> {
        self.inner.mkdir(path).await
    }

    async fn put(&self, local: &Path, remote: &str) -> BridgeResult<u64> {
        if self.should_fail(remote) {
            return Err(BridgeError::OperationFailed("quota exceeded".to_string()));
        }
        self.inner.put(local, remote).await
    }

    async fn set_times(&self, path: &str, atime: i64, mtime: i64) -> BridgeResult<()> {
        self.inner.set_times(path, atime, mtime).await
    }

    async fn close(&self) -> BridgeResult<()> {
        self.inner.close().await
    }
}

struct WrappedReader {
    inner: Box<dyn RemoteReader>,
    cancel: Option<CancellationToken>,
}

#[async_trait]
impl RemoteReader for WrappedReader {
    async fn read_chunk(&mut self, max: usize) -> BridgeResult<Option<Bytes>> {
        let chunk = self.inner.read_chunk(max).await?;
        if let Some(token) = &self.cancel {
            token.cancel();
        }
        Ok(chunk)
    }
}
