//! Remote Endpoint Abstractions
//!
//! Capability traits for the file server the pipeline mirrors from and
//! publishes to. The core never speaks a transfer protocol itself; it asks a
//! [`RemoteConnector`] for a [`RemoteSession`] once per cycle and drives
//! listing, chunked reads and uploads through it.
//!
//! Remote paths are plain `/`-separated strings regardless of host platform.
//! The [`path`] helpers join and split them.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::{error::Result, platform::PlatformSendSync};

/// How the session authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Password(String),
    KeyFile(PathBuf),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password(_) => f.write_str("Password(<redacted>)"),
            Credentials::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
        }
    }
}

/// Connection parameters for one remote server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub credentials: Credentials,
}

impl Endpoint {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            credentials,
        }
    }

    /// `user@host:port`, safe to log.
    pub fn display_target(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

/// Kind of a remote directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteKind {
    File,
    Directory,
}

/// One entry returned by [`RemoteSession::read_dir`] or [`RemoteSession::stat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Final path component.
    pub name: String,
    pub kind: RemoteKind,
    pub size: u64,
    /// Modification time, seconds since the Unix epoch.
    pub mtime: i64,
    /// Access time, seconds since the Unix epoch.
    pub atime: i64,
}

impl RemoteEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == RemoteKind::Directory
    }
}

/// Opens sessions against an [`Endpoint`].
///
/// Connection failures must surface as
/// [`BridgeError::Connection`](crate::BridgeError::Connection) so callers can
/// tell them apart from per-item failures.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::remote::{Endpoint, RemoteConnector};
///
/// async fn probe(connector: &dyn RemoteConnector, endpoint: &Endpoint) -> Result<usize> {
///     let session = connector.connect(endpoint).await?;
///     let entries = session.read_dir("/incoming").await;
///     session.close().await?;
///     Ok(entries?.len())
/// }
/// ```
#[async_trait]
pub trait RemoteConnector: PlatformSendSync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn RemoteSession>>;
}

/// An open session on the remote server.
///
/// A session is used by one stage cycle at a time and closed at the end of
/// that cycle.
#[async_trait]
pub trait RemoteSession: PlatformSendSync {
    /// List the direct children of `path`, excluding `.` and `..`.
    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>>;

    /// Metadata for `path`.
    ///
    /// Returns [`BridgeError::NotFound`](crate::BridgeError::NotFound) when
    /// nothing exists there.
    async fn stat(&self, path: &str) -> Result<RemoteEntry>;

    /// Open a file for chunked reading.
    async fn open_read(&self, path: &str) -> Result<Box<dyn RemoteReader>>;

    /// Create a single directory. The parent must already exist.
    async fn mkdir(&self, path: &str) -> Result<()>;

    /// Upload the local file at `local` to `remote`, returning bytes written.
    async fn put(&self, local: &Path, remote: &str) -> Result<u64>;

    /// Set access and modification time (seconds since the epoch).
    async fn set_times(&self, path: &str, atime: i64, mtime: i64) -> Result<()>;

    /// Close the session.
    async fn close(&self) -> Result<()>;

    /// `true` if `path` exists. Errors other than not-found propagate.
    async fn exists(&self, path: &str) -> Result<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(crate::BridgeError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// Sequential reader over a remote file.
#[async_trait]
pub trait RemoteReader: Send {
    /// Read up to `max` bytes. `None` signals end of file.
    async fn read_chunk(&mut self, max: usize) -> Result<Option<Bytes>>;
}

/// Helpers for `/`-separated remote paths.
pub mod path {
    /// Join `base` and a relative path, collapsing duplicate separators.
    pub fn join(base: &str, relative: &str) -> String {
        let relative = relative.trim_start_matches('/');
        if relative.is_empty() {
            return normalize(base);
        }
        let base = base.trim_end_matches('/');
        if base.is_empty() {
            format!("/{relative}")
        } else {
            format!("{base}/{relative}")
        }
    }

    /// Parent directory of `path`, or `None` for the root or a bare name.
    pub fn parent(path: &str) -> Option<&str> {
        let trimmed = path.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(0) if trimmed.len() > 1 => Some("/"),
            Some(0) | None => None,
            Some(idx) => Some(&trimmed[..idx]),
        }
    }

    /// Strip trailing separators, keeping a lone `/`.
    pub fn normalize(path: &str) -> String {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() && path.starts_with('/') {
            "/".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BridgeError;
    use mockall::mock;

    mock! {
        Session {}

        #[async_trait]
        impl RemoteSession for Session {
            async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>>;
            async fn stat(&self, path: &str) -> Result<RemoteEntry>;
            async fn open_read(&self, path: &str) -> Result<Box<dyn RemoteReader>>;
            async fn mkdir(&self, path: &str) -> Result<()>;
            async fn put(&self, local: &Path, remote: &str) -> Result<u64>;
            async fn set_times(&self, path: &str, atime: i64, mtime: i64) -> Result<()>;
            async fn close(&self) -> Result<()>;
        }
    }

    fn dir_entry(name: &str) -> RemoteEntry {
        RemoteEntry {
            name: name.to_string(),
            kind: RemoteKind::Directory,
            size: 0,
            mtime: 100,
            atime: 100,
        }
    }

    #[core_async::test]
    async fn test_exists_maps_not_found_to_false() {
        let mut session = MockSession::new();
        session
            .expect_stat()
            .returning(|path| Err(BridgeError::NotFound(path.to_string())));

        assert!(!session.exists("/missing").await.unwrap());
    }

    #[core_async::test]
    async fn test_exists_true_for_existing_entry() {
        let mut session = MockSession::new();
        session.expect_stat().returning(|_| Ok(dir_entry("photos")));

        assert!(session.exists("/photos").await.unwrap());
    }

    #[core_async::test]
    async fn test_exists_propagates_connection_errors() {
        let mut session = MockSession::new();
        session
            .expect_stat()
            .returning(|_| Err(BridgeError::Connection("reset by peer".to_string())));

        let err = session.exists("/photos").await.unwrap_err();
        assert!(err.is_connection());
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::Password("hunter2".to_string());
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("hunter2"));

        let endpoint = Endpoint::new("files.local", 22, "relay", creds);
        let rendered = format!("{:?}", endpoint);
        assert!(!rendered.contains("hunter2"));
        assert_eq!(endpoint.display_target(), "relay@files.local:22");
    }

    #[test]
    fn test_path_join() {
        assert_eq!(path::join("/incoming", "a.txt"), "/incoming/a.txt");
        assert_eq!(path::join("/incoming/", "/sub/b.txt"), "/incoming/sub/b.txt");
        assert_eq!(path::join("/", "a.txt"), "/a.txt");
        assert_eq!(path::join("/incoming/", ""), "/incoming");
    }

    #[test]
    fn test_path_parent() {
        assert_eq!(path::parent("/a/b/c.jpg"), Some("/a/b"));
        assert_eq!(path::parent("/a"), Some("/"));
        assert_eq!(path::parent("/"), None);
        assert_eq!(path::parent("relative"), None);
        assert_eq!(path::parent("out/photo.jpg"), Some("out"));
    }

    #[test]
    fn test_path_normalize() {
        assert_eq!(path::normalize("/data/"), "/data");
        assert_eq!(path::normalize("///"), "/");
        assert_eq!(path::normalize("data"), "data");
    }
}
