//! SFTP endpoint over `ssh2`.
//!
//! libssh2 is blocking, so every call is shipped to the blocking pool with
//! `core_async::task::spawn_blocking`. The session and its SFTP channel sit
//! behind one mutex; a session is only ever driven by a single stage cycle.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    remote::{
        Credentials, Endpoint, RemoteConnector, RemoteEntry, RemoteKind, RemoteReader,
        RemoteSession,
    },
};
use bytes::Bytes;
use core_async::task;
use ssh2::{ErrorCode, FileStat, Session, Sftp};
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// libssh2's `LIBSSH2_FX_NO_SUCH_FILE`.
const FX_NO_SUCH_FILE: i32 = 2;

/// Connector for SFTP servers.
#[derive(Debug, Clone)]
pub struct SftpConnector {
    connect_timeout: Duration,
}

impl SftpConnector {
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for SftpConnector {
    fn default() -> Self {
        Self::new()
    }
}

fn connection_error(endpoint: &Endpoint, detail: impl std::fmt::Display) -> BridgeError {
    BridgeError::Connection(format!("{}: {}", endpoint.display_target(), detail))
}

fn open_session(endpoint: &Endpoint, timeout: Duration) -> Result<(Session, Sftp)> {
    let addr = (endpoint.host.as_str(), endpoint.port)
        .to_socket_addrs()
        .map_err(|e| connection_error(endpoint, e))?
        .next()
        .ok_or_else(|| connection_error(endpoint, "host did not resolve"))?;

    let tcp =
        TcpStream::connect_timeout(&addr, timeout).map_err(|e| connection_error(endpoint, e))?;

    let mut session = Session::new().map_err(|e| connection_error(endpoint, e))?;
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|e| connection_error(endpoint, e))?;

    match &endpoint.credentials {
        Credentials::KeyFile(key) => {
            session.userauth_pubkey_file(&endpoint.username, None, key, None)
        }
        Credentials::Password(password) => session.userauth_password(&endpoint.username, password),
    }
    .map_err(|e| connection_error(endpoint, format!("authentication failed: {e}")))?;

    if !session.authenticated() {
        return Err(connection_error(endpoint, "authentication rejected"));
    }

    let sftp = session.sftp().map_err(|e| connection_error(endpoint, e))?;
    Ok((session, sftp))
}

#[async_trait]
impl RemoteConnector for SftpConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn RemoteSession>> {
        let endpoint = endpoint.clone();
        let timeout = self.connect_timeout;
        let target = endpoint.display_target();

        let (session, sftp) = task::spawn_blocking(move || open_session(&endpoint, timeout))
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("connect task failed: {e}")))??;

        info!(target = %target, "SFTP session established");
        Ok(Box::new(SftpSession {
            inner: Arc::new(Mutex::new(Inner { session, sftp })),
        }))
    }
}

struct Inner {
    session: Session,
    sftp: Sftp,
}

/// An authenticated SFTP session.
pub struct SftpSession {
    inner: Arc<Mutex<Inner>>,
}

fn map_ssh(path: &str, err: ssh2::Error) -> BridgeError {
    if err.code() == ErrorCode::SFTP(FX_NO_SUCH_FILE) {
        BridgeError::NotFound(path.to_string())
    } else {
        BridgeError::OperationFailed(format!("{path}: {err}"))
    }
}

fn entry_from_stat(name: String, stat: &FileStat) -> RemoteEntry {
    RemoteEntry {
        name,
        kind: if stat.is_dir() {
            RemoteKind::Directory
        } else {
            RemoteKind::File
        },
        size: stat.size.unwrap_or(0),
        mtime: stat.mtime.unwrap_or(0) as i64,
        atime: stat.atime.unwrap_or(0) as i64,
    }
}

impl SftpSession {
    /// Run `op` against the SFTP channel on the blocking pool.
    async fn with_sftp<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Sftp) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        task::spawn_blocking(move || {
            let guard = inner
                .lock()
                .map_err(|_| BridgeError::OperationFailed("SFTP session poisoned".to_string()))?;
            op(&guard.sftp)
        })
        .await
        .map_err(|e| BridgeError::OperationFailed(format!("SFTP task failed: {e}")))?
    }
}

#[async_trait]
impl RemoteSession for SftpSession {
    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let path = path.to_string();
        self.with_sftp(move |sftp| {
            let listing = sftp
                .readdir(Path::new(&path))
                .map_err(|e| map_ssh(&path, e))?;
            Ok(listing
                .into_iter()
                .filter_map(|(entry_path, stat)| {
                    let name = entry_path.file_name()?.to_string_lossy().into_owned();
                    (name != "." && name != "..").then(|| entry_from_stat(name, &stat))
                })
                .collect())
        })
        .await
    }

    async fn stat(&self, path: &str) -> Result<RemoteEntry> {
        let path = path.to_string();
        self.with_sftp(move |sftp| {
            let stat = sftp.stat(Path::new(&path)).map_err(|e| map_ssh(&path, e))?;
            let name = Path::new(&path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(entry_from_stat(name, &stat))
        })
        .await
    }

    async fn open_read(&self, path: &str) -> Result<Box<dyn RemoteReader>> {
        let owned = path.to_string();
        let file = self
            .with_sftp(move |sftp| sftp.open(Path::new(&owned)).map_err(|e| map_ssh(&owned, e)))
            .await?;
        Ok(Box::new(SftpReader {
            file: Some(file),
            path: path.to_string(),
        }))
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.with_sftp(move |sftp| {
            sftp.mkdir(Path::new(&path), 0o755)
                .map_err(|e| map_ssh(&path, e))?;
            debug!(path = %path, "Created remote directory");
            Ok(())
        })
        .await
    }

    async fn put(&self, local: &Path, remote: &str) -> Result<u64> {
        let local: PathBuf = local.to_path_buf();
        let remote = remote.to_string();
        self.with_sftp(move |sftp| {
            let mut source = std::fs::File::open(&local)?;
            let mut target = sftp
                .create(Path::new(&remote))
                .map_err(|e| map_ssh(&remote, e))?;
            let written = std::io::copy(&mut source, &mut target)?;
            debug!(local = ?local, remote = %remote, bytes = written, "Uploaded file");
            Ok(written)
        })
        .await
    }

    async fn set_times(&self, path: &str, atime: i64, mtime: i64) -> Result<()> {
        let path = path.to_string();
        self.with_sftp(move |sftp| {
            let stat = FileStat {
                size: None,
                uid: None,
                gid: None,
                perm: None,
                atime: Some(atime.max(0) as u64),
                mtime: Some(mtime.max(0) as u64),
            };
            sftp.setstat(Path::new(&path), stat)
                .map_err(|e| map_ssh(&path, e))
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        task::spawn_blocking(move || {
            let guard = inner
                .lock()
                .map_err(|_| BridgeError::OperationFailed("SFTP session poisoned".to_string()))?;
            guard
                .session
                .disconnect(None, "closing", None)
                .map_err(|e| BridgeError::OperationFailed(format!("disconnect failed: {e}")))
        })
        .await
        .map_err(|e| BridgeError::OperationFailed(format!("SFTP task failed: {e}")))?
    }
}

struct SftpReader {
    file: Option<ssh2::File>,
    path: String,
}

#[async_trait]
impl RemoteReader for SftpReader {
    async fn read_chunk(&mut self, max: usize) -> Result<Option<Bytes>> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| BridgeError::OperationFailed(format!("{}: reader closed", self.path)))?;

        let (file, result) = task::spawn_blocking(move || {
            let mut buf = vec![0u8; max];
            let result = file.read(&mut buf).map(|n| {
                buf.truncate(n);
                buf
            });
            (file, result)
        })
        .await
        .map_err(|e| BridgeError::OperationFailed(format!("SFTP task failed: {e}")))?;

        self.file = Some(file);
        let buf = result?;
        if buf.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Bytes::from(buf)))
        }
    }
}
