//! Local directory acting as a remote endpoint.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    remote::{Endpoint, RemoteConnector, RemoteEntry, RemoteKind, RemoteReader, RemoteSession},
};
use bytes::Bytes;
use core_async::fs;
use core_async::io::AsyncReadExt;
use filetime::FileTime;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Connector that serves remote paths out of a local directory.
///
/// Remote path `/a/b.txt` maps to `<root>/a/b.txt`. The endpoint's host and
/// credentials are ignored; connecting fails with
/// [`BridgeError::Connection`] when the root is missing, the same way an
/// unreachable server would.
#[derive(Debug, Clone)]
pub struct LocalDirConnector {
    root: PathBuf,
}

impl LocalDirConnector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl RemoteConnector for LocalDirConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn RemoteSession>> {
        match fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => {
                debug!(
                    root = ?self.root,
                    target = %endpoint.display_target(),
                    "Opened local directory session"
                );
                Ok(Box::new(LocalDirSession {
                    root: self.root.clone(),
                }))
            }
            Ok(_) => Err(BridgeError::Connection(format!(
                "{} is not a directory",
                self.root.display()
            ))),
            Err(e) => Err(BridgeError::Connection(format!(
                "{}: {}",
                self.root.display(),
                e
            ))),
        }
    }
}

/// Session over a [`LocalDirConnector`] root.
#[derive(Debug)]
pub struct LocalDirSession {
    root: PathBuf,
}

impl LocalDirSession {
    fn resolve(&self, remote: &str) -> Result<PathBuf> {
        let relative = Path::new(remote.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(BridgeError::OperationFailed(format!(
                "path escapes endpoint root: {remote}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

fn map_io(remote: &str, err: std::io::Error) -> BridgeError {
    if err.kind() == std::io::ErrorKind::NotFound {
        BridgeError::NotFound(remote.to_string())
    } else {
        BridgeError::Io(err)
    }
}

fn entry_from_metadata(name: String, meta: &std::fs::Metadata) -> RemoteEntry {
    RemoteEntry {
        name,
        kind: if meta.is_dir() {
            RemoteKind::Directory
        } else {
            RemoteKind::File
        },
        size: if meta.is_dir() { 0 } else { meta.len() },
        mtime: FileTime::from_last_modification_time(meta).unix_seconds(),
        atime: FileTime::from_last_access_time(meta).unix_seconds(),
    }
}

#[async_trait]
impl RemoteSession for LocalDirSession {
    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let dir = self.resolve(path)?;
        let mut reader = fs::read_dir(&dir).await.map_err(|e| map_io(path, e))?;
        let mut entries = Vec::new();

        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            // Dangling symlinks and entries that vanish mid-listing are left out.
            match fs::metadata(entry.path()).await {
                Ok(meta) => entries.push(entry_from_metadata(name, &meta)),
                Err(err) => debug!(path, entry = %name, error = %err, "Skipping unreadable entry"),
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn stat(&self, path: &str) -> Result<RemoteEntry> {
        let target = self.resolve(path)?;
        let meta = fs::metadata(&target).await.map_err(|e| map_io(path, e))?;
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(entry_from_metadata(name, &meta))
    }

    async fn open_read(&self, path: &str) -> Result<Box<dyn RemoteReader>> {
        let target = self.resolve(path)?;
        let file = fs::File::open(&target).await.map_err(|e| map_io(path, e))?;
        Ok(Box::new(LocalDirReader { file }))
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        fs::create_dir(&target).await.map_err(|e| map_io(path, e))?;
        debug!(path, "Created directory");
        Ok(())
    }

    async fn put(&self, local: &Path, remote: &str) -> Result<u64> {
        let target = self.resolve(remote)?;
        let written = fs::copy(local, &target)
            .await
            .map_err(|e| map_io(remote, e))?;
        debug!(local = ?local, remote, bytes = written, "Uploaded file");
        Ok(written)
    }

    async fn set_times(&self, path: &str, atime: i64, mtime: i64) -> Result<()> {
        let target = self.resolve(path)?;
        filetime::set_file_times(
            &target,
            FileTime::from_unix_time(atime, 0),
            FileTime::from_unix_time(mtime, 0),
        )
        .map_err(|e| map_io(path, e))
    }

    async fn close(&self) -> Result<()> {
        debug!(root = ?self.root, "Closed local directory session");
        Ok(())
    }
}

struct LocalDirReader {
    file: fs::File,
}

#[async_trait]
impl RemoteReader for LocalDirReader {
    async fn read_chunk(&mut self, max: usize) -> Result<Option<Bytes>> {
        let mut buf = vec![0u8; max];
        let read = self.file.read(&mut buf).await?;
        if read == 0 {
            return Ok(None);
        }
        buf.truncate(read);
        Ok(Some(Bytes::from(buf)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::remote::Credentials;
    use tempfile::TempDir;

    fn endpoint() -> Endpoint {
        Endpoint::new(
            "localhost",
            22,
            "relay",
            Credentials::Password("secret".to_string()),
        )
    }

    async fn session(dir: &TempDir) -> Box<dyn RemoteSession> {
        LocalDirConnector::new(dir.path())
            .connect(&endpoint())
            .await
            .unwrap()
    }

    #[core_async::test]
    async fn test_connect_missing_root_is_connection_error() {
        let dir = TempDir::new().unwrap();
        let connector = LocalDirConnector::new(dir.path().join("absent"));

        let err = connector.connect(&endpoint()).await.err().unwrap();
        assert!(err.is_connection());
    }

    #[core_async::test]
    async fn test_read_dir_lists_sorted_entries() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.txt"), b"bb").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"0123456789").unwrap();
        filetime::set_file_mtime(dir.path().join("a.txt"), FileTime::from_unix_time(100, 0))
            .unwrap();

        let session = session(&dir).await;
        let entries = session.read_dir("/").await.unwrap();

        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
        assert_eq!(entries[0].size, 10);
        assert_eq!(entries[0].mtime, 100);
        assert!(entries[2].is_dir());
    }

    #[cfg(unix)]
    #[core_async::test]
    async fn test_read_dir_skips_dangling_symlink() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"alpha").unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("broken")).unwrap();

        let entries = session(&dir).await.read_dir("/").await.unwrap();

        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt"]);
    }

    #[core_async::test]
    async fn test_stat_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir).await;

        assert!(matches!(
            session.stat("/nope").await,
            Err(BridgeError::NotFound(_))
        ));
        assert!(!session.exists("/nope").await.unwrap());
    }

    #[core_async::test]
    async fn test_read_chunks_until_eof() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("data.bin"), vec![7u8; 10]).unwrap();
        let session = session(&dir).await;

        let mut reader = session.open_read("/data.bin").await.unwrap();
        let mut total = 0;
        while let Some(chunk) = reader.read_chunk(4).await.unwrap() {
            assert!(chunk.len() <= 4);
            total += chunk.len();
        }
        assert_eq!(total, 10);
    }

    #[core_async::test]
    async fn test_put_and_set_times() {
        let dir = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let source = local.path().join("photo.jpg");
        std::fs::write(&source, b"jpeg-bytes").unwrap();
        let session = session(&dir).await;

        session.mkdir("/out").await.unwrap();
        let written = session.put(&source, "/out/photo.jpg").await.unwrap();
        session.set_times("/out/photo.jpg", 50, 200).await.unwrap();

        assert_eq!(written, 10);
        let entry = session.stat("/out/photo.jpg").await.unwrap();
        assert_eq!(entry.mtime, 200);
        assert_eq!(entry.size, 10);
    }

    #[core_async::test]
    async fn test_parent_dir_components_rejected() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir).await;

        assert!(matches!(
            session.read_dir("/../etc").await,
            Err(BridgeError::OperationFailed(_))
        ));
    }
}
