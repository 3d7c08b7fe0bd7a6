//! Tree enumeration for both sides of a stage.
//!
//! [`RemoteListing`] walks a remote directory depth-first on top of
//! [`RemoteSession::read_dir`]; [`LocalListing`] walks a local directory
//! with `walkdir`. Both produce [`FileRecord`]s in a deterministic order.

use crate::error::{PipelineError, Result};
use crate::record::{join_relative, relative_of, FileKind, FileRecord};
use bridge_traits::remote::{path as remote_path, RemoteEntry, RemoteSession};
use core_async::sync::CancellationToken;
use core_async::task;
use filetime::FileTime;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A directory whose listing failed. Its subtree is absent from the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingFailure {
    /// Relative path of the directory; empty for the root.
    pub path: String,
    pub message: String,
}

impl ListingFailure {
    /// The failure as an error naming the absolute remote directory.
    pub fn into_error(self, root: &str) -> PipelineError {
        PipelineError::Listing {
            path: remote_path::join(root, &self.path),
            message: self.message,
        }
    }
}

/// Result of a recursive remote listing.
#[derive(Debug, Clone, Default)]
pub struct RemoteTree {
    /// Entries in pre-order: every directory precedes its descendants.
    pub records: Vec<FileRecord>,
    pub failures: Vec<ListingFailure>,
}

impl RemoteTree {
    pub fn files(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.iter().filter(|r| r.is_file())
    }
}

pub struct RemoteListing<'a> {
    session: &'a dyn RemoteSession,
}

impl<'a> RemoteListing<'a> {
    pub fn new(session: &'a dyn RemoteSession) -> Self {
        Self { session }
    }

    /// List everything under `root`.
    ///
    /// Directory entries keep the order the server returned them in. Returns
    /// [`PipelineError::Cancelled`] if `token` fires mid-walk.
    pub async fn list(&self, root: &str, token: &CancellationToken) -> Result<RemoteTree> {
        let mut tree = RemoteTree::default();
        let mut stack: Vec<(String, std::vec::IntoIter<RemoteEntry>)> = Vec::new();

        match self.session.read_dir(root).await {
            Ok(entries) => stack.push((String::new(), entries.into_iter())),
            Err(err) => tree.failures.push(ListingFailure {
                path: String::new(),
                message: err.to_string(),
            }),
        }

        loop {
            if token.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let Some((prefix, entries)) = stack.last_mut() else {
                break;
            };
            let Some(entry) = entries.next() else {
                stack.pop();
                continue;
            };
            if entry.name.is_empty() || entry.name == "." || entry.name == ".." {
                continue;
            }

            let relative = join_relative(prefix, &entry.name);
            tree.records.push(FileRecord::from_remote(relative.clone(), &entry));

            if entry.is_dir() {
                let full = remote_path::join(root, &relative);
                match self.session.read_dir(&full).await {
                    Ok(children) => stack.push((relative, children.into_iter())),
                    Err(err) => {
                        warn!(path = %relative, error = %err, "Skipping unreadable remote directory");
                        tree.failures.push(ListingFailure {
                            path: relative,
                            message: err.to_string(),
                        });
                    }
                }
            }
        }

        debug!(
            root,
            records = tree.records.len(),
            failures = tree.failures.len(),
            "Listed remote tree"
        );
        Ok(tree)
    }
}

/// Recursive listing of a local directory, sorted by file name at every level.
pub struct LocalListing;

impl LocalListing {
    /// Every entry under `root`, excluding `root` itself.
    ///
    /// A missing root yields an empty listing. Unreadable entries are skipped.
    pub async fn scan(root: &Path) -> Result<Vec<FileRecord>> {
        let root = root.to_path_buf();
        task::spawn_blocking(move || scan_blocking(&root))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))
    }

    /// Only the files under `root`.
    pub async fn files(root: &Path) -> Result<Vec<FileRecord>> {
        Ok(Self::scan(root)
            .await?
            .into_iter()
            .filter(FileRecord::is_file)
            .collect())
    }

    /// `true` as soon as one file exists anywhere under `root`.
    pub async fn has_files(root: &Path) -> bool {
        let root = root.to_path_buf();
        task::spawn_blocking(move || {
            WalkDir::new(&root)
                .min_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .any(|e| e.file_type().is_file())
        })
        .await
        .unwrap_or(false)
    }

    /// Directories under `root`, deepest first. `root` is not included.
    pub async fn directories_bottom_up(root: &Path) -> Result<Vec<PathBuf>> {
        let root = root.to_path_buf();
        task::spawn_blocking(move || {
            WalkDir::new(&root)
                .min_depth(1)
                .contents_first(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_dir())
                .map(|e| e.into_path())
                .collect()
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))
    }

    /// Index records by relative path.
    pub fn index(records: Vec<FileRecord>) -> HashMap<String, FileRecord> {
        records
            .into_iter()
            .map(|r| (r.relative.clone(), r))
            .collect()
    }
}

fn scan_blocking(root: &Path) -> Vec<FileRecord> {
    if !root.is_dir() {
        return Vec::new();
    }

    let mut records = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "Skipping unreadable local entry");
                continue;
            }
        };
        let Some(relative) = relative_of(root, entry.path()) else {
            continue;
        };
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(path = %relative, error = %err, "Skipping local entry without metadata");
                continue;
            }
        };

        let kind = if metadata.is_dir() {
            FileKind::Directory
        } else if metadata.is_file() {
            FileKind::File
        } else {
            continue;
        };

        records.push(FileRecord {
            relative,
            kind,
            size: if kind == FileKind::File { metadata.len() } else { 0 },
            mtime: FileTime::from_last_modification_time(&metadata).unix_seconds(),
            atime: FileTime::from_last_access_time(&metadata).unix_seconds(),
        });
    }
    records
}
