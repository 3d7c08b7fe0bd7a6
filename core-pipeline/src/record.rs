//! Per-cycle view of one entry in a mirrored tree.

use bridge_traits::remote::{RemoteEntry, RemoteKind};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

impl From<RemoteKind> for FileKind {
    fn from(kind: RemoteKind) -> Self {
        match kind {
            RemoteKind::File => FileKind::File,
            RemoteKind::Directory => FileKind::Directory,
        }
    }
}

/// A file or directory relative to the root of a tree.
///
/// `relative` is always `/`-separated and never starts with a separator.
/// Times are whole seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub relative: String,
    pub kind: FileKind,
    pub size: u64,
    pub mtime: i64,
    pub atime: i64,
}

impl FileRecord {
    pub fn from_remote(relative: String, entry: &RemoteEntry) -> Self {
        Self {
            relative,
            kind: entry.kind.into(),
            size: entry.size,
            mtime: entry.mtime,
            atime: entry.atime,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    /// Two files match when size and whole-second mtime are equal.
    pub fn same_content(&self, other: &FileRecord) -> bool {
        self.is_file() && other.is_file() && self.size == other.size && self.mtime == other.mtime
    }

    /// Location of this record under a local root.
    pub fn local_path(&self, root: &Path) -> PathBuf {
        self.relative
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(root.to_path_buf(), |path, part| path.join(part))
    }
}

/// Join a relative prefix and a child name with `/`.
pub(crate) fn join_relative(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// `/`-separated form of `path` relative to `root`.
pub(crate) fn relative_of(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(relative: &str, size: u64, mtime: i64) -> FileRecord {
        FileRecord {
            relative: relative.to_string(),
            kind: FileKind::File,
            size,
            mtime,
            atime: mtime,
        }
    }

    #[test]
    fn test_same_content_compares_size_and_mtime() {
        let a = file("a.txt", 10, 100);

        assert!(a.same_content(&file("a.txt", 10, 100)));
        assert!(!a.same_content(&file("a.txt", 11, 100)));
        assert!(!a.same_content(&file("a.txt", 10, 101)));
    }

    #[test]
    fn test_directories_never_match() {
        let mut dir = file("sub", 0, 100);
        dir.kind = FileKind::Directory;

        assert!(!dir.same_content(&dir.clone()));
    }

    #[test]
    fn test_local_path_splits_on_slash() {
        let record = file("2024/05/a.png", 1, 1);
        assert_eq!(
            record.local_path(Path::new("/data")),
            Path::new("/data").join("2024").join("05").join("a.png")
        );
    }

    #[test]
    fn test_relative_of() {
        let root = Path::new("/data/mirror");
        assert_eq!(
            relative_of(root, &root.join("sub").join("b.txt")).as_deref(),
            Some("sub/b.txt")
        );
        assert_eq!(relative_of(root, root), None);
        assert_eq!(relative_of(root, Path::new("/elsewhere")), None);
    }

    #[test]
    fn test_join_relative() {
        assert_eq!(join_relative("", "a"), "a");
        assert_eq!(join_relative("a/b", "c"), "a/b/c");
    }
}
