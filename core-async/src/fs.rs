//! Async filesystem helpers re-exported from the underlying runtime.
//!
//! The APIs are kept identical to Tokio's so downstream crates get the
//! familiar surface without depending on Tokio directly.

pub use tokio::fs::{
    copy, create_dir, create_dir_all, metadata, read, read_dir, remove_dir, remove_dir_all,
    remove_file, rename, symlink_metadata, write, DirEntry, File, OpenOptions, ReadDir,
};
