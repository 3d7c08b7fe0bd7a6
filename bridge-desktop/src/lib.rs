//! # Desktop Bridge Implementations
//!
//! Remote endpoint adapters for desktop hosts (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `LocalDirConnector` treats a local or mounted directory as the remote
//!   server. Useful for NAS mounts and for exercising the pipeline without a
//!   network.
//! - `SftpConnector` speaks SFTP over SSH using `ssh2`. Blocking libssh2
//!   calls run on the blocking thread pool.
//!
//! ## Feature Flags
//!
//! - `sftp`: Enable the SFTP connector (pulls in libssh2)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::LocalDirConnector;
//! use bridge_traits::remote::{Credentials, Endpoint, RemoteConnector};
//!
//! # async fn demo() -> bridge_traits::error::Result<()> {
//! let connector = LocalDirConnector::new("/mnt/share");
//! let endpoint = Endpoint::new("localhost", 22, "relay", Credentials::Password("x".into()));
//! let session = connector.connect(&endpoint).await?;
//! let entries = session.read_dir("/incoming").await?;
//! session.close().await?;
//! # Ok(()) }
//! ```

mod local_dir;

#[cfg(feature = "sftp")]
mod sftp;

pub use local_dir::{LocalDirConnector, LocalDirSession};

#[cfg(feature = "sftp")]
pub use sftp::{SftpConnector, SftpSession};
