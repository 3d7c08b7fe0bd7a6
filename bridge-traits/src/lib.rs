//! # Host Bridge Traits
//!
//! Capability traits the pipeline core depends on but never implements
//! itself.
//!
//! ## Traits
//!
//! ### Transfer
//! - [`RemoteConnector`](remote::RemoteConnector) - Opens sessions against a remote file server
//! - [`RemoteSession`](remote::RemoteSession) - Listing, chunked reads, uploads, directory creation
//! - [`RemoteReader`](remote::RemoteReader) - Sequential chunk reader over one remote file
//!
//! ### Media
//! - [`ImageCodec`](media::ImageCodec) - Decode, resize, composite and JPEG-encode images
//!
//! ### Utilities
//! - [`LoggerSink`](time::LoggerSink) - Append-only operator activity log
//!
//! ## Host Adapters
//!
//! | Capability | Implementation | Crate |
//! |------------|----------------|-------|
//! | Remote endpoint | `LocalDirConnector` | `bridge-desktop` |
//! | Remote endpoint | `SftpConnector` (feature `sftp`) | `bridge-desktop` |
//! | Image codec | `ImageRsCodec` | `core-media` |
//! | Logger sink | `ConsoleLogger`, `MemoryLogSink` | here, `core-runtime` |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should:
//!
//! - Report unreachable endpoints and refused logins as `BridgeError::Connection`
//! - Report missing paths as `BridgeError::NotFound`
//! - Include the offending path in the message
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so adapters can be shared by the
//! three stage tasks.

pub mod error;
pub mod media;
pub mod platform;
pub mod remote;
pub mod time;

pub use error::BridgeError;

pub use media::{ImageCodec, PixelLayout, Raster};
pub use remote::{
    Credentials, Endpoint, RemoteConnector, RemoteEntry, RemoteKind, RemoteReader, RemoteSession,
};
pub use time::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
