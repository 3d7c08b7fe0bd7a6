//! Async I/O traits and utilities.
//!
//! ```rust
//! use core_async::io::{AsyncWrite, AsyncWriteExt};
//!
//! async fn write_chunk<W: AsyncWrite + Unpin>(mut writer: W, chunk: &[u8]) -> std::io::Result<()> {
//!     writer.write_all(chunk).await?;
//!     writer.flush().await
//! }
//! ```

pub use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite,
    AsyncWriteExt, BufReader, BufWriter, ReadBuf,
};
