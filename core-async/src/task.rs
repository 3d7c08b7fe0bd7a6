//! Task spawning and execution.
//!
//! - `spawn`: runs a future concurrently; the returned `JoinHandle` can be
//!   awaited or dropped to detach.
//! - `spawn_blocking`: runs CPU-bound work (image decode/encode) on the
//!   blocking thread pool.
//!
//! ```rust
//! use core_async::task;
//!
//! async fn example() {
//!     let handle = task::spawn(async { 42 });
//!     assert_eq!(handle.await.unwrap(), 42);
//!
//!     let encoded = task::spawn_blocking(|| vec![0u8; 16]).await.unwrap();
//!     assert_eq!(encoded.len(), 16);
//! }
//! ```

pub use tokio::task::{spawn_blocking, yield_now, JoinError, JoinHandle};

/// Spawns a new asynchronous task on the current runtime.
///
/// The spawned task may run on a different thread. Dropping the returned
/// handle detaches the task; it keeps running to completion.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
