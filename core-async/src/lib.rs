//! Async runtime facade for the image relay workspace.
//!
//! Every `core-*` and `bridge-*` crate reaches the executor through this
//! crate instead of naming Tokio directly. The facade keeps the surface the
//! pipeline needs: spawning (including blocking work for image encoding),
//! timers for the poll loops, cancellation tokens for cooperative stop, and
//! async filesystem access.
//!
//! # Modules
//!
//! - `task`: Task spawning and execution
//! - `time`: Sleep, timeouts and wall-clock helpers
//! - `sync`: Synchronization primitives and `CancellationToken`
//! - `fs` / `io`: Async filesystem and I/O traits
//! - `runtime`: Runtime construction and `block_on`
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::time::{sleep, Duration};
//!
//! async fn poll_until_cancelled(token: CancellationToken) {
//!     loop {
//!         core_async::select! {
//!             _ = token.cancelled() => break,
//!             _ = sleep(Duration::from_millis(100)) => {}
//!         }
//!     }
//! }
//! ```

// Re-export the async entry-point/test macros so downstream crates never need
// direct Tokio dependencies.
pub use core_async_macros::{main, test};

pub mod fs;
pub mod io;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
pub use tokio::select;
