//! Marker traits that keep bridge trait bounds in one place.
//!
//! Bridge implementations are shared across spawned stage tasks, so every
//! capability must be `Send + Sync`.

/// Marker trait for capabilities shared across tasks.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync {}

/// Marker trait for values moved into spawned tasks.
pub trait PlatformSend: Send {}

impl<T> PlatformSend for T where T: Send {}
