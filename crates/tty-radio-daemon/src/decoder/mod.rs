//! External decoder process control.
//!
//! The session only talks to [`DecoderLauncher`] and [`DecoderHandle`]; the
//! mpg123 implementation lives in [`mpg123`], and tests use an in-process
//! fake.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

use crate::metadata::MetadataSnapshot;
use tty_radio_proto::volume::Volume;

#[cfg(test)]
pub mod fake;
pub mod mpg123;

#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("decoder binary '{0}' not found")]
    BinaryNotFound(String),
    #[error("failed to spawn decoder: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("failed to signal decoder: {0}")]
    Signal(String),
}

/// Outcome of [`DecoderHandle::set_volume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeChange {
    Applied,
    RestartRequired,
}

#[async_trait]
pub trait DecoderLauncher: Send + Sync {
    /// Start a decoder for `url`.  Metadata parsed from its output is
    /// published into `metadata` for as long as the process lives.
    async fn start(
        &self,
        url: &str,
        volume: Volume,
        metadata: Arc<watch::Sender<MetadataSnapshot>>,
    ) -> Result<Box<dyn DecoderHandle>, DecoderError>;
}

/// One running (or suspended) decoder process.
#[async_trait]
pub trait DecoderHandle: Send + Sync {
    /// Non-blocking.  A handle that is paused but still held counts as alive.
    fn is_alive(&mut self) -> bool;

    async fn pause(&mut self) -> Result<(), DecoderError>;

    async fn resume(&mut self) -> Result<(), DecoderError>;

    async fn set_volume(&mut self, volume: Volume) -> VolumeChange;

    /// The process is gone when this returns.  Safe to call more than once.
    async fn terminate(&mut self);

    fn volume(&self) -> Volume;
}
