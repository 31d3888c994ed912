//! Host audio output seam.
//!
//! The playback engine only talks to these traits. A backend opens one
//! output context; the context owns the device clock and hands out one
//! output node per played buffer.

use super::buffer::DecodedAudioBuffer;
use super::error::AudioError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Suspended,
    Closed,
}

pub trait AudioBackend: Send + Sync + 'static {
    type Context: OutputContext;

    /// Create a new output context. Failures surface as `OutputUnavailable`.
    fn open(&self) -> Result<Self::Context, AudioError>;
}

pub trait OutputContext: Send + Sync + 'static {
    type Node: OutputNode;

    fn state(&self) -> ContextState;

    fn resume(&self) -> Result<(), AudioError>;

    fn suspend(&self) -> Result<(), AudioError>;

    /// Output clock in seconds. Only advances while the context is running.
    fn current_time(&self) -> f64;

    /// Bind `buffer` to a fresh node and start it immediately.
    fn start(&self, buffer: &DecodedAudioBuffer) -> Result<Self::Node, AudioError>;

    /// Release the device. The context cannot be resumed afterwards.
    fn close(&self);
}

pub trait OutputNode: Send + 'static {
    /// Halt output. Returns `AudioError::AlreadyStopped` when the node had
    /// already finished or been stopped.
    fn stop(&mut self) -> Result<(), AudioError>;
}
