use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::buffer::DecodedAudioBuffer;
use super::error::AudioError;
use super::output::{AudioBackend, ContextState, OutputContext, OutputNode};

/// In-process backend with a hand-driven clock.
///
/// Nothing is rendered. Clones share the same clock and bookkeeping, so a
/// test can keep one handle while the engine owns another.
#[derive(Clone, Default)]
pub struct MockBackend {
    shared: Arc<MockShared>,
}

#[derive(Default)]
struct MockShared {
    clock: Mutex<f64>,
    fail_open: AtomicBool,
    fail_start: AtomicBool,
    start_suspended: AtomicBool,
    opened: AtomicUsize,
    resumed: AtomicUsize,
    closed: AtomicUsize,
    nodes: Mutex<Vec<NodeRecord>>,
}

#[derive(Clone)]
struct NodeRecord {
    frames: usize,
    stopped: Arc<AtomicBool>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose `open` always fails, like a platform denying audio.
    pub fn unavailable() -> Self {
        let backend = Self::default();
        backend.shared.fail_open.store(true, Ordering::SeqCst);
        backend
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.fail_open.store(unavailable, Ordering::SeqCst);
    }

    /// Starting a node fails the way a device-rate conversion can.
    pub fn set_start_failure(&self, fail: bool) {
        self.shared.fail_start.store(fail, Ordering::SeqCst);
    }

    /// New contexts start suspended and must be resumed before use.
    pub fn start_suspended(&self, suspended: bool) {
        self.shared.start_suspended.store(suspended, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: f64) {
        *self.shared.clock.lock().unwrap_or_else(PoisonError::into_inner) += seconds;
    }

    pub fn now(&self) -> f64 {
        *self.shared.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contexts_opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    pub fn contexts_closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn resumes(&self) -> usize {
        self.shared.resumed.load(Ordering::SeqCst)
    }

    pub fn nodes_started(&self) -> usize {
        self.nodes().len()
    }

    /// Frame counts of nodes that are started and not yet stopped.
    pub fn audible(&self) -> Vec<usize> {
        self.nodes()
            .iter()
            .filter(|n| !n.stopped.load(Ordering::SeqCst))
            .map(|n| n.frames)
            .collect()
    }

    fn nodes(&self) -> Vec<NodeRecord> {
        self.shared
            .nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AudioBackend for MockBackend {
    type Context = MockContext;

    fn open(&self) -> Result<MockContext, AudioError> {
        if self.shared.fail_open.load(Ordering::SeqCst) {
            return Err(AudioError::unavailable("mock output denied"));
        }
        self.shared.opened.fetch_add(1, Ordering::SeqCst);

        let state = if self.shared.start_suspended.load(Ordering::SeqCst) {
            ContextState::Suspended
        } else {
            ContextState::Running
        };
        Ok(MockContext {
            shared: Arc::clone(&self.shared),
            state: Mutex::new(state),
        })
    }
}

pub struct MockContext {
    shared: Arc<MockShared>,
    state: Mutex<ContextState>,
}

impl MockContext {
    fn set_state(&self, next: ContextState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

impl OutputContext for MockContext {
    type Node = MockNode;

    fn state(&self) -> ContextState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resume(&self) -> Result<(), AudioError> {
        match self.state() {
            ContextState::Closed => Err(AudioError::unavailable("mock context closed")),
            ContextState::Running => Ok(()),
            ContextState::Suspended => {
                if self.shared.fail_open.load(Ordering::SeqCst) {
                    return Err(AudioError::unavailable("mock output denied resume"));
                }
                self.shared.resumed.fetch_add(1, Ordering::SeqCst);
                self.set_state(ContextState::Running);
                Ok(())
            }
        }
    }

    fn suspend(&self) -> Result<(), AudioError> {
        match self.state() {
            ContextState::Closed => Err(AudioError::unavailable("mock context closed")),
            _ => {
                self.set_state(ContextState::Suspended);
                Ok(())
            }
        }
    }

    fn current_time(&self) -> f64 {
        *self.shared.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(&self, buffer: &DecodedAudioBuffer) -> Result<MockNode, AudioError> {
        if self.state() == ContextState::Closed {
            return Err(AudioError::unavailable("mock context closed"));
        }
        if self.shared.fail_start.load(Ordering::SeqCst) {
            return Err(AudioError::Resample("mock resampler rejected buffer".to_string()));
        }
        let stopped = Arc::new(AtomicBool::new(false));
        self.shared
            .nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(NodeRecord {
                frames: buffer.frame_count(),
                stopped: Arc::clone(&stopped),
            });
        Ok(MockNode { stopped })
    }

    fn close(&self) {
        if self.state() != ContextState::Closed {
            self.set_state(ContextState::Closed);
            self.shared.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub struct MockNode {
    stopped: Arc<AtomicBool>,
}

impl OutputNode for MockNode {
    fn stop(&mut self) -> Result<(), AudioError> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Err(AudioError::AlreadyStopped);
        }
        Ok(())
    }
}
