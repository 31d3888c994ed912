use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::buffer::DecodedAudioBuffer;
use super::error::AudioError;
use super::output::{AudioBackend, ContextState, OutputContext, OutputNode};

/// Roughly one display frame at 60 Hz.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy)]
pub struct PlayerConfig {
    pub poll_interval: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
}

/// What the display layer observes: transport state plus position and
/// duration in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub position: f64,
    pub duration: f64,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            state: PlaybackState::Stopped,
            position: 0.0,
            duration: 0.0,
        }
    }
}

type NodeOf<B> = <<B as AudioBackend>::Context as OutputContext>::Node;

struct PlaybackSession<N> {
    id: u64,
    node: N,
    poll: CancellationToken,
}

struct Sessions<N> {
    active: Option<PlaybackSession<N>>,
    last_id: u64,
}

/// Plays decoded buffers one at a time and reports transport state.
///
/// The engine owns a single output context, opened on the first `play` and
/// kept for its whole lifetime. Each `play` gets its own output node and
/// position poll; starting a new one always tears the previous one down
/// first. Must be driven from inside a Tokio runtime.
pub struct PlaybackEngine<B: AudioBackend> {
    backend: B,
    config: PlayerConfig,
    context: Option<Arc<B::Context>>,
    sessions: Arc<Mutex<Sessions<NodeOf<B>>>>,
    status: Arc<watch::Sender<PlaybackStatus>>,
}

impl<B: AudioBackend> PlaybackEngine<B> {
    pub fn new(backend: B, config: PlayerConfig) -> Self {
        let (status, _) = watch::channel(PlaybackStatus::default());
        Self {
            backend,
            config,
            context: None,
            sessions: Arc::new(Mutex::new(Sessions {
                active: None,
                last_id: 0,
            })),
            status: Arc::new(status),
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> PlaybackState {
        self.status().state
    }

    pub fn position(&self) -> f64 {
        self.status().position
    }

    pub fn duration(&self) -> f64 {
        self.status().duration
    }

    /// Watch transport changes. Position updates arrive at the poll cadence.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.subscribe()
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    /// Start playing `buffer`, replacing whatever is playing.
    ///
    /// On error the engine is left `Stopped` and nothing is audible. Every
    /// output-side failure, including resampling for the device, surfaces as
    /// `AudioError::OutputUnavailable`.
    pub fn play(&mut self, buffer: DecodedAudioBuffer) -> Result<(), AudioError> {
        self.stop();

        let context = self.acquire_context()?;
        let node = context.start(&buffer).map_err(as_unavailable)?;

        let duration = buffer.duration();
        let token = CancellationToken::new();

        let mut sessions = lock(&self.sessions);
        sessions.last_id += 1;
        let id = sessions.last_id;

        self.status.send_replace(PlaybackStatus {
            state: PlaybackState::Playing,
            position: 0.0,
            duration,
        });
        let zero_point = context.current_time();

        sessions.active = Some(PlaybackSession {
            id,
            node,
            poll: token.clone(),
        });
        drop(sessions);

        debug!(session = id, duration, frames = buffer.frame_count(), "Playback started");

        tokio::spawn(poll_position(PositionPoll {
            id,
            context,
            sessions: Arc::clone(&self.sessions),
            status: Arc::clone(&self.status),
            token,
            period: self.config.poll_interval,
            zero_point,
            duration,
        }));

        Ok(())
    }

    /// Halt output and reset the position. Safe to call in any state.
    pub fn stop(&mut self) {
        let mut sessions = lock(&self.sessions);
        if let Some(session) = sessions.active.take() {
            end_session(session);
            debug!("Playback stopped");
        }
        self.status.send_modify(|status| {
            status.state = PlaybackState::Stopped;
            status.position = 0.0;
        });
    }

    /// Stop playback and release the output context.
    pub fn shutdown(mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.stop();
        if let Some(context) = self.context.take() {
            context.close();
            info!("Audio output context released");
        }
    }

    fn acquire_context(&mut self) -> Result<Arc<B::Context>, AudioError> {
        if let Some(context) = &self.context {
            match context.state() {
                ContextState::Running => return Ok(Arc::clone(context)),
                ContextState::Suspended => {
                    context.resume().map_err(as_unavailable)?;
                    return Ok(Arc::clone(context));
                }
                ContextState::Closed => {
                    debug!("Output context was closed, reopening");
                    self.context = None;
                }
            }
        }

        let context = Arc::new(self.backend.open().map_err(as_unavailable)?);
        if context.state() == ContextState::Suspended {
            context.resume().map_err(as_unavailable)?;
        }
        info!("Audio output context opened");

        self.context = Some(Arc::clone(&context));
        Ok(context)
    }
}

impl<B: AudioBackend> Drop for PlaybackEngine<B> {
    fn drop(&mut self) {
        self.release();
    }
}

struct PositionPoll<C: OutputContext> {
    id: u64,
    context: Arc<C>,
    sessions: Arc<Mutex<Sessions<C::Node>>>,
    status: Arc<watch::Sender<PlaybackStatus>>,
    token: CancellationToken,
    period: Duration,
    zero_point: f64,
    duration: f64,
}

async fn poll_position<C: OutputContext>(poll: PositionPoll<C>) {
    let mut ticker = interval(poll.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = poll.token.cancelled() => return,
            _ = ticker.tick() => {}
        }

        // Publishing happens under the session lock, so a stop() that has
        // returned can never be followed by a stale position.
        let mut sessions = lock(&poll.sessions);
        let current = matches!(&sessions.active, Some(s) if s.id == poll.id);
        if !current || poll.token.is_cancelled() {
            return;
        }

        let elapsed = (poll.context.current_time() - poll.zero_point).max(0.0);
        if elapsed >= poll.duration {
            if let Some(session) = sessions.active.take() {
                end_session(session);
            }
            poll.status.send_replace(PlaybackStatus {
                state: PlaybackState::Stopped,
                position: poll.duration,
                duration: poll.duration,
            });
            debug!(session = poll.id, "Playback reached end of buffer");
            return;
        }

        poll.status.send_if_modified(|status| {
            if elapsed > status.position {
                status.position = elapsed;
                true
            } else {
                false
            }
        });
    }
}

fn end_session<N: OutputNode>(mut session: PlaybackSession<N>) {
    session.poll.cancel();
    if let Err(e) = session.node.stop() {
        trace!(session = session.id, "Ignoring stop on finished node: {}", e);
    }
}

fn as_unavailable(err: AudioError) -> AudioError {
    match err {
        AudioError::OutputUnavailable(_) => err,
        other => AudioError::unavailable(other.to_string()),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
