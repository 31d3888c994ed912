use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc as reply;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample, StreamConfig};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::buffer::DecodedAudioBuffer;
use super::error::AudioError;
use super::format::PcmFormat;
use super::output::{AudioBackend, ContextState, OutputContext, OutputNode};
use super::resample::{downmix, resample_mono};

/// Default output device through cpal.
///
/// The device is asked for the narration rate first so buffers can be played
/// untouched. When it refuses, its default config is used and each buffer is
/// resampled once when its node starts.
#[derive(Debug, Clone, Copy)]
pub struct CpalBackend {
    preferred: PcmFormat,
}

impl CpalBackend {
    pub fn new(preferred: PcmFormat) -> Self {
        Self { preferred }
    }
}

impl AudioBackend for CpalBackend {
    type Context = CpalContext;

    fn open(&self) -> Result<CpalContext, AudioError> {
        CpalContext::spawn(self.preferred)
    }
}

struct Voice {
    samples: Arc<[f32]>,
    cursor: usize,
    stopped: Arc<AtomicBool>,
}

struct DeviceShared {
    voices: Mutex<Vec<Voice>>,
    frames_rendered: AtomicU64,
    rate: u32,
    channels: u16,
}

enum ContextCommand {
    Resume(reply::Sender<Result<(), AudioError>>),
    Suspend(reply::Sender<Result<(), AudioError>>),
    Close,
}

/// Running cpal output stream.
///
/// cpal streams cannot cross threads, so the stream lives on its own thread
/// and is driven through a command channel. Sample data and the clock are
/// shared with the render callback.
///
/// Opening, resuming and suspending wait for the audio thread to answer, so
/// they briefly block the calling thread (on the order of a device call).
/// `current_time`, `start` and node stops never touch the audio thread.
pub struct CpalContext {
    shared: Arc<DeviceShared>,
    commands: mpsc::UnboundedSender<ContextCommand>,
    state: Mutex<ContextState>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl CpalContext {
    fn spawn(preferred: PcmFormat) -> Result<Self, AudioError> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = reply::channel();

        let handle = thread::Builder::new()
            .name("lumina-audio-out".to_string())
            .spawn(move || run_output_thread(preferred, cmd_rx, ready_tx))
            .map_err(|e| AudioError::unavailable(format!("failed to spawn audio thread: {}", e)))?;

        let shared = ready_rx
            .recv()
            .map_err(|_| AudioError::unavailable("audio thread exited during start-up"))??;

        Ok(Self {
            shared,
            commands: cmd_tx,
            state: Mutex::new(ContextState::Running),
            thread: Mutex::new(Some(handle)),
        })
    }

    /// Rate the device is actually running at.
    pub fn device_rate(&self) -> u32 {
        self.shared.rate
    }

    pub fn device_channels(&self) -> u16 {
        self.shared.channels
    }

    fn request(
        &self,
        build: impl FnOnce(reply::Sender<Result<(), AudioError>>) -> ContextCommand,
    ) -> Result<(), AudioError> {
        // The trait is synchronous, so the reply is awaited on a std channel;
        // a tokio oneshot cannot be blocked on from a runtime thread.
        let (reply_tx, reply_rx) = reply::channel();
        self.commands
            .send(build(reply_tx))
            .map_err(|_| AudioError::unavailable("audio thread is gone"))?;
        reply_rx
            .recv()
            .map_err(|_| AudioError::unavailable("audio thread dropped the request"))?
    }

    fn set_state(&self, next: ContextState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

impl OutputContext for CpalContext {
    type Node = CpalNode;

    fn state(&self) -> ContextState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resume(&self) -> Result<(), AudioError> {
        match self.state() {
            ContextState::Running => Ok(()),
            ContextState::Closed => Err(AudioError::unavailable("output context is closed")),
            ContextState::Suspended => {
                self.request(ContextCommand::Resume)?;
                self.set_state(ContextState::Running);
                Ok(())
            }
        }
    }

    fn suspend(&self) -> Result<(), AudioError> {
        match self.state() {
            ContextState::Suspended => Ok(()),
            ContextState::Closed => Err(AudioError::unavailable("output context is closed")),
            ContextState::Running => {
                self.request(ContextCommand::Suspend)?;
                self.set_state(ContextState::Suspended);
                Ok(())
            }
        }
    }

    fn current_time(&self) -> f64 {
        self.shared.frames_rendered.load(Ordering::Acquire) as f64 / self.shared.rate as f64
    }

    fn start(&self, buffer: &DecodedAudioBuffer) -> Result<CpalNode, AudioError> {
        if self.state() == ContextState::Closed {
            return Err(AudioError::unavailable("output context is closed"));
        }

        let mono = downmix(buffer.samples(), buffer.channels());
        let samples = if buffer.sample_rate() == self.shared.rate {
            mono
        } else {
            debug!(
                from = buffer.sample_rate(),
                to = self.shared.rate,
                "Resampling narration for device"
            );
            resample_mono(&mono, buffer.sample_rate(), self.shared.rate)?
        };

        let stopped = Arc::new(AtomicBool::new(false));
        self.shared
            .voices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Voice {
                samples: samples.into(),
                cursor: 0,
                stopped: Arc::clone(&stopped),
            });

        Ok(CpalNode { stopped })
    }

    fn close(&self) {
        if self.state() == ContextState::Closed {
            return;
        }
        self.set_state(ContextState::Closed);

        let _ = self.commands.send(ContextCommand::Close);

        if let Some(handle) = self.thread.lock().unwrap_or_else(PoisonError::into_inner).take() {
            if handle.join().is_err() {
                warn!("Audio output thread panicked during close");
            }
        }
    }
}

impl Drop for CpalContext {
    fn drop(&mut self) {
        self.close();
    }
}

/// Handle to one buffer playing on a [`CpalContext`].
pub struct CpalNode {
    stopped: Arc<AtomicBool>,
}

impl OutputNode for CpalNode {
    fn stop(&mut self) -> Result<(), AudioError> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Err(AudioError::AlreadyStopped);
        }
        Ok(())
    }
}

fn run_output_thread(
    preferred: PcmFormat,
    mut commands: mpsc::UnboundedReceiver<ContextCommand>,
    ready: reply::Sender<Result<Arc<DeviceShared>, AudioError>>,
) {
    let (stream, shared) = match open_stream(preferred) {
        Ok(opened) => opened,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if ready.send(Ok(shared)).is_err() {
        return;
    }

    while let Some(cmd) = commands.blocking_recv() {
        match cmd {
            ContextCommand::Resume(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| AudioError::unavailable(format!("failed to resume stream: {}", e)));
                let _ = reply.send(result);
            }
            ContextCommand::Suspend(reply) => {
                let result = stream
                    .pause()
                    .map_err(|e| AudioError::unavailable(format!("failed to suspend stream: {}", e)));
                let _ = reply.send(result);
            }
            ContextCommand::Close => break,
        }
    }

    drop(stream);
    info!("Audio output closed");
}

fn open_stream(preferred: PcmFormat) -> Result<(cpal::Stream, Arc<DeviceShared>), AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::unavailable("no output device available"))?;

    info!("Audio Output Device: {}", device.name().unwrap_or_default());

    let config = select_config(&device, preferred)?;
    let sample_format = config.sample_format();
    let stream_config: StreamConfig = config.into();

    info!(
        "Audio Output Config: Rate={}Hz, Channels={}, Format={:?}",
        stream_config.sample_rate.0, stream_config.channels, sample_format
    );

    let shared = Arc::new(DeviceShared {
        voices: Mutex::new(Vec::new()),
        frames_rendered: AtomicU64::new(0),
        rate: stream_config.sample_rate.0,
        channels: stream_config.channels,
    });

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, Arc::clone(&shared))?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, Arc::clone(&shared))?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, Arc::clone(&shared))?,
        other => {
            return Err(AudioError::unavailable(format!(
                "unsupported sample format: {:?}",
                other
            )))
        }
    };

    stream
        .play()
        .map_err(|e| AudioError::unavailable(format!("failed to start stream: {}", e)))?;

    Ok((stream, shared))
}

fn select_config(
    device: &cpal::Device,
    preferred: PcmFormat,
) -> Result<cpal::SupportedStreamConfig, AudioError> {
    let rate = preferred.sample_rate;

    // Prefer a range matching both rate and channel count, then rate alone.
    if let Ok(ranges) = device.supported_output_configs() {
        let ranges: Vec<_> = ranges
            .filter(|r| r.min_sample_rate().0 <= rate && r.max_sample_rate().0 >= rate)
            .collect();
        let chosen = ranges
            .iter()
            .find(|r| r.channels() == preferred.channels)
            .or_else(|| ranges.first());
        if let Some(range) = chosen {
            return Ok(range.clone().with_sample_rate(cpal::SampleRate(rate)));
        }
    }

    debug!(rate, "Device has no config at the narration rate, using default");
    device
        .default_output_config()
        .map_err(|e| AudioError::unavailable(format!("no usable output config: {}", e)))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    shared: Arc<DeviceShared>,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    let err_fn = |err| error!("an error occurred on output stream: {}", err);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| render(data, &shared),
            err_fn,
            None,
        )
        .map_err(|e| AudioError::unavailable(format!("failed to build output stream: {}", e)))
}

fn render<T>(data: &mut [T], shared: &DeviceShared)
where
    T: SizedSample + FromSample<f32>,
{
    let channels = shared.channels.max(1) as usize;
    let mut voices = shared.voices.lock().unwrap_or_else(PoisonError::into_inner);
    voices.retain(|v| !v.stopped.load(Ordering::Acquire));

    for frame in data.chunks_mut(channels) {
        let mut value = 0.0f32;
        for voice in voices.iter_mut() {
            if let Some(sample) = voice.samples.get(voice.cursor) {
                value += *sample;
                voice.cursor += 1;
            }
        }
        let value = T::from_sample(value.clamp(-1.0, 1.0));
        for slot in frame.iter_mut() {
            *slot = value;
        }
    }

    // Finished voices count as stopped so a later stop() is a no-op.
    voices.retain(|v| {
        let done = v.cursor >= v.samples.len();
        if done {
            v.stopped.store(true, Ordering::Release);
        }
        !done
    });

    shared
        .frames_rendered
        .fetch_add((data.len() / channels) as u64, Ordering::AcqRel);
}
