//! Microphone recorder
//!
//! Ties a capture source, the frame ring, the block processor thread and the
//! sample accumulator together behind a small start/stop/read API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::audio::{
    frame_ring, lock, BlockProcessor, CaptureError, CaptureSource, Channel, ChannelMode, DataError,
    FramePosition, FrameProducer, Gain, MicInput, SampleAccumulator, Session, DEFAULT_BUFFER_SIZE,
};
use crate::config::RecorderConfig;

/// Blocks of headroom in the frame ring before captured frames are dropped
const RING_BLOCKS: usize = 16;

/// How long the processor sleeps when no whole block is waiting
const IDLE_SLEEP: Duration = Duration::from_millis(5);

/// Recording state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
    Stopped,
}

/// Both channels of a recording, `None` for a channel that is not recorded
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelData {
    pub left: Option<Vec<f32>>,
    pub right: Option<Vec<f32>>,
}

/// Records a capture device into memory
pub struct Recorder {
    /// Current recording gain
    volume: f32,

    /// Gain shared with the capture callback
    gain: Gain,

    /// Recording state
    state: RecordingState,

    /// Recorded blocks and recording flag, shared with the processor thread
    session: Arc<Mutex<Session>>,

    /// Write position of the frame ring, marks where a new take begins
    written: FramePosition,

    /// Whether the processor thread keeps running
    running: Arc<AtomicBool>,

    /// Processor thread handle
    processor: Option<thread::JoinHandle<()>>,

    /// Capture handle, `None` once released
    source: Option<Box<dyn CaptureSource>>,

    /// Device requested in the config, `None` for the system default
    device: Option<String>,

    /// Name reported by the capture source
    device_name: String,
}

impl Recorder {
    /// Whether this platform can capture audio at all
    pub fn is_available() -> bool {
        MicInput::is_available()
    }

    /// Open the configured microphone and get ready to record
    pub fn open(config: RecorderConfig) -> Result<Self, CaptureError> {
        if !Self::is_available() {
            return Err(CaptureError::Unavailable(
                "no audio input device on the default host".to_string(),
            ));
        }

        let device = config.device.clone();
        Self::with_source(config, |frames, gain| {
            MicInput::open(device.as_deref(), frames, gain)
        })
    }

    /// Build a recorder around any capture source.
    ///
    /// `connect` receives the producer side of the frame ring and the shared
    /// gain, and returns the running source.
    pub fn with_source<S, F>(config: RecorderConfig, connect: F) -> Result<Self, CaptureError>
    where
        S: CaptureSource + 'static,
        F: FnOnce(FrameProducer, Gain) -> Result<S, CaptureError>,
    {
        let RecorderConfig {
            volume,
            buffer_size,
            channel_mode,
            device,
            on_sample_data,
        } = config;
        let buffer_size = if buffer_size == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            buffer_size
        };
        let ring_capacity = buffer_size
            .checked_mul(RING_BLOCKS)
            .ok_or(CaptureError::BufferSize(buffer_size))?;

        let (producer, consumer) = frame_ring(ring_capacity);
        let written = consumer.written();
        let gain = Gain::new(volume);
        let source = connect(producer, gain.clone())?;
        let device_name = source.name().to_string();

        let session = Arc::new(Mutex::new(Session::new(SampleAccumulator::new(
            buffer_size,
            channel_mode,
        ))));
        let running = Arc::new(AtomicBool::new(true));

        let processor = BlockProcessor::new(consumer, buffer_size, on_sample_data, Arc::clone(&session));
        let thread_running = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("recordmic-processor".to_string())
            .spawn(move || processor.run(thread_running, IDLE_SLEEP))?;

        log::info!(
            "Recorder ready on {} ({} samples per block, {})",
            device_name,
            buffer_size,
            channel_mode
        );

        Ok(Self {
            volume,
            gain,
            state: RecordingState::Idle,
            session,
            written,
            running,
            processor: Some(handle),
            source: Some(Box::new(source)),
            device,
            device_name,
        })
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Device requested at construction, `None` for the system default
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn buffer_size(&self) -> usize {
        self.session().accumulator.buffer_size()
    }

    /// Samples per channel recorded since the last clear
    pub fn recorded_len(&self) -> usize {
        self.session().accumulator.total_samples()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Change the recording gain. Takes effect on the next captured buffer.
    pub fn set_volume(&mut self, volume: f32) -> &mut Self {
        self.volume = volume;
        self.gain.set(volume);
        self
    }

    pub fn channel_mode(&self) -> ChannelMode {
        self.session().accumulator.channel_mode()
    }

    /// Change which channels are recorded. Discards recorded data.
    pub fn set_channel_mode(&mut self, mode: impl Into<ChannelMode>) -> &mut Self {
        let mode = mode.into();
        self.session().accumulator.set_channel_mode(mode);
        log::debug!("Channel mode set to {}", mode);
        self
    }

    /// Begin a fresh recording, discarding anything recorded before.
    ///
    /// Audio captured before this call, including a partial block left over
    /// from an earlier take, never reaches the new recording.
    pub fn start(&mut self) -> &mut Self {
        {
            let mut session = self.session();
            session.accumulator.clear();
            session.start_frame = self.written.get();
            session.recording = true;
        }
        self.state = RecordingState::Recording;
        log::info!("Recording started");
        self
    }

    /// Stop recording. Recorded data is kept, and no block is appended once
    /// this returns.
    pub fn stop(&mut self) -> &mut Self {
        self.session().recording = false;
        if self.state == RecordingState::Recording {
            self.state = RecordingState::Stopped;
            log::info!("Recording stopped ({} samples)", self.recorded_len());
        }
        self
    }

    /// Discard recorded data without changing the recording state
    pub fn clear(&mut self) -> &mut Self {
        self.session().accumulator.clear();
        self
    }

    /// Stop recording, release the capture device and free all buffers
    pub fn destroy(mut self) {
        self.shutdown();
    }

    /// One channel of the recording, see [`SampleAccumulator::get_mono_data`]
    pub fn get_mono_data(&self, channel: Option<Channel>) -> Result<Vec<f32>, DataError> {
        self.session().accumulator.get_mono_data(channel)
    }

    /// The recording interleaved as stereo, see
    /// [`SampleAccumulator::get_stereo_data`]
    pub fn get_stereo_data(&self, channel: Option<Channel>) -> Result<Vec<f32>, DataError> {
        self.session().accumulator.get_stereo_data(channel)
    }

    /// Both channels as separate buffers
    pub fn get_channel_data(&self) -> ChannelData {
        let session = self.session();
        ChannelData {
            left: session.accumulator.get_mono_data(Some(Channel::Left)).ok(),
            right: session.accumulator.get_mono_data(Some(Channel::Right)).ok(),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        lock(&self.session)
    }

    fn shutdown(&mut self) {
        self.session().recording = false;
        self.running.store(false, Ordering::Release);

        if let Some(handle) = self.processor.take() {
            if handle.join().is_err() {
                log::error!("Block processor panicked");
            }
        }

        if let Some(mut source) = self.source.take() {
            source.release();
        }

        self.session().accumulator.release();
        self.state = RecordingState::Stopped;
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.shutdown();
    }
}
