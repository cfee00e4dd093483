use std::fmt;

use crate::audio::{ChannelMode, SampleTap, DEFAULT_BUFFER_SIZE};

/// Construction-time recorder options.
///
/// Fixed once the recorder is opened; the live volume and channel mode are
/// session state on [`Recorder`](crate::Recorder).
pub struct RecorderConfig {
    /// Initial recording gain (usually 0 to 1, not clamped)
    pub volume: f32,

    /// Samples per channel in each processing block
    pub buffer_size: usize,

    /// Initial channel layout
    pub channel_mode: ChannelMode,

    /// Input device name, `None` for the system default
    pub device: Option<String>,

    /// Optional observer for every captured block
    pub on_sample_data: Option<SampleTap>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            buffer_size: DEFAULT_BUFFER_SIZE,
            channel_mode: ChannelMode::Stereo,
            device: None,
            on_sample_data: None,
        }
    }
}

impl RecorderConfig {
    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    /// A zero size keeps the default of 2048
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = if buffer_size == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            buffer_size
        };
        self
    }

    pub fn channel_mode(mut self, mode: impl Into<ChannelMode>) -> Self {
        self.channel_mode = mode.into();
        self
    }

    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn on_sample_data<F>(mut self, tap: F) -> Self
    where
        F: FnMut(&mut [f32], &mut [f32]) + Send + 'static,
    {
        self.on_sample_data = Some(Box::new(tap));
        self
    }
}

impl fmt::Debug for RecorderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecorderConfig")
            .field("volume", &self.volume)
            .field("buffer_size", &self.buffer_size)
            .field("channel_mode", &self.channel_mode)
            .field("device", &self.device)
            .field("on_sample_data", &self.on_sample_data.is_some())
            .finish()
    }
}
