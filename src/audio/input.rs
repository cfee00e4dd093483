//! Audio input capture
//!
//! This module opens a microphone through cpal and feeds its samples, with
//! the current gain applied, into a frame ring.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;

use super::frames::FrameProducer;

/// Errors that can occur while acquiring a capture device
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Audio capture is not available: {0}")]
    Unavailable(String),

    #[error("Input device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("Failed to read input config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to open input stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("Failed to start input stream: {0}")]
    Play(#[from] cpal::PlayStreamError),

    #[error("Buffer size {0} is too large")]
    BufferSize(usize),

    #[error("Failed to start block processor: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Gain applied to captured samples, shared with the audio thread
#[derive(Clone, Debug)]
pub struct Gain(Arc<AtomicU32>);

impl Gain {
    pub fn new(value: f32) -> Self {
        Self(Arc::new(AtomicU32::new(value.to_bits())))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// A connected capture device.
///
/// Implementations push frames into the producer they were opened with until
/// released.
pub trait CaptureSource {
    /// Device name for logging
    fn name(&self) -> &str;

    /// Stop capturing and hand the device back to the host
    fn release(&mut self);
}

/// Microphone capture through the default cpal host
pub struct MicInput {
    /// The audio input stream, `None` once released
    stream: Option<cpal::Stream>,

    /// Device name
    name: String,

    /// Device sample rate in Hz
    sample_rate: u32,

    /// Device channel count
    channels: u16,
}

impl MicInput {
    /// Whether the default host offers any input device
    pub fn is_available() -> bool {
        cpal::default_host().default_input_device().is_some()
    }

    /// Names of the available input devices
    pub fn device_names() -> Result<Vec<String>, CaptureError> {
        let host = cpal::default_host();
        Ok(host
            .input_devices()?
            .filter_map(|d| d.name().ok())
            .collect())
    }

    /// Open `device_name`, or the default input device, and start capturing
    /// into `frames`
    pub fn open(
        device_name: Option<&str>,
        frames: FrameProducer,
        gain: Gain,
    ) -> Result<Self, CaptureError> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(wanted) => host
                .input_devices()?
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceNotFound(wanted.to_string()))?,
            None => host
                .default_input_device()
                .ok_or_else(|| CaptureError::Unavailable("no default input device".to_string()))?,
        };

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("Using input device: {}", name);

        let config = device.default_input_config()?;
        log::info!("Audio config: {:?}", config);

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), frames, gain)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config.into(), frames, gain)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config.into(), frames, gain)?,
            format => return Err(CaptureError::UnsupportedFormat(format!("{:?}", format))),
        };

        stream.play()?;
        log::info!("Capture started");

        Ok(Self {
            stream: Some(stream),
            name,
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl CaptureSource for MicInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("Failed to pause input stream: {}", e);
            }
            log::info!("Capture released: {}", self.name);
        }
    }
}

impl Drop for MicInput {
    fn drop(&mut self) {
        self.release();
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut frames: FrameProducer,
    gain: Gain,
) -> Result<cpal::Stream, CaptureError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels as usize;
    // Conversion scratch space, grown only if the host delivers a larger
    // callback buffer than the last one
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            scratch.clear();
            scratch.extend(data.iter().map(|&s| s.to_sample::<f32>()));
            frames.push_interleaved(&scratch, channels, gain.get());
        },
        |err| log::error!("Audio error: {}", err),
        None,
    )?;

    Ok(stream)
}
