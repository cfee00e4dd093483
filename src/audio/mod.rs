//! Audio module - microphone capture and sample accumulation
//!
//! This module provides:
//! - Channel buffer accumulation and flattening
//! - Lock-free frame ring for sharing captured audio between threads
//! - Block processing tick driving the accumulator
//! - Microphone capture

mod accumulator;
mod frames;
mod input;
mod processor;

pub use accumulator::{Channel, ChannelMode, DataError, SampleAccumulator, DEFAULT_BUFFER_SIZE};
pub use frames::{frame_ring, FrameConsumer, FramePosition, FrameProducer, StereoFrame};
pub use input::{CaptureError, CaptureSource, Gain, MicInput};
pub use processor::{BlockProcessor, SampleTap, Session};

pub(crate) use processor::lock;
