//! recordmic - record microphone input into memory
//!
//! Captures an input device through cpal, accumulates fixed-size blocks per
//! channel while recording, and delivers the recording as flat `f32`
//! buffers: one channel, interleaved stereo, or a mono channel doubled into
//! a stereo layout.
//!
//! ```no_run
//! use recordmic::{Recorder, RecorderConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut recorder = Recorder::open(RecorderConfig::default().channel_mode("left"))?;
//! recorder.start();
//! std::thread::sleep(std::time::Duration::from_secs(3));
//! recorder.stop();
//!
//! let samples = recorder.get_stereo_data(None)?;
//! println!("{} interleaved samples", samples.len());
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod recorder;
pub mod settings;

pub use audio::{CaptureError, CaptureSource, Channel, ChannelMode, DataError, SampleAccumulator};
pub use config::RecorderConfig;
pub use recorder::{ChannelData, Recorder, RecordingState};
pub use settings::RecorderSettings;
