//! Channel buffer accumulation
//!
//! The accumulator receives one fixed-size block per channel on every
//! processing tick and keeps copies of the blocks for whichever channels the
//! current [`ChannelMode`] records. Recorded data is delivered on demand as
//! flat `Vec<f32>` buffers: a single channel, a stereo interleave of both
//! channels, or a single channel doubled into a stereo-shaped layout.
//!
//! A channel that is not recorded under the current mode has no buffer at
//! all (`None`), which is different from a buffer that exists but is still
//! empty. Reading an absent channel is a [`DataError::NoData`]; reading an
//! empty one yields a zero-length result.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of samples per channel in each block
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// A single source channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which channels are kept while recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelMode {
    /// Both channels are recorded
    #[default]
    Stereo,
    /// Only the left channel is recorded
    MonoLeft,
    /// Only the right channel is recorded
    MonoRight,
}

impl ChannelMode {
    pub const ALL: &[ChannelMode] = &[Self::Stereo, Self::MonoLeft, Self::MonoRight];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Stereo => "stereo",
            Self::MonoLeft => "left",
            Self::MonoRight => "right",
        }
    }

    pub fn records(&self, channel: Channel) -> bool {
        matches!(
            (self, channel),
            (Self::Stereo, _) | (Self::MonoLeft, Channel::Left) | (Self::MonoRight, Channel::Right)
        )
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `false` records stereo, `true` records the right channel only.
impl From<bool> for ChannelMode {
    fn from(mono: bool) -> Self {
        if mono {
            Self::MonoRight
        } else {
            Self::Stereo
        }
    }
}

/// `"left"` and `"right"` pick a mono channel, `""` and `"stereo"` record
/// both. Matching is exact; any other string, `"Left"` included, is treated
/// as a request for mono and records the right channel.
impl From<&str> for ChannelMode {
    fn from(mono: &str) -> Self {
        match mono {
            "left" => Self::MonoLeft,
            "right" => Self::MonoRight,
            "" | "stereo" => Self::Stereo,
            _ => Self::MonoRight,
        }
    }
}

impl From<Option<Channel>> for ChannelMode {
    fn from(channel: Option<Channel>) -> Self {
        match channel {
            None => Self::Stereo,
            Some(Channel::Left) => Self::MonoLeft,
            Some(Channel::Right) => Self::MonoRight,
        }
    }
}

impl Serialize for ChannelMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ChannelMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Flag(bool),
            Name(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Flag(mono) => Self::from(mono),
            Repr::Name(name) => Self::from(name.as_str()),
        })
    }
}

/// Errors raised when reading or writing recorded data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("There is nothing recorded{}", channel_suffix(.0))]
    NoData(Option<Channel>),

    #[error("Block has {actual} samples, expected {expected}")]
    BlockLength { expected: usize, actual: usize },
}

fn channel_suffix(channel: &Option<Channel>) -> String {
    match channel {
        Some(channel) => format!(" for the {} channel", channel),
        None => String::new(),
    }
}

/// Accumulates fixed-size sample blocks for the active channels
#[derive(Debug, Clone)]
pub struct SampleAccumulator {
    /// Active channel layout
    mode: ChannelMode,

    /// Samples per block
    buffer_size: usize,

    /// Recorded left blocks, `None` when the left channel is not recorded
    left: Option<Vec<Box<[f32]>>>,

    /// Recorded right blocks, `None` when the right channel is not recorded
    right: Option<Vec<Box<[f32]>>>,

    /// Samples per channel recorded since the last reset
    total_samples: usize,
}

impl SampleAccumulator {
    /// Create an empty accumulator. A zero `buffer_size` falls back to
    /// [`DEFAULT_BUFFER_SIZE`].
    pub fn new(buffer_size: usize, mode: ChannelMode) -> Self {
        let mut accumulator = Self {
            mode,
            buffer_size: if buffer_size == 0 {
                DEFAULT_BUFFER_SIZE
            } else {
                buffer_size
            },
            left: None,
            right: None,
            total_samples: 0,
        };
        accumulator.set_channel_mode(mode);
        accumulator
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn channel_mode(&self) -> ChannelMode {
        self.mode
    }

    /// Samples per channel recorded since the last reset
    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    /// Whether a buffer exists for `channel`
    pub fn has_channel(&self, channel: Channel) -> bool {
        self.buffer(channel).is_some()
    }

    /// Number of blocks held for `channel`, `None` if it is not recorded
    pub fn block_count(&self, channel: Channel) -> Option<usize> {
        self.buffer(channel).map(Vec::len)
    }

    /// Switch the channel layout. Previously recorded data is discarded and
    /// the active buffers are reallocated empty.
    pub fn set_channel_mode(&mut self, mode: ChannelMode) -> &mut Self {
        self.mode = mode;
        self.total_samples = 0;
        self.left = mode.records(Channel::Left).then(Vec::new);
        self.right = mode.records(Channel::Right).then(Vec::new);
        self
    }

    /// Discard recorded data, keeping the current channel layout
    pub fn clear(&mut self) -> &mut Self {
        self.set_channel_mode(self.mode)
    }

    /// Drop every buffer. Both channels read as absent afterwards until the
    /// next [`clear`](Self::clear) or [`set_channel_mode`](Self::set_channel_mode).
    pub fn release(&mut self) {
        self.left = None;
        self.right = None;
        self.total_samples = 0;
    }

    /// Append one block per active channel.
    ///
    /// Both blocks are always supplied; channels not recorded under the
    /// current mode are ignored. The blocks are copied, so the caller may
    /// reuse their storage for the next tick.
    pub fn record_block(&mut self, left: &[f32], right: &[f32]) -> Result<(), DataError> {
        for block in [left, right] {
            if block.len() != self.buffer_size {
                return Err(DataError::BlockLength {
                    expected: self.buffer_size,
                    actual: block.len(),
                });
            }
        }

        if let Some(blocks) = self.left.as_mut() {
            blocks.push(left.into());
        }
        if let Some(blocks) = self.right.as_mut() {
            blocks.push(right.into());
        }

        self.total_samples += self.buffer_size;
        Ok(())
    }

    /// Concatenate one channel's blocks into a flat buffer.
    ///
    /// With no channel given the left channel is used if present, then the
    /// right one.
    pub fn get_mono_data(&self, channel: Option<Channel>) -> Result<Vec<f32>, DataError> {
        let blocks = self.resolve(channel)?;

        let mut combined = Vec::with_capacity(self.total_samples);
        for block in blocks {
            combined.extend_from_slice(block);
        }
        Ok(combined)
    }

    /// Deliver the recording as interleaved stereo.
    ///
    /// With no channel given and both channels present the result is
    /// `[l0, r0, l1, r1, ...]`. Otherwise a single channel is resolved the
    /// same way as [`get_mono_data`](Self::get_mono_data) and every sample is
    /// written twice: `[x0, x0, x1, x1, ...]`.
    pub fn get_stereo_data(&self, channel: Option<Channel>) -> Result<Vec<f32>, DataError> {
        let mut combined = Vec::with_capacity(self.total_samples * 2);

        if let (None, Some(left), Some(right)) = (channel, &self.left, &self.right) {
            for (l_block, r_block) in left.iter().zip(right) {
                for (&l, &r) in l_block.iter().zip(r_block.iter()) {
                    combined.push(l);
                    combined.push(r);
                }
            }
            return Ok(combined);
        }

        for block in self.resolve(channel)? {
            for &x in block.iter() {
                combined.push(x);
                combined.push(x);
            }
        }
        Ok(combined)
    }

    fn buffer(&self, channel: Channel) -> Option<&Vec<Box<[f32]>>> {
        match channel {
            Channel::Left => self.left.as_ref(),
            Channel::Right => self.right.as_ref(),
        }
    }

    fn resolve(&self, channel: Option<Channel>) -> Result<&[Box<[f32]>], DataError> {
        let blocks = match channel {
            Some(channel) => self.buffer(channel),
            None => self.left.as_ref().or(self.right.as_ref()),
        };
        blocks.map(Vec::as_slice).ok_or(DataError::NoData(channel))
    }
}

impl Default for SampleAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE, ChannelMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded(mode: ChannelMode, left: &[[f32; 2]], right: &[[f32; 2]]) -> SampleAccumulator {
        let mut acc = SampleAccumulator::new(2, mode);
        for (l, r) in left.iter().zip(right) {
            acc.record_block(l, r).unwrap();
        }
        acc
    }

    #[test]
    fn test_total_samples_counts_ticks_not_channels() {
        for &mode in ChannelMode::ALL {
            let mut acc = SampleAccumulator::new(4, mode);
            for _ in 0..5 {
                acc.record_block(&[0.0; 4], &[0.0; 4]).unwrap();
            }
            assert_eq!(acc.total_samples(), 20, "mode {}", mode);
        }
    }

    #[test]
    fn test_stereo_interleave() {
        let acc = recorded(
            ChannelMode::Stereo,
            &[[1.0, 2.0], [3.0, 4.0]],
            &[[5.0, 6.0], [7.0, 8.0]],
        );

        assert_eq!(
            acc.get_stereo_data(None).unwrap(),
            vec![1.0, 5.0, 2.0, 6.0, 3.0, 7.0, 4.0, 8.0]
        );
    }

    #[test]
    fn test_mono_is_doubled_in_stereo_layout() {
        let acc = recorded(ChannelMode::MonoLeft, &[[1.0, 2.0]], &[[9.0, 9.0]]);

        assert_eq!(acc.get_stereo_data(None).unwrap(), vec![1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_explicit_channel_from_stereo_recording() {
        let acc = recorded(
            ChannelMode::Stereo,
            &[[1.0, 2.0], [3.0, 4.0]],
            &[[5.0, 6.0], [7.0, 8.0]],
        );

        assert_eq!(acc.get_mono_data(Some(Channel::Right)).unwrap(), vec![5.0, 6.0, 7.0, 8.0]);
        assert_eq!(
            acc.get_stereo_data(Some(Channel::Right)).unwrap(),
            vec![5.0, 5.0, 6.0, 6.0, 7.0, 7.0, 8.0, 8.0]
        );
        // Left wins when no channel is requested
        assert_eq!(acc.get_mono_data(None).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_mono_left_has_no_right_channel() {
        let acc = recorded(ChannelMode::MonoLeft, &[[1.0, 2.0]], &[[3.0, 4.0]]);

        assert!(!acc.has_channel(Channel::Right));
        assert_eq!(
            acc.get_mono_data(Some(Channel::Right)),
            Err(DataError::NoData(Some(Channel::Right)))
        );
        assert_eq!(
            acc.get_stereo_data(Some(Channel::Right)),
            Err(DataError::NoData(Some(Channel::Right)))
        );
    }

    #[test]
    fn test_fallback_matches_explicit_channel() {
        let acc = recorded(ChannelMode::MonoLeft, &[[1.0, 2.0], [3.0, 4.0]], &[[0.0; 2], [0.0; 2]]);
        assert_eq!(acc.get_mono_data(None), acc.get_mono_data(Some(Channel::Left)));

        let acc = recorded(ChannelMode::MonoRight, &[[0.0; 2]], &[[7.0, 8.0]]);
        assert_eq!(acc.get_mono_data(None).unwrap(), vec![7.0, 8.0]);
        assert_eq!(acc.get_stereo_data(None).unwrap(), vec![7.0, 7.0, 8.0, 8.0]);
    }

    #[test]
    fn test_reads_do_not_mutate() {
        let acc = recorded(ChannelMode::Stereo, &[[1.0, 2.0]], &[[3.0, 4.0]]);

        let first = acc.get_mono_data(Some(Channel::Left)).unwrap();
        let second = acc.get_mono_data(Some(Channel::Left)).unwrap();
        assert_eq!(first, second);
        assert_eq!(acc.total_samples(), 2);
        assert_eq!(acc.block_count(Channel::Left), Some(1));
        assert_eq!(acc.block_count(Channel::Right), Some(1));
    }

    #[test]
    fn test_clear_leaves_empty_but_present_buffers() {
        let mut acc = recorded(ChannelMode::Stereo, &[[1.0, 2.0]], &[[3.0, 4.0]]);
        acc.clear();

        assert_eq!(acc.total_samples(), 0);
        assert_eq!(acc.channel_mode(), ChannelMode::Stereo);
        assert_eq!(acc.get_mono_data(None).unwrap(), Vec::<f32>::new());
        assert_eq!(acc.get_stereo_data(None).unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn test_release_makes_every_channel_absent() {
        let mut acc = recorded(ChannelMode::Stereo, &[[1.0, 2.0]], &[[3.0, 4.0]]);
        acc.release();

        assert_eq!(acc.total_samples(), 0);
        assert_eq!(acc.get_mono_data(None), Err(DataError::NoData(None)));
        assert_eq!(acc.get_stereo_data(None), Err(DataError::NoData(None)));
    }

    #[test]
    fn test_mode_switch_discards_data() {
        let mut acc = recorded(ChannelMode::Stereo, &[[1.0, 2.0]], &[[3.0, 4.0]]);
        acc.set_channel_mode(ChannelMode::MonoRight);

        assert_eq!(acc.total_samples(), 0);
        assert!(!acc.has_channel(Channel::Left));
        assert_eq!(acc.block_count(Channel::Right), Some(0));
    }

    #[test]
    fn test_recorded_blocks_are_copies() {
        let mut acc = SampleAccumulator::new(2, ChannelMode::Stereo);
        let mut left = [1.0, 2.0];
        let mut right = [3.0, 4.0];
        acc.record_block(&left, &right).unwrap();

        left[0] = 100.0;
        right[1] = 200.0;
        acc.record_block(&left, &right).unwrap();

        assert_eq!(acc.get_mono_data(Some(Channel::Left)).unwrap(), vec![1.0, 2.0, 100.0, 2.0]);
        assert_eq!(acc.get_mono_data(Some(Channel::Right)).unwrap(), vec![3.0, 4.0, 3.0, 200.0]);
    }

    #[test]
    fn test_partial_block_is_rejected() {
        let mut acc = SampleAccumulator::new(4, ChannelMode::Stereo);

        assert_eq!(
            acc.record_block(&[0.0; 3], &[0.0; 4]),
            Err(DataError::BlockLength { expected: 4, actual: 3 })
        );
        assert_eq!(acc.total_samples(), 0);
        assert_eq!(acc.block_count(Channel::Left), Some(0));
    }

    #[test]
    fn test_zero_buffer_size_uses_default() {
        let acc = SampleAccumulator::new(0, ChannelMode::Stereo);
        assert_eq!(acc.buffer_size(), DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn test_channel_mode_normalization() {
        assert_eq!(ChannelMode::from(false), ChannelMode::Stereo);
        assert_eq!(ChannelMode::from(true), ChannelMode::MonoRight);
        assert_eq!(ChannelMode::from("left"), ChannelMode::MonoLeft);
        assert_eq!(ChannelMode::from("Right"), ChannelMode::MonoRight);
        assert_eq!(ChannelMode::from("Left"), ChannelMode::MonoRight);
        assert_eq!(ChannelMode::from(" left"), ChannelMode::MonoRight);
        assert_eq!(ChannelMode::from(""), ChannelMode::Stereo);
        assert_eq!(ChannelMode::from("stereo"), ChannelMode::Stereo);
        assert_eq!(ChannelMode::from("mono"), ChannelMode::MonoRight);
        assert_eq!(ChannelMode::from(Some(Channel::Left)), ChannelMode::MonoLeft);
        assert_eq!(ChannelMode::from(None), ChannelMode::Stereo);
    }

    #[test]
    fn test_channel_mode_serde() {
        let mode: ChannelMode = serde_json::from_str("true").unwrap();
        assert_eq!(mode, ChannelMode::MonoRight);
        let mode: ChannelMode = serde_json::from_str("false").unwrap();
        assert_eq!(mode, ChannelMode::Stereo);
        let mode: ChannelMode = serde_json::from_str("\"left\"").unwrap();
        assert_eq!(mode, ChannelMode::MonoLeft);

        assert_eq!(serde_json::to_string(&ChannelMode::MonoRight).unwrap(), "\"right\"");
    }

    #[test]
    fn test_no_data_messages() {
        assert_eq!(DataError::NoData(None).to_string(), "There is nothing recorded");
        assert_eq!(
            DataError::NoData(Some(Channel::Left)).to_string(),
            "There is nothing recorded for the left channel"
        );
    }
}
