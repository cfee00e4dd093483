//! Block processing tick
//!
//! Cuts the captured frame stream into fixed-size blocks and hands each block
//! to the sample tap and the accumulator. This is the only code that writes
//! to the accumulator while a recorder is open.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use super::accumulator::SampleAccumulator;
use super::frames::FrameConsumer;

/// Observer called with the raw `(left, right)` blocks on every tick, before
/// they are recorded. It may modify the blocks in place.
pub type SampleTap = Box<dyn FnMut(&mut [f32], &mut [f32]) + Send>;

/// Recording state shared between a recorder and its block processor.
///
/// The recording flag, the take start and the recorded blocks sit behind
/// one lock, so a block is either appended before `stop`/`start`/`clear`
/// take effect or judged against their new state, never half of each.
#[derive(Debug)]
pub struct Session {
    pub accumulator: SampleAccumulator,

    /// Whether processed blocks are kept
    pub recording: bool,

    /// Ring position of the first frame of the current take
    pub start_frame: u64,
}

impl Session {
    pub fn new(accumulator: SampleAccumulator) -> Self {
        Self {
            accumulator,
            recording: false,
            start_frame: 0,
        }
    }
}

/// Lock the shared session, recovering the data if a previous holder
/// panicked
pub(crate) fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Drives `record_block` from the frame ring
pub struct BlockProcessor {
    frames: FrameConsumer,
    left: Vec<f32>,
    right: Vec<f32>,
    tap: Option<SampleTap>,
    session: Arc<Mutex<Session>>,
    dropped_reported: u64,
}

impl BlockProcessor {
    pub fn new(
        frames: FrameConsumer,
        buffer_size: usize,
        tap: Option<SampleTap>,
        session: Arc<Mutex<Session>>,
    ) -> Self {
        Self {
            frames,
            left: vec![0.0; buffer_size],
            right: vec![0.0; buffer_size],
            tap,
            session,
            dropped_reported: 0,
        }
    }

    /// Process every complete block waiting in the ring.
    ///
    /// Frames captured before the current take started are discarded first,
    /// so every take begins on a block boundary of its own audio. Blocks that
    /// arrive while not recording are consumed and discarded.
    /// Returns the number of blocks recorded.
    pub fn drain(&mut self) -> usize {
        let mut recorded = 0;

        loop {
            let mut session = lock(&self.session);

            self.frames.skip_to(session.start_frame);
            if !self.frames.pop_block(&mut self.left, &mut self.right) {
                break;
            }
            if !session.recording {
                continue;
            }

            if let Some(tap) = self.tap.as_mut() {
                tap(self.left.as_mut_slice(), self.right.as_mut_slice());
            }

            match session.accumulator.record_block(&self.left, &self.right) {
                Ok(()) => recorded += 1,
                Err(e) => log::error!("Dropping block: {}", e),
            }
        }

        recorded
    }

    /// Run until `running` is cleared
    pub fn run(mut self, running: Arc<AtomicBool>, idle: Duration) {
        log::debug!("Block processor started ({} samples per block)", self.left.len());

        while running.load(Ordering::Acquire) {
            if self.drain() == 0 {
                thread::sleep(idle);
            }
            self.report_dropped();
        }

        let discarded = self.frames.skip_all();
        log::debug!("Block processor stopped ({} frames discarded)", discarded);
    }

    fn report_dropped(&mut self) {
        let dropped = self.frames.dropped_frames();
        if dropped > self.dropped_reported {
            log::warn!(
                "Capture overrun: {} frames dropped ({} total)",
                dropped - self.dropped_reported,
                dropped
            );
            self.dropped_reported = dropped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::accumulator::{Channel, ChannelMode};
    use crate::audio::frames::{frame_ring, FrameProducer, StereoFrame};

    fn processor(
        buffer_size: usize,
        mode: ChannelMode,
        tap: Option<SampleTap>,
    ) -> (FrameProducer, BlockProcessor, Arc<Mutex<Session>>) {
        let (producer, consumer) = frame_ring(64);
        let mut session = Session::new(SampleAccumulator::new(buffer_size, mode));
        session.recording = true;
        let session = Arc::new(Mutex::new(session));
        let processor = BlockProcessor::new(consumer, buffer_size, tap, Arc::clone(&session));
        (producer, processor, session)
    }

    fn push(producer: &mut FrameProducer, left: &[f32]) {
        for &l in left {
            producer.push(StereoFrame::new(l, l));
        }
    }

    #[test]
    fn test_drain_records_whole_blocks() {
        let (mut producer, mut processor, session) = processor(2, ChannelMode::Stereo, None);

        for i in 1..=5 {
            producer.push(StereoFrame::new(i as f32, 10.0 * i as f32));
        }

        assert_eq!(processor.drain(), 2);

        let session = lock(&session);
        assert_eq!(session.accumulator.total_samples(), 4);
        assert_eq!(
            session.accumulator.get_stereo_data(None).unwrap(),
            vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0, 4.0, 40.0]
        );
    }

    #[test]
    fn test_tap_runs_before_recording_and_can_modify() {
        let tap: SampleTap = Box::new(|left: &mut [f32], right: &mut [f32]| {
            for l in left.iter_mut() {
                *l *= -1.0;
            }
            right.fill(0.0);
        });
        let (mut producer, mut processor, session) = processor(2, ChannelMode::Stereo, Some(tap));

        producer.push(StereoFrame::new(1.0, 5.0));
        producer.push(StereoFrame::new(2.0, 6.0));
        processor.drain();

        let session = lock(&session);
        assert_eq!(session.accumulator.get_mono_data(Some(Channel::Left)).unwrap(), vec![-1.0, -2.0]);
        assert_eq!(session.accumulator.get_mono_data(Some(Channel::Right)).unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_tap_sees_blocks_for_unrecorded_channels() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let tap: SampleTap = Box::new(move |_left: &mut [f32], right: &mut [f32]| {
            sink.lock().unwrap().extend_from_slice(right);
        });
        let (mut producer, mut processor, session) = processor(2, ChannelMode::MonoLeft, Some(tap));

        producer.push(StereoFrame::new(1.0, 3.0));
        producer.push(StereoFrame::new(2.0, 4.0));
        processor.drain();

        assert_eq!(*seen.lock().unwrap(), vec![3.0, 4.0]);
        assert!(!lock(&session).accumulator.has_channel(Channel::Right));
    }

    #[test]
    fn test_blocks_discarded_while_not_recording() {
        let tapped = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&tapped);
        let tap: SampleTap = Box::new(move |_: &mut [f32], _: &mut [f32]| {
            *counter.lock().unwrap() += 1;
        });
        let (mut producer, mut processor, session) = processor(2, ChannelMode::Stereo, Some(tap));
        lock(&session).recording = false;

        push(&mut producer, &[0.0, 0.0]);

        assert_eq!(processor.drain(), 0);
        assert_eq!(processor.frames.available(), 0);
        assert_eq!(lock(&session).accumulator.total_samples(), 0);
        assert_eq!(*tapped.lock().unwrap(), 0);
    }

    #[test]
    fn test_new_take_skips_leftover_partial_block() {
        let (mut producer, mut processor, session) = processor(2, ChannelMode::Stereo, None);
        let written = processor.frames.written();

        // First take leaves one frame short of a block
        push(&mut producer, &[1.0, 2.0, 3.0]);
        assert_eq!(processor.drain(), 1);

        // Stop and start again: the take begins at the current write position
        {
            let mut session = lock(&session);
            session.recording = false;
            session.accumulator.clear();
            session.recording = true;
            session.start_frame = written.get();
        }

        push(&mut producer, &[10.0, 20.0]);
        assert_eq!(processor.drain(), 1);

        let session = lock(&session);
        assert_eq!(session.accumulator.get_mono_data(Some(Channel::Left)).unwrap(), vec![10.0, 20.0]);
        assert_eq!(session.accumulator.total_samples(), 2);
    }

    #[test]
    fn test_stop_is_seen_by_the_next_block() {
        let (mut producer, mut processor, session) = processor(2, ChannelMode::Stereo, None);

        push(&mut producer, &[1.0, 2.0]);
        assert_eq!(processor.drain(), 1);

        // A block already waiting in the ring when recording stops is not kept
        push(&mut producer, &[3.0, 4.0]);
        lock(&session).recording = false;

        assert_eq!(processor.drain(), 0);
        assert_eq!(lock(&session).accumulator.get_mono_data(None).unwrap(), vec![1.0, 2.0]);
    }
}
