//! Lock-free frame ring between the capture callback and the block processor
//!
//! The cpal data callback runs on a real-time thread. It must never block on
//! a lock held by a reader or allocate while the recording grows, so captured
//! frames go through a SPSC ring buffer from the `ringbuf` crate:
//! - the capture callback is the single producer (pushes frames)
//! - the block processor is the single consumer (pops fixed-size blocks)
//!
//! Frames that do not fit because the consumer fell behind are dropped and
//! counted. Blocks are only ever popped whole.

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapRb,
};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// One sample for each of the two recorded channels
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }
}

/// Create a frame ring holding up to `capacity` frames
pub fn frame_ring(capacity: usize) -> (FrameProducer, FrameConsumer) {
    let rb = HeapRb::<StereoFrame>::new(capacity.max(1));
    let (prod, cons) = rb.split();

    let dropped = Arc::new(AtomicU64::new(0));
    let written = FramePosition(Arc::new(AtomicU64::new(0)));

    (
        FrameProducer {
            producer: prod,
            dropped: Arc::clone(&dropped),
            written: written.clone(),
        },
        FrameConsumer {
            consumer: cons,
            dropped,
            written,
            read: 0,
        },
    )
}

/// Number of frames that have entered the ring so far.
///
/// Every frame gets the position it was written at, so a position read
/// at some instant splits the stream into frames captured before and after
/// it.
#[derive(Clone, Debug)]
pub struct FramePosition(Arc<AtomicU64>);

impl FramePosition {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}

/// Producer half (owned by the capture callback)
pub struct FrameProducer {
    producer: ringbuf::HeapProd<StereoFrame>,
    dropped: Arc<AtomicU64>,
    written: FramePosition,
}

impl FrameProducer {
    /// Push a single frame, dropping it if the ring is full
    #[inline]
    pub fn push(&mut self, frame: StereoFrame) {
        if self.producer.try_push(frame).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        } else {
            self.written.0.fetch_add(1, Ordering::Release);
        }
    }

    /// Push interleaved device samples, scaled by `gain`.
    ///
    /// The first device channel feeds the left side and the second the right
    /// side. A mono device feeds both; extra channels are ignored.
    #[inline]
    pub fn push_interleaved(&mut self, data: &[f32], channels: usize, gain: f32) {
        if channels == 0 {
            return;
        }

        for frame in data.chunks_exact(channels) {
            let left = frame[0] * gain;
            let right = if channels > 1 { frame[1] * gain } else { left };
            self.push(StereoFrame::new(left, right));
        }
    }

    /// Frames dropped so far because the ring was full
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer half (owned by the block processor)
pub struct FrameConsumer {
    consumer: ringbuf::HeapCons<StereoFrame>,
    dropped: Arc<AtomicU64>,
    written: FramePosition,
    /// Position of the next frame to be popped
    read: u64,
}

impl FrameConsumer {
    /// Frames waiting in the ring
    pub fn available(&self) -> usize {
        self.consumer.occupied_len()
    }

    /// Position of the next frame to be popped
    pub fn position(&self) -> u64 {
        self.read
    }

    /// Shared handle on the producer's write position
    pub fn written(&self) -> FramePosition {
        self.written.clone()
    }

    /// Pop one block of `left.len()` frames into `left` and `right`.
    ///
    /// Returns `false` without consuming anything when fewer frames than a
    /// whole block are waiting.
    pub fn pop_block(&mut self, left: &mut [f32], right: &mut [f32]) -> bool {
        debug_assert_eq!(left.len(), right.len());

        if left.is_empty() || self.available() < left.len() {
            return false;
        }

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            // Only this consumer pops, so the frames counted above are still there
            let Some(frame) = self.consumer.try_pop() else {
                return false;
            };
            self.read += 1;
            *l = frame.left;
            *r = frame.right;
        }
        true
    }

    /// Discard frames until the next one to be popped is at `position` or
    /// the ring is empty. Returns the number of frames discarded.
    pub fn skip_to(&mut self, position: u64) -> usize {
        let behind = position.saturating_sub(self.read);
        let waiting = usize::try_from(behind)
            .unwrap_or(usize::MAX)
            .min(self.available());
        let skipped = self.consumer.skip(waiting);
        self.read += skipped as u64;
        skipped
    }

    /// Discard everything currently waiting
    pub fn skip_all(&mut self) -> usize {
        let waiting = self.available();
        let skipped = self.consumer.skip(waiting);
        self.read += skipped as u64;
        skipped
    }

    /// Frames dropped so far because the ring was full
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
