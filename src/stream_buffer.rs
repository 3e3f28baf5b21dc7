//! Streaming sample buffer
//!
//! Accumulates raw 16-bit PCM from the capture worker and yields fixed-size
//! analysis windows once enough samples arrive. The hop controls how much is
//! consumed per window: `hop == window_len` discards each window whole,
//! `hop < window_len` retains the most recent `window_len - hop` samples as
//! the start of the next window.
//!
//! Samples stay in integer PCM while buffered and are converted to
//! normalized floats at extraction time, keeping the buffer format-agnostic.
//! Producer and consumer sides sit behind their own locks so a controller
//! thread can reset the buffer while the worker is pushing.

use cache_padded::CachePadded;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Audio sample format (16-bit PCM)
pub type AudioSample = i16;

/// Default capacity, in analysis windows. A session that drains promptly
/// stays well below this.
const DEFAULT_CAPACITY_WINDOWS: usize = 4;

type RingBuffer = HeapRb<AudioSample>;
type RingProducer = <RingBuffer as Split>::Prod;
type RingConsumer = <RingBuffer as Split>::Cons;

/// Windowing accumulator over an unbounded sample stream.
pub struct StreamBuffer {
    producer: CachePadded<Mutex<RingProducer>>,
    consumer: CachePadded<Mutex<RingConsumer>>,
    window_len: usize,
    hop_len: usize,
}

impl StreamBuffer {
    /// Create a buffer for the given window and hop lengths.
    pub fn new(window_len: usize, hop_len: usize) -> Self {
        Self::with_capacity(window_len, hop_len, DEFAULT_CAPACITY_WINDOWS * window_len)
    }

    /// Create a buffer with an explicit sample capacity.
    pub fn with_capacity(window_len: usize, hop_len: usize, capacity: usize) -> Self {
        debug_assert!(hop_len >= 1 && hop_len <= window_len);
        debug!(
            "Creating stream buffer: window={} hop={} capacity={}",
            window_len, hop_len, capacity
        );

        let rb = HeapRb::<AudioSample>::new(capacity);
        let (producer, consumer) = rb.split();

        Self {
            producer: CachePadded::new(Mutex::new(producer)),
            consumer: CachePadded::new(Mutex::new(consumer)),
            window_len,
            hop_len,
        }
    }

    /// Append samples to the accumulator.
    ///
    /// Returns the number of samples written. When the buffer is full the
    /// oldest samples are dropped to make room, with a warning; that only
    /// happens if the consumer has stalled for several window lengths.
    pub fn push(&self, samples: &[AudioSample]) -> usize {
        let mut producer = self.producer.lock().unwrap();

        let available_space = producer.vacant_len();
        if samples.len() > available_space {
            let to_drop = samples.len() - available_space;
            let mut consumer = self.consumer.lock().unwrap();
            consumer.skip(to_drop);
            drop(consumer);

            warn!(
                "Stream buffer full, dropping {} oldest samples to make room",
                to_drop
            );
        }

        producer.push_slice(samples)
    }

    /// Take the next analysis window, if one is ready.
    ///
    /// Returns `None` without mutating state while fewer than `window_len`
    /// samples are buffered. On success the window is returned normalized to
    /// [-1, 1] and `hop_len` samples are consumed.
    pub fn try_take_window(&self) -> Option<Vec<f32>> {
        let mut consumer = self.consumer.lock().unwrap();

        if consumer.occupied_len() < self.window_len {
            return None;
        }

        let window: Vec<f32> = consumer
            .iter()
            .take(self.window_len)
            .map(|&s| s as f32 / 32767.0)
            .collect();

        consumer.skip(self.hop_len);
        Some(window)
    }

    /// Number of samples currently buffered.
    pub fn len(&self) -> usize {
        self.consumer.lock().unwrap().occupied_len()
    }

    /// True when no samples are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total sample capacity.
    pub fn capacity(&self) -> usize {
        self.consumer.lock().unwrap().capacity().get()
    }

    /// Analysis window length in samples.
    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Window hop in samples.
    pub fn hop_len(&self) -> usize {
        self.hop_len
    }

    /// Discard all buffered samples. Called at session stop so stale audio
    /// cannot leak into the next session.
    pub fn reset(&self) {
        let mut consumer = self.consumer.lock().unwrap();
        let occupied = consumer.occupied_len();
        consumer.skip(occupied);
        debug!("Stream buffer reset, discarded {} samples", occupied);
    }
}
