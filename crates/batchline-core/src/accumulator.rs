//! Size- and interval-triggered batch accumulator

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::time::{Duration, Instant};

use crate::config::BatcherConfig;
use crate::error::ConfigError;
use crate::release::Releaser;

/// Common surface of the accumulators, so a driver loop can be generic over them.
pub trait Accumulator {
    type Item;

    /// Buffer an item, releasing if a threshold has been crossed
    fn write(&mut self, item: Self::Item);

    /// Release a partial batch if the interval has lapsed
    fn flush(&mut self);

    /// Release whatever is buffered, ignoring both thresholds
    fn forced_flush(&mut self);

    /// Number of items currently buffered
    fn len(&self) -> usize;

    /// Check if nothing is buffered
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Container a [`Batcher`] buffers pending items in.
///
/// `Default` must yield an empty container. For `Vec` and `VecDeque` that
/// does not allocate, so an idle batcher holds no buffer.
pub trait BatchBuf<T>: Default {
    fn push(&mut self, item: T);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> BatchBuf<T> for Vec<T> {
    fn push(&mut self, item: T) {
        Vec::push(self, item);
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

impl<T> BatchBuf<T> for VecDeque<T> {
    fn push(&mut self, item: T) {
        self.push_back(item);
    }

    fn len(&self) -> usize {
        VecDeque::len(self)
    }
}

/// Counters for releases that reached the releaser and returned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub batches: usize,
    pub items: usize,
}

/// Buffers items and hands them to a [`Releaser`] once the batch is full or
/// the interval since the last release has lapsed.
///
/// There is no background timer. Size and interval are checked on every
/// [`write`](Batcher::write); the caller is expected to call
/// [`flush`](Batcher::flush) frequently from the same loop that writes so
/// partial batches do not sit around while the source is idle. Don't call
/// `flush` after an operation that may block for an unbounded time, or the
/// interval no longer bounds latency.
///
/// All operations take `&mut self`. For shared use across threads wrap it in
/// [`SyncBatcher`](crate::SyncBatcher).
///
/// A release moves the buffered container out before calling the releaser.
/// If the releaser panics the panic propagates to the caller and that batch is
/// gone; the release clock and [`BatchStats`] are left untouched.
pub struct Batcher<T, R, B: BatchBuf<T> = Vec<T>> {
    releaser: R,
    capacity: usize,
    interval: Duration,
    pending: B,
    last_release: Instant,
    stats: BatchStats,
    _item: PhantomData<fn(T)>,
}

impl<T, R, B: BatchBuf<T>> std::fmt::Debug for Batcher<T, R, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batcher")
            .field("capacity", &self.capacity)
            .field("interval", &self.interval)
            .field("pending", &self.pending.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<T, R, B> Batcher<T, R, B>
where
    B: BatchBuf<T>,
    R: Releaser<B>,
{
    /// Create a batcher releasing at `capacity` items or after `interval`.
    ///
    /// The release clock starts now. `capacity` must be at least 1.
    pub fn new(capacity: usize, interval: Duration, releaser: R) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(Self {
            releaser,
            capacity,
            interval,
            pending: B::default(),
            last_release: Instant::now(),
            stats: BatchStats::default(),
            _item: PhantomData,
        })
    }

    pub fn from_config(config: &BatcherConfig, releaser: R) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::new(config.size, config.interval(), releaser)
    }

    /// Buffer `item`. Releases before returning if the batch is now full or
    /// the interval has lapsed.
    pub fn write(&mut self, item: T) {
        self.pending.push(item);
        if self.is_partial() && !self.interval_elapsed() {
            return;
        }
        self.release();
    }

    /// Release a partial batch if the interval has lapsed, otherwise a no-op.
    pub fn flush(&mut self) {
        if !self.interval_elapsed() {
            return;
        }
        self.release();
    }

    /// Release immediately, bypassing the size and interval checks.
    pub fn forced_flush(&mut self) {
        self.release();
    }

    // Empty batches never reach the releaser and never reset the clock.
    fn release(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.pending);
        let items = batch.len();
        log::trace!("Releasing batch of {items} items");
        self.releaser.release(batch);
        self.last_release = Instant::now();
        self.stats.batches += 1;
        self.stats.items += items;
    }

    fn is_partial(&self) -> bool {
        self.pending.len() < self.capacity
    }

    fn interval_elapsed(&self) -> bool {
        self.last_release.elapsed() >= self.interval
    }
}

impl<T, R, B: BatchBuf<T>> Batcher<T, R, B> {
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time since the last non-empty release (or construction)
    pub fn since_last_release(&self) -> Duration {
        self.last_release.elapsed()
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    pub fn releaser(&self) -> &R {
        &self.releaser
    }
}

impl<T, R, B> Accumulator for Batcher<T, R, B>
where
    B: BatchBuf<T>,
    R: Releaser<B>,
{
    type Item = T;

    fn write(&mut self, item: T) {
        Batcher::write(self, item);
    }

    fn flush(&mut self) {
        Batcher::flush(self);
    }

    fn forced_flush(&mut self) {
        Batcher::forced_flush(self);
    }

    fn len(&self) -> usize {
        Batcher::len(self)
    }
}

impl<T, R, B: BatchBuf<T>> Drop for Batcher<T, R, B> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            log::warn!(
                "Batcher dropped with {} undelivered items (missing forced_flush?)",
                self.pending.len()
            );
        }
    }
}
