//! Byte-oriented batcher

use std::time::Duration;

use crate::accumulator::{Accumulator, BatchStats, Batcher};
use crate::config::BatcherConfig;
use crate::error::ConfigError;
use crate::release::Releaser;

/// [`Batcher`] fixed to byte payloads, releasing `Vec<Vec<u8>>`.
///
/// [`write`](ByteBatcher::write) copies the slice, so callers can reuse a
/// read buffer between writes. Tracks the payload bytes currently buffered.
pub struct ByteBatcher<R> {
    inner: Batcher<Vec<u8>, R>,
    pending_bytes: usize,
}

impl<R> std::fmt::Debug for ByteBatcher<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteBatcher")
            .field("inner", &self.inner)
            .field("pending_bytes", &self.pending_bytes())
            .finish()
    }
}

impl<R: Releaser<Vec<Vec<u8>>>> ByteBatcher<R> {
    pub fn new(capacity: usize, interval: Duration, releaser: R) -> Result<Self, ConfigError> {
        Ok(Self {
            inner: Batcher::new(capacity, interval, releaser)?,
            pending_bytes: 0,
        })
    }

    pub fn from_config(config: &BatcherConfig, releaser: R) -> Result<Self, ConfigError> {
        Ok(Self {
            inner: Batcher::from_config(config, releaser)?,
            pending_bytes: 0,
        })
    }

    /// Copy `data` into the batch
    pub fn write(&mut self, data: &[u8]) {
        self.write_owned(data.to_vec());
    }

    /// Move an owned buffer into the batch without copying
    pub fn write_owned(&mut self, data: Vec<u8>) {
        // A panicking releaser unwinds before the counter is reset
        if self.inner.is_empty() {
            self.pending_bytes = 0;
        }
        self.pending_bytes += data.len();
        self.inner.write(data);
        self.reset_if_released();
    }

    pub fn flush(&mut self) {
        self.inner.flush();
        self.reset_if_released();
    }

    pub fn forced_flush(&mut self) {
        self.inner.forced_flush();
        self.reset_if_released();
    }

    fn reset_if_released(&mut self) {
        if self.inner.is_empty() {
            self.pending_bytes = 0;
        }
    }
}

impl<R> ByteBatcher<R> {
    /// Payload bytes buffered and not yet released
    pub fn pending_bytes(&self) -> usize {
        if self.inner.is_empty() {
            0
        } else {
            self.pending_bytes
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn stats(&self) -> BatchStats {
        self.inner.stats()
    }

    pub fn releaser(&self) -> &R {
        self.inner.releaser()
    }
}

impl<R: Releaser<Vec<Vec<u8>>>> Accumulator for ByteBatcher<R> {
    type Item = Vec<u8>;

    fn write(&mut self, item: Vec<u8>) {
        self.write_owned(item);
    }

    fn flush(&mut self) {
        ByteBatcher::flush(self);
    }

    fn forced_flush(&mut self) {
        ByteBatcher::forced_flush(self);
    }

    fn len(&self) -> usize {
        ByteBatcher::len(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::ReleaseFn;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn copies_caller_buffer() {
        let mut out = Vec::new();
        {
            let releaser = ReleaseFn(|batch: Vec<Vec<u8>>| out.push(batch));
            let mut b = ByteBatcher::new(2, HOUR, releaser).unwrap();
            let mut buf = b"first".to_vec();
            b.write(&buf);
            buf.clear();
            buf.extend_from_slice(b"second");
            b.write(&buf);
        }
        assert_eq!(out, vec![vec![b"first".to_vec(), b"second".to_vec()]]);
    }

    #[test]
    fn pending_bytes_tracks_buffer() {
        let mut b = ByteBatcher::new(3, HOUR, ReleaseFn(|_: Vec<Vec<u8>>| {})).unwrap();
        b.write(b"abc");
        b.write_owned(vec![0; 5]);
        assert_eq!(b.pending_bytes(), 8);
        assert_eq!(b.len(), 2);

        b.write(b"z");
        assert_eq!(b.pending_bytes(), 0);
        assert_eq!(b.stats().batches, 1);
    }

    #[test]
    fn flush_respects_interval() {
        let mut b = ByteBatcher::new(10, HOUR, ReleaseFn(|_: Vec<Vec<u8>>| {})).unwrap();
        b.write(b"data");
        b.flush();
        assert_eq!(b.pending_bytes(), 4);

        b.forced_flush();
        assert_eq!(b.pending_bytes(), 0);
        assert!(b.is_empty());
    }

    #[test]
    fn rejects_zero_capacity() {
        let res = ByteBatcher::new(0, HOUR, ReleaseFn(|_: Vec<Vec<u8>>| {}));
        assert!(matches!(res, Err(ConfigError::ZeroCapacity)));
    }

    #[test]
    fn pending_bytes_fresh_after_releaser_panic() {
        let mut calls = 0;
        let releaser = ReleaseFn(move |_: Vec<Vec<u8>>| {
            calls += 1;
            if calls == 1 {
                panic!("first release fails");
            }
        });
        let mut b = ByteBatcher::new(10, HOUR, releaser).unwrap();
        b.write(b"12345");
        assert!(catch_unwind(AssertUnwindSafe(|| b.forced_flush())).is_err());
        assert_eq!(b.pending_bytes(), 0);

        b.write(b"abc");
        assert_eq!(b.pending_bytes(), 3);
        b.forced_flush();
        assert_eq!(b.stats().items, 1);
    }
}
