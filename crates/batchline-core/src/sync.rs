//! Mutex-guarded batcher for multi-producer use

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::accumulator::{BatchBuf, BatchStats, Batcher};
use crate::release::Releaser;

/// Thread-safe wrapper around [`Batcher`].
///
/// Every operation takes the lock for its full duration, including the
/// releaser call, so releases are serialized and never interleave with
/// writes. Prefer a plain `Batcher` driven from one loop where possible.
///
/// A panicking releaser does not wedge the wrapper: the batch was already
/// moved out, so the poisoned guard is recovered and later calls proceed.
pub struct SyncBatcher<T, R, B: BatchBuf<T> = Vec<T>> {
    inner: Mutex<Batcher<T, R, B>>,
}

impl<T, R, B> SyncBatcher<T, R, B>
where
    B: BatchBuf<T>,
    R: Releaser<B>,
{
    pub fn new(batcher: Batcher<T, R, B>) -> Self {
        Self {
            inner: Mutex::new(batcher),
        }
    }

    pub fn write(&self, item: T) {
        self.lock().write(item);
    }

    pub fn flush(&self) {
        self.lock().flush();
    }

    pub fn forced_flush(&self) {
        self.lock().forced_flush();
    }
}

impl<T, R, B: BatchBuf<T>> SyncBatcher<T, R, B> {
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> BatchStats {
        self.lock().stats()
    }

    pub fn into_inner(self) -> Batcher<T, R, B> {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, Batcher<T, R, B>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T, R, B: BatchBuf<T>> From<Batcher<T, R, B>> for SyncBatcher<T, R, B> {
    fn from(batcher: Batcher<T, R, B>) -> Self {
        Self {
            inner: Mutex::new(batcher),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::ReleaseFn;
    use std::sync::Arc;
    use std::sync::mpsc::sync_channel;
    use std::time::Duration;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn concurrent_writers_lose_nothing() {
        let (tx, rx) = sync_channel::<Vec<usize>>(1024);
        let batcher = Batcher::new(10, HOUR, ReleaseFn(move |b: Vec<usize>| tx.send(b).unwrap()))
            .unwrap();
        let shared = Arc::new(SyncBatcher::new(batcher));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        shared.write(t * 1000 + i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        shared.forced_flush();
        assert_eq!(shared.stats().items, 1000);

        let batches: Vec<Vec<usize>> = rx.try_iter().collect();
        assert!(batches.iter().all(|b| b.len() <= 10));
        let mut all: Vec<usize> = batches.into_iter().flatten().collect();
        assert_eq!(all.len(), 1000);

        // Per-writer order survives interleaving
        for t in 0..4 {
            let mine: Vec<usize> = all.iter().copied().filter(|v| v / 1000 == t).collect();
            assert_eq!(mine, (0..250).map(|i| t * 1000 + i).collect::<Vec<_>>());
        }
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1000);
    }

    #[test]
    fn recovers_after_releaser_panic() {
        let mut calls = 0;
        let batcher = Batcher::new(
            2,
            HOUR,
            ReleaseFn(move |_: Vec<u8>| {
                calls += 1;
                if calls == 1 {
                    panic!("first release fails");
                }
            }),
        )
        .unwrap();
        let shared = Arc::new(SyncBatcher::new(batcher));

        let s = shared.clone();
        let res = std::thread::spawn(move || {
            s.write(1);
            s.write(2);
        })
        .join();
        assert!(res.is_err());

        assert!(shared.is_empty());
        shared.write(3);
        shared.write(4);
        assert_eq!(shared.stats().batches, 1);
    }

    #[test]
    fn into_inner_returns_batcher() {
        let batcher: Batcher<u8, _> = Batcher::new(4, HOUR, ReleaseFn(|_: Vec<u8>| {})).unwrap();
        let shared = SyncBatcher::from(batcher);
        shared.write(1);
        let mut inner = shared.into_inner();
        assert_eq!(inner.len(), 1);
        inner.forced_flush();
    }
}
