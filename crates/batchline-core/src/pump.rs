//! Poll loop feeding an accumulator from a channel

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use crate::accumulator::Accumulator;

/// Counters from a [`pump`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Items received and written
    pub items: usize,
    /// Times the receive wait timed out and a due-flush was attempted
    pub idle_flushes: usize,
}

/// Drive `acc` from `rx` until the channel disconnects or `should_stop` returns true.
///
/// Each received item is written. When nothing arrives within `idle_wait`,
/// [`Accumulator::flush`] is called so partial batches still go out while the
/// source is quiet. `idle_wait` should not exceed the accumulator's interval,
/// otherwise partial batches may wait up to `idle_wait` instead.
///
/// `should_stop` is checked before every receive, so a stop condition such as
/// a failed sink ends the loop within one `idle_wait` even while the source is
/// quiet. Always ends with a forced flush.
pub fn pump<A: Accumulator>(
    rx: &Receiver<A::Item>,
    acc: &mut A,
    idle_wait: Duration,
    should_stop: impl Fn() -> bool,
) -> PumpStats {
    let mut stats = PumpStats::default();

    loop {
        if should_stop() {
            log::info!("Stop requested, flushing {} buffered items", acc.len());
            break;
        }
        match rx.recv_timeout(idle_wait) {
            Ok(item) => {
                acc.write(item);
                stats.items += 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                acc.flush();
                stats.idle_flushes += 1;
            }
            Err(RecvTimeoutError::Disconnected) => {
                log::debug!("Source disconnected after {} items", stats.items);
                break;
            }
        }
    }

    acc.forced_flush();
    stats
}
