//! Ready-made releasers: line writer, JSON writer, channel sender

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;

use serde::Serialize;

use crate::release::Releaser;

/// Shared error flag. A sink sets it on failure; producers may check it to stop early
pub type ErrorFlag = Arc<AtomicBool>;

/// Bookkeeping shared by the writer sinks.
///
/// `Releaser::release` cannot return an error, so the first failure is kept
/// here and later batches are dropped and counted.
#[derive(Debug, Default)]
struct SinkState {
    error_flag: ErrorFlag,
    error: Option<io::Error>,
    row_count: usize,
    batch_count: usize,
    dropped_rows: usize,
}

impl SinkState {
    fn with_flag(error_flag: ErrorFlag) -> Self {
        Self {
            error_flag,
            ..Default::default()
        }
    }

    fn failed(&self) -> bool {
        self.error.is_some()
    }

    fn record(&mut self, rows: usize, result: io::Result<()>) {
        match result {
            Ok(()) => {
                self.row_count += rows;
                self.batch_count += 1;
            }
            Err(e) => {
                log::error!("Sink write failed, dropping further batches: {e}");
                self.error_flag.store(true, Ordering::Relaxed);
                self.error = Some(e);
                self.dropped_rows += rows;
            }
        }
    }

    fn drop_batch(&mut self, rows: usize) {
        log::debug!("Sink already failed, dropping batch of {rows} rows");
        self.dropped_rows += rows;
    }

    fn finish(self) -> io::Result<usize> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.row_count),
        }
    }
}

/// Writes each item of a batch as one line, flushing the writer once per batch.
pub struct LineSink<W: Write> {
    writer: W,
    state: SinkState,
}

impl<W: Write> std::fmt::Debug for LineSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineSink")
            .field("row_count", &self.state.row_count)
            .field("batch_count", &self.state.batch_count)
            .finish_non_exhaustive()
    }
}

impl<W: Write> LineSink<W> {
    pub fn new(writer: W) -> Self {
        Self::with_error_flag(writer, ErrorFlag::default())
    }

    pub fn with_error_flag(writer: W, error_flag: ErrorFlag) -> Self {
        Self {
            writer,
            state: SinkState::with_flag(error_flag),
        }
    }

    /// Write a batch, one item per line
    pub fn write_batch<B>(&mut self, batch: B) -> io::Result<usize>
    where
        B: IntoIterator,
        B::Item: AsRef<[u8]>,
    {
        let mut rows = 0;
        for item in batch {
            self.writer.write_all(item.as_ref())?;
            self.writer.write_all(b"\n")?;
            rows += 1;
        }
        self.writer.flush()?;
        Ok(rows)
    }

    pub fn row_count(&self) -> usize {
        self.state.row_count
    }

    pub fn batch_count(&self) -> usize {
        self.state.batch_count
    }

    pub fn dropped_rows(&self) -> usize {
        self.state.dropped_rows
    }

    pub fn error_flag(&self) -> ErrorFlag {
        self.state.error_flag.clone()
    }

    /// Flush the writer and return rows written, or the first write error
    pub fn finalize(mut self) -> io::Result<usize> {
        if !self.state.failed() {
            self.writer.flush()?;
        }
        self.state.finish()
    }
}

impl<W, T> Releaser<Vec<T>> for LineSink<W>
where
    W: Write,
    T: AsRef<[u8]>,
{
    fn release(&mut self, batch: Vec<T>) {
        let rows = batch.len();
        if self.state.failed() {
            self.state.drop_batch(rows);
            return;
        }
        let result = self.write_batch(batch).map(|_| ());
        self.state.record(rows, result);
    }
}

/// Writes each batch as a single JSON array line.
pub struct JsonSink<W: Write> {
    writer: W,
    state: SinkState,
}

impl<W: Write> std::fmt::Debug for JsonSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSink")
            .field("row_count", &self.state.row_count)
            .field("batch_count", &self.state.batch_count)
            .finish_non_exhaustive()
    }
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self::with_error_flag(writer, ErrorFlag::default())
    }

    pub fn with_error_flag(writer: W, error_flag: ErrorFlag) -> Self {
        Self {
            writer,
            state: SinkState::with_flag(error_flag),
        }
    }

    pub fn write_batch<T: Serialize>(&mut self, batch: &[T]) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, batch).map_err(io::Error::other)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    pub fn row_count(&self) -> usize {
        self.state.row_count
    }

    pub fn batch_count(&self) -> usize {
        self.state.batch_count
    }

    pub fn error_flag(&self) -> ErrorFlag {
        self.state.error_flag.clone()
    }

    pub fn finalize(mut self) -> io::Result<usize> {
        if !self.state.failed() {
            self.writer.flush()?;
        }
        self.state.finish()
    }
}

impl<W, T> Releaser<Vec<T>> for JsonSink<W>
where
    W: Write,
    T: Serialize,
{
    fn release(&mut self, batch: Vec<T>) {
        let rows = batch.len();
        if self.state.failed() {
            self.state.drop_batch(rows);
            return;
        }
        let result = self.write_batch(&batch);
        self.state.record(rows, result);
    }
}

/// Forwards batches to a consumer thread over a bounded channel.
///
/// `release` blocks while the channel is full. Once the receiver hangs up the
/// error flag is set and further batches are discarded.
pub struct ChannelSink<B> {
    sender: SyncSender<B>,
    error_flag: ErrorFlag,
    batch_count: usize,
}

impl<B> std::fmt::Debug for ChannelSink<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSink")
            .field("batch_count", &self.batch_count)
            .finish_non_exhaustive()
    }
}

impl<B> ChannelSink<B> {
    pub fn new(sender: SyncSender<B>, error_flag: ErrorFlag) -> Self {
        Self {
            sender,
            error_flag,
            batch_count: 0,
        }
    }

    pub fn batch_count(&self) -> usize {
        self.batch_count
    }
}

impl<B> Releaser<B> for ChannelSink<B> {
    fn release(&mut self, batch: B) {
        // Fast-fail: receiver already gone
        if self.error_flag.load(Ordering::Relaxed) {
            return;
        }
        if self.sender.send(batch).is_err() {
            log::warn!("Batch channel closed, discarding further batches");
            self.error_flag.store(true, Ordering::Relaxed);
            return;
        }
        self.batch_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::sync_channel;
    use tempfile::TempDir;

    /// Writer that fails every call
    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn line_sink_writes_one_item_per_line() {
        let mut out = Vec::new();
        let mut sink = LineSink::new(&mut out);
        sink.release(vec!["a", "b"]);
        sink.release(vec!["c"]);
        assert_eq!(sink.batch_count(), 2);
        assert_eq!(sink.finalize().unwrap(), 3);
        assert_eq!(out, b"a\nb\nc\n");
    }

    #[test]
    fn line_sink_accepts_byte_items() {
        let mut out = Vec::new();
        let mut sink = LineSink::new(&mut out);
        sink.release(vec![b"x".to_vec(), b"yz".to_vec()]);
        sink.finalize().unwrap();
        assert_eq!(out, b"x\nyz\n");
    }

    #[test]
    fn line_sink_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        let file = std::fs::File::create(&path).unwrap();
        let mut sink = LineSink::new(io::BufWriter::new(file));
        sink.release(vec!["first", "second"]);
        assert_eq!(sink.finalize().unwrap(), 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn line_sink_keeps_first_error() {
        let mut sink = LineSink::new(BrokenWriter);
        let flag = sink.error_flag();
        sink.release(vec!["a", "b"]);
        sink.release(vec!["c"]);

        assert!(flag.load(Ordering::Relaxed));
        assert_eq!(sink.row_count(), 0);
        assert_eq!(sink.dropped_rows(), 3);
        let err = sink.finalize().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn json_sink_writes_array_per_batch() {
        let mut out = Vec::new();
        let mut sink = JsonSink::new(&mut out);
        sink.release(vec!["a", "b"]);
        sink.release(vec!["c"]);
        assert_eq!(sink.finalize().unwrap(), 3);
        assert_eq!(String::from_utf8(out).unwrap(), "[\"a\",\"b\"]\n[\"c\"]\n");
    }

    #[test]
    fn json_sink_error_sets_flag() {
        let flag = ErrorFlag::default();
        let mut sink = JsonSink::with_error_flag(BrokenWriter, flag.clone());
        sink.release(vec![1, 2]);
        assert!(flag.load(Ordering::Relaxed));
        assert!(sink.finalize().is_err());
    }

    #[test]
    fn channel_sink_forwards_batches() {
        let (tx, rx) = sync_channel(4);
        let mut sink = ChannelSink::new(tx, ErrorFlag::default());
        sink.release(vec![1, 2]);
        sink.release(vec![3]);
        assert_eq!(sink.batch_count(), 2);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn channel_sink_closed_receiver_sets_flag() {
        let (tx, rx) = sync_channel::<Vec<u8>>(1);
        drop(rx);
        let flag = ErrorFlag::default();
        let mut sink = ChannelSink::new(tx, flag.clone());
        sink.release(vec![1]);
        sink.release(vec![2]);
        assert!(flag.load(Ordering::Relaxed));
        assert_eq!(sink.batch_count(), 0);
    }
}
