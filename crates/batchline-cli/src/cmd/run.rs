//! `batchline run` - batch stdin lines onto stdout

use std::io::{self, BufRead, BufWriter};
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use batchline_core::{
    Accumulator, BatchStats, Batcher, BatcherConfig, ByteBatcher, ErrorFlag, JsonSink, LineSink,
    ProgressContext, ProgressReleaser, PumpStats, fmt_num, is_shutdown_requested, pump,
};

use crate::config::{Config, OutputFormat};

/// Initial capacity for per-line read buffer
const LINE_BUF_CAPACITY: usize = 256;

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Items per batch before a release is forced
    #[arg(short, long)]
    pub size: Option<usize>,

    /// Longest a partial batch may wait, in milliseconds
    #[arg(short, long)]
    pub interval_ms: Option<u64>,

    /// Output format for released batches
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Milliseconds to wait for input before attempting a due-flush
    #[arg(long)]
    pub idle_ms: Option<u64>,
}

/// Effective settings: CLI flags over config file over defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    pub batch: BatcherConfig,
    pub format: OutputFormat,
    pub idle: Duration,
    pub channel_capacity: usize,
}

impl RunSettings {
    pub fn resolve(args: &RunArgs, config: &Config) -> Self {
        Self {
            batch: BatcherConfig {
                size: args.size.unwrap_or(config.batch.size),
                interval_ms: args.interval_ms.unwrap_or(config.batch.interval_ms),
            },
            format: args.format.unwrap_or(config.output.format),
            idle: Duration::from_millis(args.idle_ms.unwrap_or(config.poll.idle_ms)),
            channel_capacity: config.poll.channel_capacity,
        }
    }
}

pub fn run(args: RunArgs, config: &Config, progress: &ProgressContext) -> Result<()> {
    let settings = RunSettings::resolve(&args, config);
    settings.batch.validate().context("invalid batch settings")?;
    if settings.idle > settings.batch.interval() {
        log::warn!(
            "Idle wait {}ms exceeds batch interval {}ms; partial batches may wait up to the idle wait",
            settings.idle.as_millis(),
            settings.batch.interval_ms
        );
    }
    log::debug!(
        "Batching stdin: size={} interval={}ms format={} idle={}ms",
        settings.batch.size,
        settings.batch.interval_ms,
        settings.format,
        settings.idle.as_millis()
    );

    let pb = progress.spinner("batching");
    let stdout = BufWriter::new(io::stdout().lock());
    let error_flag = ErrorFlag::default();

    let (pumped, stats, rows) = match settings.format {
        OutputFormat::Lines => {
            let mut sink = LineSink::with_error_flag(stdout, error_flag.clone());
            let (pumped, stats) = {
                let releaser =
                    ProgressReleaser::with_error_flag(&mut sink, pb.clone(), error_flag.clone());
                let mut batcher = ByteBatcher::from_config(&settings.batch, releaser)?;
                let pumped = drive(&mut batcher, &settings, &error_flag, keep_bytes)?;
                (pumped, batcher.stats())
            };
            let rows = sink.finalize().context("failed writing batches to stdout")?;
            (pumped, stats, rows)
        }
        OutputFormat::Json => {
            let mut sink = JsonSink::with_error_flag(stdout, error_flag.clone());
            let (pumped, stats) = {
                let releaser =
                    ProgressReleaser::with_error_flag(&mut sink, pb.clone(), error_flag.clone());
                let mut batcher: Batcher<String, _> =
                    Batcher::from_config(&settings.batch, releaser)?;
                let pumped = drive(&mut batcher, &settings, &error_flag, lossy_utf8)?;
                (pumped, batcher.stats())
            };
            let rows = sink.finalize().context("failed writing batches to stdout")?;
            (pumped, stats, rows)
        }
    };

    pb.finish_and_clear();
    log_summary(&pumped, &stats, rows);
    Ok(())
}

/// Run the poll loop over stdin lines, then reap the reader thread.
fn drive<A>(
    acc: &mut A,
    settings: &RunSettings,
    error_flag: &ErrorFlag,
    decode: fn(Vec<u8>) -> A::Item,
) -> Result<PumpStats>
where
    A: Accumulator,
    A::Item: Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(settings.channel_capacity);
    let reader = spawn_stdin_reader(tx, error_flag.clone(), decode);

    let pumped = pump(&rx, acc, settings.idle, || {
        is_shutdown_requested() || error_flag.load(Ordering::Relaxed)
    });
    drop(rx);

    if is_shutdown_requested() || error_flag.load(Ordering::Relaxed) {
        // Reader may be parked on stdin; it exits on its next send
        log::debug!("Stopped early, not waiting for stdin reader");
        return Ok(pumped);
    }
    let lines = reader
        .join()
        .map_err(|_| anyhow::anyhow!("stdin reader thread panicked"))?
        .context("failed reading stdin")?;
    log::debug!("Read {} lines from stdin", fmt_num(lines));
    Ok(pumped)
}

/// Read stdin line by line on a dedicated thread, sending each line without
/// its terminator. Stops at EOF, when the receiver hangs up, or once the
/// output sink has failed.
fn spawn_stdin_reader<T: Send + 'static>(
    tx: SyncSender<T>,
    error_flag: ErrorFlag,
    decode: fn(Vec<u8>) -> T,
) -> JoinHandle<io::Result<usize>> {
    thread::spawn(move || {
        let mut stdin = io::stdin().lock();
        let mut lines = 0usize;
        loop {
            if error_flag.load(Ordering::Relaxed) {
                log::debug!("Output failed, stopping stdin reader");
                break;
            }
            let mut buf = Vec::with_capacity(LINE_BUF_CAPACITY);
            if stdin.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            trim_line_ending(&mut buf);
            if tx.send(decode(buf)).is_err() {
                break;
            }
            lines += 1;
        }
        Ok(lines)
    })
}

fn trim_line_ending(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
}

fn keep_bytes(line: Vec<u8>) -> Vec<u8> {
    line
}

fn lossy_utf8(line: Vec<u8>) -> String {
    String::from_utf8(line).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn log_summary(pumped: &PumpStats, stats: &BatchStats, rows: usize) {
    log::info!(
        "Released {} items in {} batches ({} written, {} idle polls)",
        fmt_num(stats.items),
        fmt_num(stats.batches),
        fmt_num(rows),
        fmt_num(pumped.idle_flushes)
    );
}
