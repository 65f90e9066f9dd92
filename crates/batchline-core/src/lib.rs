//! Batchline Core - size- and interval-triggered batching
//!
//! Collects items written by a single caller and hands them to a
//! [`Releaser`] as one batch once the batch is full or an interval has
//! lapsed. There is no background timer: the caller drives time-based
//! release by calling [`Batcher::flush`] from its own loop, or by handing the
//! loop to [`pump`].

pub mod accumulator;
pub mod bytes;
pub mod config;
pub mod error;
pub mod logging;
pub mod progress;
pub mod pump;
pub mod release;
pub mod shutdown;
pub mod sink;
pub mod sync;

// Re-exports for convenience
pub use accumulator::{Accumulator, BatchBuf, BatchStats, Batcher};
pub use bytes::ByteBatcher;
pub use config::BatcherConfig;
pub use error::ConfigError;
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, ProgressReleaser, fmt_num};
pub use pump::{PumpStats, pump};
pub use release::{ReleaseFn, Releaser};
pub use shutdown::{
    install_signal_handlers, is_shutdown_requested, request_shutdown, shutdown_flag,
};
pub use sink::{ChannelSink, ErrorFlag, JsonSink, LineSink};
pub use sync::SyncBatcher;
