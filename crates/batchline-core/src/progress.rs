//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: an indicatif spinner counting released batches and items.
//! Non-TTY mode: hidden bar, the final summary goes through the log.

use std::io::IsTerminal;
use std::sync::atomic::Ordering;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::release::Releaser;
use crate::sink::ErrorFlag;

/// Central progress context owning the `MultiProgress`.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY on stderr.
    pub fn new() -> Self {
        let is_tty = std::io::stderr().is_terminal();
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Spinner status line. Hidden (no-op) when not on a TTY.
    ///
    /// Call `pb.finish_and_clear()` when done.
    pub fn spinner(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {prefix:<10.cyan.bold} {wide_msg}")
                .expect("invalid template"),
        );
        pb.set_prefix(name.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Releaser decorator that reports each release on a progress bar.
///
/// With an error flag, batches handed over after the inner sink has failed
/// are not counted, so the bar only shows what was actually written.
pub struct ProgressReleaser<R> {
    inner: R,
    pb: ProgressBar,
    error_flag: Option<ErrorFlag>,
    batches: usize,
    items: usize,
}

impl<R> ProgressReleaser<R> {
    pub fn new(inner: R, pb: ProgressBar) -> Self {
        Self {
            inner,
            pb,
            error_flag: None,
            batches: 0,
            items: 0,
        }
    }

    /// Stop counting once `error_flag` is set by the inner sink
    pub fn with_error_flag(inner: R, pb: ProgressBar, error_flag: ErrorFlag) -> Self {
        Self {
            error_flag: Some(error_flag),
            ..Self::new(inner, pb)
        }
    }

    fn inner_failed(&self) -> bool {
        self.error_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

impl<T, R: Releaser<Vec<T>>> Releaser<Vec<T>> for ProgressReleaser<R> {
    fn release(&mut self, batch: Vec<T>) {
        let n = batch.len();
        self.inner.release(batch);
        if self.inner_failed() {
            self.pb.set_message("output failed");
            return;
        }
        self.batches += 1;
        self.items += n;
        self.pb.set_message(format!(
            "{} batches, {} items",
            fmt_num(self.batches),
            fmt_num(self.items)
        ));
    }
}

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
