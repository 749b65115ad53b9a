//! Download progress tracking and rendering.
//!
//! A [`ProgressTracker`] is created per transfer and passed into the
//! download call. It owns the transfer's start time and cumulative byte
//! count, and forwards a [`ProgressSnapshot`] to its [`ProgressSink`] after
//! every chunk. Rates are averaged over the whole transfer.

use std::io::Write;
use std::time::{Duration, Instant};

const BAR_WIDTH: u64 = 25;
const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;
const RENDER_INTERVAL: Duration = Duration::from_millis(100);

/// Point-in-time view of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Bytes received so far.
    pub transferred: u64,
    /// Expected total size, when known.
    pub total: Option<u64>,
    /// Time since the transfer started.
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Average transfer rate in bytes per second since the start.
    ///
    /// Returns `None` before any measurable time has elapsed.
    #[must_use]
    pub fn bytes_per_second(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return None;
        }
        #[expect(
            clippy::cast_precision_loss,
            reason = "display-only rate; sub-byte precision is irrelevant"
        )]
        let bytes = self.transferred as f64;
        Some(bytes / secs)
    }

    /// Completion percentage, when the total is known and non-zero.
    #[must_use]
    pub fn percent(&self) -> Option<f64> {
        let total = self.total.filter(|total| *total > 0)?;
        #[expect(
            clippy::cast_precision_loss,
            reason = "display-only percentage"
        )]
        let ratio = self.transferred as f64 / total as f64;
        Some((ratio * 100.0).min(100.0))
    }

    /// Number of filled cells in a fixed-width progress bar.
    #[must_use]
    pub fn filled_cells(&self) -> u64 {
        match self.total {
            Some(total) if total > 0 => {
                let clamped = self.transferred.min(total);
                clamped.saturating_mul(BAR_WIDTH) / total
            }
            _ => 0,
        }
    }
}

/// Receiver of progress updates.
pub trait ProgressSink {
    /// Called after every chunk is written.
    fn update(&mut self, snapshot: &ProgressSnapshot);

    /// Called once when the transfer completes successfully.
    fn finish(&mut self, snapshot: &ProgressSnapshot);
}

/// Explicit per-transfer progress state.
pub struct ProgressTracker {
    started: Instant,
    transferred: u64,
    total: Option<u64>,
    sink: Box<dyn ProgressSink>,
}

impl ProgressTracker {
    /// Start tracking a transfer of `total` bytes (if known).
    #[must_use]
    pub fn new(total: Option<u64>, sink: Box<dyn ProgressSink>) -> Self {
        Self {
            started: Instant::now(),
            transferred: 0,
            total,
            sink,
        }
    }

    /// Replace the expected total once the server reports it.
    pub fn set_total_if_unknown(&mut self, total: Option<u64>) {
        if self.total.is_none() {
            self.total = total;
        }
    }

    /// Record `bytes` more bytes and notify the sink.
    pub fn advance(&mut self, bytes: u64) {
        self.transferred = self.transferred.saturating_add(bytes);
        let snapshot = self.snapshot();
        self.sink.update(&snapshot);
    }

    /// Notify the sink that the transfer completed.
    pub fn finish(&mut self) {
        let snapshot = self.snapshot();
        self.sink.finish(&snapshot);
    }

    /// Bytes recorded so far.
    #[must_use]
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// Current snapshot of the transfer.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            transferred: self.transferred,
            total: self.total,
            elapsed: self.started.elapsed(),
        }
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("transferred", &self.transferred)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

/// How download progress is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProgressStyle {
    /// Render a progress bar on stderr.
    #[default]
    Terminal,
    /// Discard progress updates.
    Silent,
}

impl ProgressStyle {
    /// Build a sink for a new transfer.
    #[must_use]
    pub fn sink(self) -> Box<dyn ProgressSink> {
        match self {
            Self::Terminal => Box::new(TerminalProgress::new(std::io::stderr())),
            Self::Silent => Box::new(SilentProgress),
        }
    }
}

/// Sink that ignores every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn update(&mut self, _snapshot: &ProgressSnapshot) {}

    fn finish(&mut self, _snapshot: &ProgressSnapshot) {}
}

/// Sink that redraws a single status line on a terminal.
#[derive(Debug)]
pub struct TerminalProgress<W: Write> {
    out: W,
    last_render: Option<Instant>,
}

impl<W: Write> TerminalProgress<W> {
    /// Render progress to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_render: None,
        }
    }

    fn draw(&mut self, line: &str) {
        if write!(self.out, "\r{line}").and_then(|()| self.out.flush()).is_err() {
            // Progress output is best-effort.
        }
    }
}

impl<W: Write> ProgressSink for TerminalProgress<W> {
    fn update(&mut self, snapshot: &ProgressSnapshot) {
        let due = self
            .last_render
            .is_none_or(|last| last.elapsed() >= RENDER_INTERVAL);
        if due {
            self.draw(&render_line(snapshot));
            self.last_render = Some(Instant::now());
        }
    }

    fn finish(&mut self, snapshot: &ProgressSnapshot) {
        self.draw(&render_line(snapshot));
        if writeln!(self.out).is_err() {
            // Progress output is best-effort.
        }
    }
}

/// Format a one-line progress summary.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use backdrop_installer::progress::{ProgressSnapshot, render_line};
///
/// let snapshot = ProgressSnapshot {
///     transferred: 512 * 1024,
///     total: Some(1024 * 1024),
///     elapsed: Duration::from_secs(1),
/// };
/// let line = render_line(&snapshot);
/// assert!(line.contains("50.00%"));
/// assert!(line.contains("512KB/s"));
/// ```
#[must_use]
pub fn render_line(snapshot: &ProgressSnapshot) -> String {
    let filled = snapshot.filled_cells();
    let bar = format!(
        "{}>{}",
        "=".repeat(usize::try_from(filled).unwrap_or(0)),
        ".".repeat(usize::try_from(BAR_WIDTH.saturating_sub(filled)).unwrap_or(0)),
    );
    let speed = snapshot
        .bytes_per_second()
        .map_or_else(|| "--".to_owned(), format_rate);
    #[expect(
        clippy::cast_precision_loss,
        reason = "display-only megabyte figures"
    )]
    let done_mb = snapshot.transferred as f64 / MIB;
    let secs = snapshot.elapsed.as_secs();

    match (snapshot.percent(), snapshot.total) {
        (Some(percent), Some(total)) => {
            #[expect(
                clippy::cast_precision_loss,
                reason = "display-only megabyte figures"
            )]
            let total_mb = total as f64 / MIB;
            format!(
                "{bar}| {speed} {percent:.2}% -- {done_mb:.2}MB out of {total_mb:.2}MB {secs}s"
            )
        }
        _ => format!("{bar}| {speed} {done_mb:.2}MB {secs}s"),
    }
}

/// Format a byte rate as KB/s, switching to MB/s above 799 KB/s.
fn format_rate(bytes_per_second: f64) -> String {
    let kib = bytes_per_second / KIB;
    if kib > 799.0 {
        format!("{:.2}MB/s", kib / KIB)
    } else {
        format!("{kib:.0}KB/s")
    }
}
