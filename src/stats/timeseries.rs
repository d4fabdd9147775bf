//! Per-second time series merged from per-thread fio logs
//!
//! Each fio job thread writes its own log (`write_iops_log`, `write_lat_log`)
//! with `log_avg_msec=1000`. Rows look like:
//!
//! ```text
//! 1000, 15234, 0, 4096
//! 2001, 15102, 0, 4096
//! ```
//!
//! i.e. `timestamp_ms, value, direction (0=read, 1=write), block size`. Threads
//! report on their own clocks, so timestamps drift apart and a thread may skip
//! a second. The merger aligns everything onto whole seconds by holding each
//! thread's last reported value until it reports again, then:
//!
//! - sums across threads for throughput (IOPS add up)
//! - averages across threads for latency, keeping read and write separate

use crate::Result;
use anyhow::Context;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// IO direction of a log sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    fn from_field(field: &str) -> Option<Self> {
        match field.trim() {
            "0" => Some(Direction::Read),
            "1" => Some(Direction::Write),
            _ => None,
        }
    }
}

/// One row of a per-thread log
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreadLogSample {
    pub timestamp_ms: u64,
    pub value: f64,
    pub direction: Direction,
}

impl ThreadLogSample {
    pub fn new(timestamp_ms: u64, value: f64, direction: Direction) -> Self {
        Self { timestamp_ms, value, direction }
    }

    /// Whole second the sample belongs to
    fn second(&self) -> u64 {
        self.timestamp_ms / 1000
    }
}

/// Which aggregate to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    /// Sum across threads, single column
    Throughput,
    /// Mean across threads, read and write columns
    Latency,
}

/// Parse one per-thread log
///
/// Malformed rows are logged and skipped; they never abort the merge.
pub fn parse_log<R: BufRead>(reader: R, source: &str) -> Result<Vec<ThreadLogSample>> {
    let mut samples = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read log: {}", source))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_row(line) {
            Some(sample) => samples.push(sample),
            None => warn!(source, line = lineno + 1, row = line, "skipping malformed log row"),
        }
    }

    Ok(samples)
}

fn parse_row(line: &str) -> Option<ThreadLogSample> {
    let mut fields = line.split(',');
    let timestamp_ms = fields.next()?.trim().parse::<u64>().ok()?;
    let value = fields.next()?.trim().parse::<f64>().ok()?;
    let direction = Direction::from_field(fields.next()?)?;
    Some(ThreadLogSample { timestamp_ms, value, direction })
}

/// Read and parse one per-thread log file
pub fn read_log_file(path: &Path) -> Result<Vec<ThreadLogSample>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;
    parse_log(BufReader::new(file), &path.display().to_string())
}

/// Held values of one thread, one slot per second
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadSeries {
    pub read: Vec<f64>,
    pub write: Vec<f64>,
}

/// Forward-fill one thread's samples onto `duration_secs` whole seconds
///
/// Slot `x` holds the last value reported before the end of second `x`, or
/// zero if the thread has not reported that direction yet. Samples are assumed
/// to be in file order; fio writes them monotonically.
pub fn hold_last_value(samples: &[ThreadLogSample], duration_secs: usize) -> ThreadSeries {
    let mut read = Vec::with_capacity(duration_secs);
    let mut write = Vec::with_capacity(duration_secs);
    let mut held_read = 0.0;
    let mut held_write = 0.0;
    let mut cursor = samples.iter().peekable();

    for x in 0..duration_secs as u64 {
        while let Some(sample) = cursor.next_if(|s| s.second() < x + 1) {
            match sample.direction {
                Direction::Read => held_read = sample.value,
                Direction::Write => held_write = sample.value,
            }
        }
        read.push(held_read);
        write.push(held_write);
    }

    ThreadSeries { read, write }
}

/// Result of a merge, already trimmed of the leading padding
#[derive(Debug, Clone, PartialEq)]
pub enum MergedSeries {
    Throughput(Vec<f64>),
    Latency { read: Vec<f64>, write: Vec<f64> },
}

impl MergedSeries {
    pub fn kind(&self) -> SeriesKind {
        match self {
            MergedSeries::Throughput(_) => SeriesKind::Throughput,
            MergedSeries::Latency { .. } => SeriesKind::Latency,
        }
    }

    /// Number of emitted seconds
    pub fn len(&self) -> usize {
        match self {
            MergedSeries::Throughput(v) => v.len(),
            MergedSeries::Latency { read, .. } => read.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column header line for the CSV
    pub fn header(&self) -> &'static str {
        match self {
            MergedSeries::Throughput(_) => "IOPS",
            MergedSeries::Latency { .. } => "Read,Write",
        }
    }

    /// One CSV line per second
    pub fn rows(&self) -> Vec<String> {
        match self {
            MergedSeries::Throughput(v) => v.iter().map(|x| x.to_string()).collect(),
            MergedSeries::Latency { read, write } => read
                .iter()
                .zip(write)
                .map(|(r, w)| format!("{},{}", r, w))
                .collect(),
        }
    }
}

/// Aligns per-thread logs of one run onto a common per-second axis
#[derive(Debug, Clone, Copy)]
pub struct TimeSeriesMerger {
    runtime_secs: usize,
    padding_secs: usize,
}

impl TimeSeriesMerger {
    /// # Arguments
    ///
    /// * `runtime_secs` - Measured run time
    /// * `padding_secs` - Warm-up padding added around the run; half of it is
    ///   dropped from the front of the output
    pub fn new(runtime_secs: usize, padding_secs: usize) -> Self {
        Self { runtime_secs, padding_secs }
    }

    /// Total number of seconds tracked per thread
    pub fn duration_secs(&self) -> usize {
        self.runtime_secs + self.padding_secs
    }

    /// Number of leading seconds dropped from output
    pub fn skipped_secs(&self) -> usize {
        self.padding_secs / 2
    }

    /// Merge already-parsed threads
    pub fn merge(&self, kind: SeriesKind, threads: &[Vec<ThreadLogSample>]) -> MergedSeries {
        let duration = self.duration_secs();
        let per_thread: Vec<ThreadSeries> = threads
            .iter()
            .map(|samples| hold_last_value(samples, duration))
            .collect();

        let skip = self.skipped_secs().min(duration);
        match kind {
            SeriesKind::Throughput => {
                let sums = (skip..duration)
                    .map(|x| per_thread.iter().map(|t| t.read[x] + t.write[x]).sum())
                    .collect();
                MergedSeries::Throughput(sums)
            }
            SeriesKind::Latency => {
                let n = per_thread.len().max(1) as f64;
                let mut read = Vec::with_capacity(duration - skip);
                let mut write = Vec::with_capacity(duration - skip);
                for x in skip..duration {
                    read.push(per_thread.iter().map(|t| t.read[x]).sum::<f64>() / n);
                    write.push(per_thread.iter().map(|t| t.write[x]).sum::<f64>() / n);
                }
                MergedSeries::Latency { read, write }
            }
        }
    }

    /// Read every log file and merge them
    pub fn merge_files(&self, kind: SeriesKind, paths: &[PathBuf]) -> Result<MergedSeries> {
        if paths.is_empty() {
            anyhow::bail!("No log files to merge");
        }

        let threads = paths
            .iter()
            .map(|p| read_log_file(p))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            files = paths.len(),
            samples = threads.iter().map(Vec::len).sum::<usize>(),
            duration = self.duration_secs(),
            "merging thread logs"
        );

        Ok(self.merge(kind, &threads))
    }
}
